pub mod config;
pub mod error;

pub use config::ShroudConfig;
pub use error::{ShroudError, ShroudResult};
