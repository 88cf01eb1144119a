use shroud_crypto::{decrypt, encrypt, generate_key};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [256, 16384, 1048576])]
fn bench_encrypt(bencher: divan::Bencher, size: usize) {
    let key = generate_key().unwrap();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| encrypt(divan::black_box(&data), divan::black_box(&key)).unwrap());
}

#[divan::bench(args = [256, 16384, 1048576])]
fn bench_decrypt(bencher: divan::Bencher, size: usize) {
    let key = generate_key().unwrap();
    let data = make_data(size);
    let sealed = encrypt(&data, &key).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| decrypt(divan::black_box(sealed.as_bytes()), divan::black_box(&key)).unwrap());
}

fn main() {
    divan::main();
}
