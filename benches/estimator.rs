use criterion::{criterion_group, criterion_main, Criterion};
use rand::RngCore;

use gammy::image::*;

fn random_frame(width: usize, height: usize) -> Sample {
    let stride = (width * 4 + 63) / 64 * 64;
    let mut data = vec![0u8; stride * height];

    let mut rng = rand::rng();
    rng.fill_bytes(&mut data);

    Sample::new(data, width, height, stride, PixelLayout::BGRX).unwrap()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let (width, height) = (1920, 1080);
    let frame = random_frame(width, height);

    for &step in [1, 4, 8, 16].iter() {
        c.bench_function(&format!("{}x{} step {}", width, height, step), |b| {
            let estimator = BrightnessEstimator::new(step);

            b.iter(|| estimator.estimate(&frame))
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
