use std::hint::black_box;

use criterion::{Bencher, Criterion, Throughput, criterion_group, criterion_main};
use simd_blend::pipeline::{BlendConfig, BlendPipeline, ImageView, ResultBuffer, Strategy};

fn pattern(len: usize, step: usize) -> Vec<u8> {
    (0..len).map(|i| (i * step % 256) as u8).collect()
}

fn bench_blend_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("blend");

    let rows = 1080;
    let cols = 1920;
    let base_data = pattern(rows * cols, 7);
    let overlay_data = pattern(rows * cols, 13);
    let base = ImageView::new(rows, cols, &base_data).unwrap();
    let overlay = ImageView::new(rows, cols, &overlay_data).unwrap();
    let pipeline = BlendPipeline::new(BlendConfig::default()).unwrap();

    group.throughput(Throughput::Bytes((rows * cols) as u64));
    for strategy in Strategy::ALL {
        let kernel = pipeline.kernel(strategy);
        let parameter = pipeline.parameter();
        let mut output = ResultBuffer::for_base(&base);

        group.bench_function(strategy.name(), |b: &mut Bencher| {
            b.iter(|| {
                kernel
                    .blend_into(black_box(&base), black_box(&overlay), parameter, &mut output)
                    .unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_blend_strategies);
criterion_main!(benches);
