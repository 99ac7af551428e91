use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ep_core::config::PeakMode;
use ep_dsp::accumulator::{EnvelopeAccumulator, Settings};

fn bench_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope_process");

    for &(npoints, period, block) in &[(1024, 512, 64), (4096, 256, 256), (1000, 32, 1)] {
        let Ok(mut acc) = EnvelopeAccumulator::new(Settings::new(npoints, period), PeakMode::Signed)
        else {
            return;
        };
        if acc.block_size_changed(block).is_err() {
            return;
        }
        let input: Vec<f32> = (0..block)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{npoints}/{period}/{block}")),
            &input,
            |b, input| {
                b.iter(|| {
                    let _ = black_box(acc.process(black_box(input)));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_process);
criterion_main!(benches);
