use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use strata_noise::{GeneratorConfig, LayeredComposer, OutputShape, StreamGenerator};

fn slice_config() -> GeneratorConfig {
    let mut config = GeneratorConfig::new(3, 0);
    config.lattice_size = 32;
    config.step_sizes = vec![0.11, 0.053, 0.047];
    config.shape = OutputShape::Slice {
        width: 256,
        height: 256,
    };
    config.parallel_threshold = 4096;
    config
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("serial slice", |b| {
        let mut generator = StreamGenerator::new(slice_config(), None).unwrap();
        b.iter(|| {
            let segment = generator.next(1).unwrap();
            generator.recycle(segment);
        });
    });

    c.bench_function("pooled slice", |b| {
        let pool = Arc::new(rayon::ThreadPoolBuilder::new().build().unwrap());
        let mut generator = StreamGenerator::new(slice_config(), Some(pool)).unwrap();
        b.iter(|| {
            let segment = generator.next(1).unwrap();
            generator.recycle(segment);
        });
    });

    c.bench_function("4 octave line", |b| {
        let mut base = GeneratorConfig::new(2, 0);
        base.lattice_size = 64;
        base.step_sizes = vec![0.09, 0.031];
        base.shape = OutputShape::Line { length: 1024 };
        let mut composer = LayeredComposer::octave_stack(&base, 4, 0.5, 2.0, 0, None).unwrap();
        b.iter(|| {
            let segment = composer.next(8).unwrap();
            composer.recycle(segment);
        });
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
