use criterion::{criterion_group, criterion_main, Criterion};
use firn::{
    cycle::{FasOptions, TaiOptions},
    testing::{Bratu, ObstacleKind, PoissonObstacle},
    FasDriver, TaiDriver,
};

const MAX_CYCLES: usize = 100;
const TOLERANCE: f64 = 1e-8;

fn solve_fas(options: FasOptions) -> bool {
    let f = Bratu::new(1.0);
    let mut driver = FasDriver::builder(&f)
        .with_levels(0, 8)
        .with_options(options)
        .build();

    let r0 = driver.residual_norm().unwrap();
    let (_, norm) = driver
        .find(|state| state.norm() <= TOLERANCE * r0 || state.iter() >= MAX_CYCLES)
        .unwrap();

    norm <= TOLERANCE * r0
}

fn solve_tai(kind: ObstacleKind) -> bool {
    let f = PoissonObstacle::new(kind);
    let mut driver = TaiDriver::builder(&f)
        .with_levels(0, 8)
        .with_options(TaiOptions::default())
        .build();

    let r0 = driver.residual_norm().unwrap();
    let (_, norm) = driver
        .find(|state| state.norm() <= TOLERANCE * r0 || state.iter() >= MAX_CYCLES)
        .unwrap();

    norm <= TOLERANCE * r0
}

fn fas_vcycles(c: &mut Criterion) {
    c.bench_function("fas vcycles bratu", |b| {
        b.iter(|| assert!(solve_fas(FasOptions::default())))
    });
}

fn fas_vcycles_heavy_smoothing(c: &mut Criterion) {
    let mut options = FasOptions::default();
    options.set_down(2).set_up(2);

    c.bench_function("fas vcycles bratu v(2,2)", |b| {
        b.iter(|| assert!(solve_fas(options)))
    });
}

fn fas_fcycle(c: &mut Criterion) {
    c.bench_function("fas fcycle bratu", |b| {
        b.iter(|| {
            let f = Bratu::new(1.0);
            let mut driver = FasDriver::builder(&f).with_levels(0, 8).build();
            let norm = driver.fcycle(2, true).unwrap();
            assert!(norm.is_finite());
        })
    });
}

fn tai_vcycles_icelike(c: &mut Criterion) {
    c.bench_function("tai vcycles icelike", |b| {
        b.iter(|| assert!(solve_tai(ObstacleKind::IceLike)))
    });
}

fn tai_vcycles_parabola(c: &mut Criterion) {
    c.bench_function("tai vcycles parabola", |b| {
        b.iter(|| assert!(solve_tai(ObstacleKind::Parabola)))
    });
}

criterion_group!(
    cycles,
    fas_vcycles,
    fas_vcycles_heavy_smoothing,
    fas_fcycle,
    tai_vcycles_icelike,
    tai_vcycles_parabola
);
criterion_main!(cycles);
