use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use nucleosim_core::{Nucleus, Officer, RasterPolicy, ShapeHinter, SimConfig};
use nucleosim_geom::{
    DistanceField, DistanceModel, LabelVolume, Sphere, SphereSet, Vec3,
};

const DIMS: [usize; 3] = [48, 48, 48];

fn shell_field() -> DistanceField {
    let mut mask = LabelVolume::new(DIMS, Vec3::default(), Vec3::splat(1.0), 0).expect("mask");
    for z in 4..44 {
        for y in 4..44 {
            for x in 4..44 {
                *mask.get_mut([x, y, z]).expect("voxel") = 1;
            }
        }
    }
    DistanceField::from_mask(&mask, DistanceModel::ZeroInGradOut).expect("field")
}

fn build_officer(nuclei: usize) -> Officer {
    let mut officer = Officer::new(SimConfig::default()).expect("officer");
    officer
        .spawn(Box::new(
            ShapeHinter::new(1, "shell", shell_field(), 0.0, 0.1).expect("hinter"),
        ))
        .expect("spawn hinter");
    for index in 0..nuclei {
        let offset = (index % 16) as f32;
        let spheres = SphereSet::new(vec![Sphere::new(
            Vec3::new(10.0 + offset, 24.0, 24.0),
            1.5,
        )])
        .expect("set");
        officer
            .spawn(Box::new(
                Nucleus::new(
                    2 + index as u16,
                    "nucleus",
                    spheres,
                    Vec3::new(2.0, 1.0, 0.0),
                    0.0,
                    0.1,
                )
                .expect("nucleus"),
            ))
            .expect("spawn nucleus");
    }
    officer
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("officer_step");
    for &nuclei in &[8usize, 64, 256] {
        group.bench_function(format!("nuclei_{nuclei}"), |b| {
            b.iter_batched(
                || build_officer(nuclei),
                |mut officer| {
                    for _ in 0..16 {
                        officer.step();
                    }
                    officer
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_raster(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_to_labels");
    let officer = build_officer(64);
    for (name, policy) in [
        ("single_writer", RasterPolicy::SingleWriter),
        ("atomic_claim", RasterPolicy::AtomicClaim),
    ] {
        group.bench_function(name, |b| {
            b.iter_batched(
                || LabelVolume::new(DIMS, Vec3::default(), Vec3::splat(1.0), 0).expect("volume"),
                |mut volume| {
                    officer.render_to_labels(&mut volume, policy);
                    volume
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_step, bench_raster);
criterion_main!(benches);
