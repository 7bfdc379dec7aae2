//! Navigation and tick benchmarks for bc_core.
//!
//! Run with: `cargo bench -p bc_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use bc_core::config::AgentConfig;
use bc_core::geometry::MapLocation;
use bc_core::navigation::Navigator;
use bc_core::world::{UnitType, WorldQuery};
use bc_test_utils::{fixtures, Sandbox};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

/// One greedy call on an open map.
pub fn pathfind_benchmark(c: &mut Criterion) {
    let (mut world, id) = fixtures::single_unit(40, 40, UnitType::Soldier, MapLocation::new(5, 5));
    world.begin_round();
    let config = AgentConfig::default();
    let target = MapLocation::new(35, 30);

    c.bench_function("pathfind_open_map", |b| {
        b.iter(|| {
            let view = world.view(id).expect("unit alive");
            let mut nav = Navigator::new(&config);
            black_box(nav.pathfind(&view, black_box(target)))
        })
    });

    let (mut walled, id) =
        fixtures::single_unit(40, 40, UnitType::Soldier, MapLocation::new(20, 5));
    fixtures::wall_row(&mut walled, 10, 5, 35);
    c.bench_function("pathfind_wall_crossing", |b| {
        b.iter(|| {
            let mut world = walled.clone();
            let mut nav = Navigator::new(&config);
            for _ in 0..60 {
                world.begin_round();
                let mut view = world.view(id).expect("unit alive");
                let Some(dir) = nav.pathfind(&view, MapLocation::new(20, 20)) else {
                    break;
                };
                if view.move_unit(dir).is_err() {
                    break;
                }
                nav.record_visit(view.current_location());
            }
            black_box(nav.phase())
        })
    });
}

/// Whole rounds of the standard two-tower match.
pub fn match_benchmark(c: &mut Criterion) {
    c.bench_function("standard_match_100_rounds", |b| {
        b.iter(|| {
            let mut sandbox = Sandbox::new(fixtures::standard_match(), AgentConfig::default());
            black_box(sandbox.run(100).actions)
        })
    });
}

criterion_group!(benches, pathfind_benchmark, match_benchmark);
criterion_main!(benches);
