//! Navigator scenarios against the grid world.

use bc_core::config::AgentConfig;
use bc_core::geometry::{Direction, MapLocation};
use bc_core::navigation::explore::unpainted_weights;
use bc_core::navigation::{NavPhase, Navigator};
use bc_core::world::{Team, UnitId, UnitType, WorldQuery};
use bc_test_utils::fixtures;
use bc_test_utils::strategies::{arb_direction, arb_location, arb_open_trip};
use bc_test_utils::GridWorld;
use proptest::prelude::*;

/// Outcome of driving a unit with repeated `pathfind` calls.
#[derive(Debug, Default)]
struct Drive {
    arrived: bool,
    calls: usize,
    tracing_calls: usize,
    first_cross_point: Option<MapLocation>,
}

fn drive(
    world: &mut GridWorld,
    id: UnitId,
    nav: &mut Navigator,
    target: MapLocation,
    max_calls: usize,
) -> Drive {
    let mut result = Drive::default();
    for _ in 0..max_calls {
        world.begin_round();
        let mut view = world.view(id).expect("unit alive");
        if view.current_location() == target {
            result.arrived = true;
            return result;
        }
        let dir = nav.pathfind(&view, target);
        result.calls += 1;
        if nav.phase() == NavPhase::Tracing {
            result.tracing_calls += 1;
            if result.first_cross_point.is_none() {
                result.first_cross_point = nav.cross_point();
            }
        }
        let Some(dir) = dir else {
            break;
        };
        assert!(view.can_move(dir), "pathfind returned illegal {dir:?}");
        view.move_unit(dir).expect("checked move");
        nav.record_visit(view.current_location());
    }
    result.arrived = world.unit(id).is_some_and(|unit| unit.location == target);
    result
}

fn soldier_at(width: i32, height: i32, loc: MapLocation) -> (GridWorld, UnitId) {
    fixtures::single_unit(width, height, UnitType::Soldier, loc)
}

#[test]
fn test_open_map_east_in_five_calls() {
    let (mut world, id) = soldier_at(20, 20, MapLocation::new(5, 5));
    let mut nav = Navigator::new(&AgentConfig::default());
    let target = MapLocation::new(10, 5);

    for expected_x in 6..=10 {
        world.begin_round();
        let mut view = world.view(id).expect("alive");
        let dir = nav.pathfind(&view, target);
        assert_eq!(dir, Some(Direction::East));
        view.move_unit(Direction::East).expect("open map");
        nav.record_visit(view.current_location());
        assert_eq!(view.current_location(), MapLocation::new(expected_x, 5));
    }

    world.begin_round();
    let view = world.view(id).expect("alive");
    assert_eq!(nav.pathfind(&view, target), None);
    assert_eq!(nav.goal(), None);
}

#[test]
fn test_single_wall_cell_is_walked_around() {
    let (mut world, id) = soldier_at(20, 20, MapLocation::new(5, 5));
    world.set_wall(MapLocation::new(5, 10), true);
    let mut nav = Navigator::new(&AgentConfig::default());

    let result = drive(&mut world, id, &mut nav, MapLocation::new(5, 15), 80);
    assert!(result.arrived, "{result:?}");
    assert!(result.calls <= 2 * (20 + 20));
    assert!(world.violations().is_empty());
}

#[test]
fn test_wide_wall_escalates_to_tracing() {
    let (mut world, id) = soldier_at(20, 20, MapLocation::new(5, 5));
    fixtures::wall_row(&mut world, 10, 2, 8);
    let mut nav = Navigator::new(&AgentConfig::default());
    let target = MapLocation::new(5, 15);

    let result = drive(&mut world, id, &mut nav, target, 200);
    assert!(result.arrived, "{result:?}");

    let cross_point = result.first_cross_point.expect("greedy stalled and traced");
    assert_eq!(cross_point.y, 11, "cross-point lies just beyond the wall");
    assert!((2..=8).contains(&cross_point.x));
    assert!(result.tracing_calls <= 2 * (20 + 20) as usize);
    assert!(world.violations().is_empty());
}

#[test]
fn test_greedy_prefers_ally_paint_on_tie() {
    let (mut world, id) = soldier_at(11, 11, MapLocation::new(5, 5));
    world.set_wall(MapLocation::new(5, 6), true);
    world.set_paint(MapLocation::new(4, 6), Some((Team::A, false)));
    world.begin_round();
    let mut nav = Navigator::new(&AgentConfig::default());
    let view = world.view(id).expect("alive");
    assert_eq!(nav.pathfind(&view, MapLocation::new(5, 10)), Some(Direction::NorthWest));
}

#[test]
fn test_greedy_avoids_enemy_paint_on_tie() {
    let (mut world, id) = soldier_at(11, 11, MapLocation::new(5, 5));
    world.set_wall(MapLocation::new(5, 6), true);
    world.set_paint(MapLocation::new(6, 6), Some((Team::B, false)));
    world.begin_round();
    let mut nav = Navigator::new(&AgentConfig::default());
    let view = world.view(id).expect("alive");
    assert_eq!(nav.pathfind(&view, MapLocation::new(5, 10)), Some(Direction::NorthWest));
}

#[test]
fn test_reset_matches_fresh_navigator() {
    let (mut world, id) = soldier_at(20, 20, MapLocation::new(5, 5));
    fixtures::wall_row(&mut world, 10, 2, 8);
    let config = AgentConfig::default();
    let mut nav = Navigator::new(&config);

    let mut traced = false;
    for _ in 0..30 {
        world.begin_round();
        let mut view = world.view(id).expect("alive");
        let Some(dir) = nav.pathfind(&view, MapLocation::new(5, 15)) else {
            break;
        };
        if nav.phase() == NavPhase::Tracing {
            traced = true;
            break;
        }
        view.move_unit(dir).expect("checked move");
        nav.record_visit(view.current_location());
    }
    assert!(traced);

    nav.reset();
    assert_eq!(nav.phase(), NavPhase::Greedy);
    assert_eq!(nav.stall_count(), 0);
    assert_eq!(nav.cross_point(), None);
    assert_eq!(nav.goal(), None);

    world.begin_round();
    let view = world.view(id).expect("alive");
    let mut fresh = Navigator::new(&config);
    let elsewhere = MapLocation::new(15, 3);
    assert_eq!(nav.pathfind(&view, elsewhere), fresh.pathfind(&view, elsewhere));
    assert_eq!(nav.phase(), fresh.phase());
    assert_eq!(nav.stall_count(), fresh.stall_count());
}

#[test]
fn test_reset_forgets_recent_visits_on_tie() {
    let (mut world, id) = soldier_at(11, 11, MapLocation::new(5, 5));
    world.set_wall(MapLocation::new(5, 6), true);
    world.begin_round();
    let config = AgentConfig::default();
    let target = MapLocation::new(5, 10);
    let view = world.view(id).expect("alive");

    let mut fresh = Navigator::new(&config);
    let fresh_choice = fresh.pathfind(&view, target);

    let mut remembering = Navigator::new(&config);
    remembering.record_visit(MapLocation::new(6, 6));
    assert_ne!(remembering.pathfind(&view, target), fresh_choice);

    let mut nav = Navigator::new(&config);
    nav.record_visit(MapLocation::new(6, 6));
    nav.reset();
    assert!(nav.recent().is_empty());
    assert_eq!(nav.pathfind(&view, target), fresh_choice);
}

#[test]
fn test_trace_walks_back_over_recent_cells_to_leave_a_pocket() {
    let (mut world, id) = soldier_at(20, 20, MapLocation::new(5, 6));
    fixtures::wall_row(&mut world, 8, 3, 7);
    for y in 5..=7 {
        world.set_wall(MapLocation::new(3, y), true);
        world.set_wall(MapLocation::new(7, y), true);
    }
    let config = AgentConfig {
        recent_capacity: 64,
        ..AgentConfig::default()
    };
    let mut nav = Navigator::new(&config);
    let way_out = [MapLocation::new(4, 6), MapLocation::new(4, 5), MapLocation::new(3, 4)];
    for cell in way_out {
        nav.record_visit(cell);
    }
    let target = MapLocation::new(5, 15);

    let mut traced_over_recent = false;
    for _ in 0..120 {
        world.begin_round();
        let mut view = world.view(id).expect("alive");
        if view.current_location() == target {
            break;
        }
        let Some(dir) = nav.pathfind(&view, target) else {
            break;
        };
        let next = view.current_location().add(dir);
        if nav.phase() == NavPhase::Tracing && way_out.contains(&next) {
            traced_over_recent = true;
        }
        view.move_unit(dir).expect("checked move");
        nav.record_visit(view.current_location());
    }

    assert!(traced_over_recent, "trace left the pocket through remembered cells");
    assert_eq!(world.unit(id).map(|unit| unit.location), Some(target));
    assert!(world.violations().is_empty());
}

#[test]
fn test_unpainted_weights_count_five_per_open_cell() {
    let (mut world, id) = soldier_at(20, 20, MapLocation::new(5, 5));
    for x in 2..=4 {
        for y in 4..=6 {
            if (x, y) != (2, 6) {
                world.set_paint(MapLocation::new(x, y), Some((Team::A, false)));
            }
        }
    }
    world.begin_round();
    let view = world.view(id).expect("alive");
    let candidates = [MapLocation::new(6, 5), MapLocation::new(4, 5)];
    assert_eq!(unpainted_weights(&view, &candidates), vec![45, 5]);
}

#[test]
fn test_boxed_in_unit_gets_no_direction() {
    let (mut world, id) = soldier_at(5, 5, MapLocation::new(2, 2));
    for dir in Direction::ALL {
        world.set_wall(MapLocation::new(2, 2).add(dir), true);
    }
    world.begin_round();
    let mut nav = Navigator::new(&AgentConfig::default());
    let view = world.view(id).expect("alive");
    assert_eq!(nav.pathfind(&view, MapLocation::new(4, 4)), None);
}

proptest! {
    #[test]
    fn prop_open_map_arrives_in_chebyshev_steps((width, height, start, target) in arb_open_trip()) {
        let (mut world, id) = soldier_at(width, height, start);
        let mut nav = Navigator::new(&AgentConfig::default());
        let steps = (target.x - start.x).abs().max((target.y - start.y).abs()) as usize;

        let result = drive(&mut world, id, &mut nav, target, steps + 1);
        prop_assert!(result.arrived);
        prop_assert_eq!(result.calls, steps);
    }

    #[test]
    fn prop_neighbour_points_back(loc in arb_location(32, 32), dir in arb_direction()) {
        let next = loc.add(dir);
        prop_assert_eq!(loc.direction_to(next), dir);
        prop_assert_eq!(next.direction_to(loc), dir.opposite());
    }

    #[test]
    fn prop_greedy_only_returns_legal_moves(
        start in arb_location(16, 16),
        target in arb_location(16, 16),
        walls in proptest::collection::vec(arb_location(16, 16), 0..40),
    ) {
        prop_assume!(!walls.contains(&start));
        let (mut world, id) = soldier_at(16, 16, start);
        for wall in &walls {
            world.set_wall(*wall, true);
        }
        let mut nav = Navigator::new(&AgentConfig::default());
        for _ in 0..40 {
            world.begin_round();
            let mut view = world.view(id).expect("alive");
            let Some(dir) = nav.pathfind(&view, target) else {
                break;
            };
            prop_assert!(view.can_move(dir));
            view.move_unit(dir).expect("checked move");
            nav.record_visit(view.current_location());
        }
        prop_assert!(world.violations().is_empty());
    }
}
