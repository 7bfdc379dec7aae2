//! State-machine scenarios driven through `controller::tick`.

use bc_core::behavior::{BehaviorState, SoldierBrain, SoldierRole, TowerBrain};
use bc_core::comms::Payload;
use bc_core::config::AgentConfig;
use bc_core::context::{Brain, UnitContext};
use bc_core::controller;
use bc_core::geometry::{Direction, MapLocation};
use bc_core::world::{PaintType, Team, TowerKind, UnitArchetype, UnitId, UnitType};
use bc_test_utils::{fixtures, GridWorld, Sandbox};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn advance_to(world: &mut GridWorld, round: u32) {
    while world.round() < round {
        world.begin_round();
    }
}

fn soldier_at(loc: MapLocation) -> (GridWorld, UnitId) {
    fixtures::single_unit(20, 20, UnitType::Soldier, loc)
}

fn tick_once(
    world: &mut GridWorld,
    id: UnitId,
    ctx: &mut UnitContext,
    rng: &mut ChaCha8Rng,
) -> controller::TickReport {
    world.begin_round();
    let mut view = world.view(id).expect("unit alive");
    controller::tick(ctx, &mut view, rng)
}

fn set_paint(world: &mut GridWorld, id: UnitId, paint: i32) {
    world.unit_mut(id).expect("unit alive").paint = paint;
}

fn tower_brain(ctx: &UnitContext) -> &TowerBrain {
    match &ctx.state.brain {
        Brain::Tower(brain) => brain,
        other => panic!("not a tower: {other:?}"),
    }
}

fn paint_everything(world: &mut GridWorld, team: Team) {
    let (width, height) = world.bounds();
    for x in 0..width {
        for y in 0..height {
            world.set_paint(MapLocation::new(x, y), Some((team, false)));
        }
    }
}

fn resume_after_low(ctx: &UnitContext) -> Option<BehaviorState> {
    match &ctx.state.brain {
        Brain::Soldier(brain) => brain.machine().resume_after_low(),
        Brain::Mopper(_) | Brain::Splasher(_) | Brain::Tower(_) => None,
    }
}

#[test]
fn test_low_paint_stashes_and_restores_exploring() {
    let (mut world, id) = soldier_at(MapLocation::new(10, 10));
    advance_to(&mut world, 10);
    set_paint(&mut world, id, 10);
    let mut ctx = UnitContext::new(id, UnitArchetype::Soldier, AgentConfig::default());
    let mut rng = ChaCha8Rng::seed_from_u64(3407);

    let report = tick_once(&mut world, id, &mut ctx, &mut rng);
    assert_eq!(report.fault, None);
    assert_eq!(ctx.behavior_state(), Some(BehaviorState::LowOnResource));
    assert_eq!(resume_after_low(&ctx), Some(BehaviorState::Exploring));

    set_paint(&mut world, id, 150);
    tick_once(&mut world, id, &mut ctx, &mut rng);
    assert_eq!(ctx.behavior_state(), Some(BehaviorState::Exploring));
    assert!(world.violations().is_empty());
}

#[test]
fn test_low_paint_exits_on_the_tick_it_recovers() {
    let (mut world, id) = soldier_at(MapLocation::new(10, 10));
    advance_to(&mut world, 10);
    set_paint(&mut world, id, 8);
    let config = AgentConfig::default();
    let threshold = config.low_paint_threshold;
    let mut ctx = UnitContext::new(id, UnitArchetype::Soldier, config);
    let mut rng = ChaCha8Rng::seed_from_u64(3407);

    let mut recovered = false;
    for _ in 0..20 {
        let before = world.unit(id).expect("alive").paint;
        tick_once(&mut world, id, &mut ctx, &mut rng);
        if before >= threshold {
            assert_ne!(ctx.behavior_state(), Some(BehaviorState::LowOnResource));
            recovered = true;
            break;
        }
        assert_eq!(ctx.behavior_state(), Some(BehaviorState::LowOnResource));
        let paint = world.unit(id).expect("alive").paint + 3;
        set_paint(&mut world, id, paint);
    }
    assert!(recovered);
}

#[test]
fn test_low_soldier_refills_at_paint_tower() {
    let (mut world, id) = soldier_at(MapLocation::new(10, 10));
    world
        .add_unit(Team::A, UnitType::Tower(TowerKind::Paint), MapLocation::new(10, 14))
        .expect("tower");
    advance_to(&mut world, 10);
    set_paint(&mut world, id, 10);
    let mut ctx = UnitContext::new(id, UnitArchetype::Soldier, AgentConfig::default());
    let mut rng = ChaCha8Rng::seed_from_u64(3407);

    let mut left_low = false;
    for _ in 0..10 {
        tick_once(&mut world, id, &mut ctx, &mut rng);
        if ctx.behavior_state() != Some(BehaviorState::LowOnResource) {
            left_low = true;
            break;
        }
    }
    assert!(left_low);
    assert!(world.unit(id).expect("alive").paint >= 20);
    assert_eq!(ctx.state.resupply.location, Some(MapLocation::new(10, 14)));
    assert!(world.violations().is_empty());
}

#[test]
fn test_developer_fills_and_builds_structure() {
    let (mut world, id) = soldier_at(MapLocation::new(10, 6));
    let ruin = MapLocation::new(10, 10);
    world.set_ruin(ruin);
    advance_to(&mut world, 10);
    let mut ctx = UnitContext::new(id, UnitArchetype::Soldier, AgentConfig::default());
    let mut rng = ChaCha8Rng::seed_from_u64(3407);

    let mut filling = false;
    for _ in 0..80 {
        let report = tick_once(&mut world, id, &mut ctx, &mut rng);
        assert_eq!(report.fault, None);
        filling |= report.state == Some(BehaviorState::FillingStructure);
        if world.tower_count(Team::A) == 1 {
            break;
        }
    }

    assert!(filling);
    assert_eq!(world.tower_count(Team::A), 1);
    assert_eq!(
        world.unit_at(ruin).map(|unit| unit.unit_type),
        Some(UnitType::Tower(TowerKind::Paint))
    );
    let marker = world.cell(ruin.add(Direction::North)).expect("on map");
    assert_eq!(marker.marks[0], Some(false), "paint marker north of the ruin");
    assert_eq!(ctx.behavior_state(), Some(BehaviorState::LowOnResource));
    assert_eq!(resume_after_low(&ctx), Some(BehaviorState::Exploring));
    assert!(world.violations().is_empty(), "{:?}", world.violations());
}

#[test]
fn test_pattern_filler_completes_resource_pattern() {
    let (mut world, id) = soldier_at(MapLocation::new(9, 9));
    advance_to(&mut world, 10);
    let mut ctx = UnitContext::new(id, UnitArchetype::Soldier, AgentConfig::default());
    ctx.state.brain = Brain::Soldier(SoldierBrain::with_role(SoldierRole::PatternFiller));
    let mut rng = ChaCha8Rng::seed_from_u64(3407);
    let center = MapLocation::new(8, 8);

    let mut filling = false;
    for _ in 0..60 {
        let report = tick_once(&mut world, id, &mut ctx, &mut rng);
        assert_eq!(report.fault, None);
        filling |= report.state == Some(BehaviorState::FillingPattern);
        if world.resource_pattern_count(Team::A) == 1 {
            break;
        }
    }

    assert!(filling);
    assert_eq!(world.resource_pattern_count(Team::A), 1);
    assert_eq!(world.cell(center).expect("on map").marks[0], Some(false));
    assert!(world.violations().is_empty(), "{:?}", world.violations());
}

#[test]
fn test_sighting_is_delivered_then_exploring_resumes() {
    let (mut world, id) = soldier_at(MapLocation::new(10, 10));
    let tower = world
        .add_unit(Team::A, UnitType::Tower(TowerKind::Paint), MapLocation::new(10, 13))
        .expect("tower");
    let sighting = MapLocation::new(12, 10);
    world.set_paint(sighting, Some((Team::B, false)));
    advance_to(&mut world, 10);
    let mut ctx = UnitContext::new(id, UnitArchetype::Soldier, AgentConfig::default());
    let mut rng = ChaCha8Rng::seed_from_u64(3407);

    tick_once(&mut world, id, &mut ctx, &mut rng);
    assert_eq!(ctx.behavior_state(), Some(BehaviorState::DeliveringMessage));
    assert!(world.unit(tower).expect("tower").inbox.is_empty());

    tick_once(&mut world, id, &mut ctx, &mut rng);
    assert_eq!(ctx.behavior_state(), Some(BehaviorState::Exploring));
    let inbox = &world.unit(tower).expect("tower").inbox;
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].sender, id);
    match Payload::decode(inbox[0].payload).expect("tagged") {
        Payload::Tile(report) => {
            assert_eq!(report.location, sighting);
            assert_eq!(report.paint, PaintType::EnemyPrimary);
        }
        other => panic!("unexpected payload {other:?}"),
    }
    assert!(world.violations().is_empty());
}

#[test]
fn test_tower_relays_mobile_sighting_to_other_towers() {
    let (mut world, soldier) = soldier_at(MapLocation::new(10, 10));
    let near = world
        .add_unit(Team::A, UnitType::Tower(TowerKind::Paint), MapLocation::new(10, 13))
        .expect("tower");
    let far = world
        .add_unit(Team::A, UnitType::Tower(TowerKind::Money), MapLocation::new(2, 2))
        .expect("tower");
    let sighting = MapLocation::new(12, 10);
    world.set_paint(sighting, Some((Team::B, false)));
    advance_to(&mut world, 10);
    let config = AgentConfig::default();
    let mut soldier_ctx = UnitContext::new(soldier, UnitArchetype::Soldier, config.clone());
    let mut near_ctx = UnitContext::new(near, UnitArchetype::Tower, config.clone());
    let mut far_ctx = UnitContext::new(far, UnitArchetype::Tower, config);
    let mut rng = ChaCha8Rng::seed_from_u64(3407);

    tick_once(&mut world, soldier, &mut soldier_ctx, &mut rng);
    tick_once(&mut world, soldier, &mut soldier_ctx, &mut rng);
    assert_eq!(world.unit(near).expect("tower").inbox.len(), 1);

    tick_once(&mut world, near, &mut near_ctx, &mut rng);
    assert_eq!(tower_brain(&near_ctx).enemy_target(), Some(sighting));
    assert!(!tower_brain(&near_ctx).alert_pending(), "alert goes out on the reading tick");
    let queued: Vec<_> = tower_brain(&near_ctx)
        .queue()
        .iter()
        .map(|command| command.unit_type())
        .collect();
    assert_eq!(queued.len(), 1);
    assert!(matches!(queued[0], UnitType::Mopper | UnitType::Splasher), "{queued:?}");
    assert!(world.unit(far).expect("tower").inbox.is_empty());

    tick_once(&mut world, near, &mut near_ctx, &mut rng);
    assert_eq!(world.unit(far).expect("tower").inbox.len(), 1);

    tick_once(&mut world, far, &mut far_ctx, &mut rng);
    assert_eq!(tower_brain(&far_ctx).enemy_target(), Some(sighting));
    assert!(tower_brain(&far_ctx).queue().is_empty(), "relayed sightings queue nothing");
    assert!(world.violations().is_empty());
}

#[test]
fn test_stuck_soldier_keeps_moving_and_recovers_when_ground_opens() {
    let (mut world, id) = soldier_at(MapLocation::new(10, 10));
    paint_everything(&mut world, Team::A);
    let bystander = MapLocation::new(12, 10);
    world.set_paint(bystander, None);
    world.add_unit(Team::A, UnitType::Soldier, bystander).expect("bystander");
    advance_to(&mut world, 10);
    let mut ctx = UnitContext::new(id, UnitArchetype::Soldier, AgentConfig::default());
    let mut rng = ChaCha8Rng::seed_from_u64(3407);

    let mut moves = 0;
    for _ in 0..40 {
        let report = tick_once(&mut world, id, &mut ctx, &mut rng);
        assert_eq!(report.fault, None);
        assert_ne!(report.state, Some(BehaviorState::Exploring), "nothing to paint in sight");
        moves += usize::from(report.moved.is_some());
    }
    assert!(moves >= 30, "stuck soldier moved only {moves} times");
    assert_eq!(ctx.behavior_state(), Some(BehaviorState::Stuck));

    let here = world.unit(id).expect("alive").location;
    let opened = [(3, 0), (-3, 0), (0, 3), (0, -3)]
        .into_iter()
        .map(|(dx, dy)| here.translate(dx, dy))
        .find(|loc| loc.is_on_map(20, 20) && world.unit_at(*loc).is_none())
        .expect("open cell three steps away");
    world.set_paint(opened, None);

    let report = tick_once(&mut world, id, &mut ctx, &mut rng);
    assert!(report.moved.is_some());
    assert_eq!(ctx.behavior_state(), Some(BehaviorState::Exploring));
    assert!(world.violations().is_empty());
}

#[test]
fn test_exploring_soldier_paints_the_tile_it_leaves() {
    let (mut world, id) = soldier_at(MapLocation::new(10, 10));
    advance_to(&mut world, 10);
    let mut ctx = UnitContext::new(id, UnitArchetype::Soldier, AgentConfig::default());
    let mut rng = ChaCha8Rng::seed_from_u64(3407);
    tick_once(&mut world, id, &mut ctx, &mut rng);

    let start = world.unit(id).expect("alive").location;
    world.set_paint(start, None);
    let report = tick_once(&mut world, id, &mut ctx, &mut rng);
    assert_eq!(report.fault, None);
    assert_eq!(report.state, Some(BehaviorState::Exploring));
    assert!(report.moved.is_some());
    assert_eq!(
        world.cell(start).and_then(|cell| cell.paint).map(|(team, _)| team),
        Some(Team::A)
    );
    assert!(world.violations().is_empty());
}

#[test]
fn test_resigned_unit_ignores_later_ticks() {
    let (mut world, id) = soldier_at(MapLocation::new(10, 10));
    let config = AgentConfig::default().with_resign_after(3);
    let mut ctx = UnitContext::new(id, UnitArchetype::Soldier, config);
    let mut rng = ChaCha8Rng::seed_from_u64(3407);

    for _ in 0..6 {
        tick_once(&mut world, id, &mut ctx, &mut rng);
    }
    assert!(ctx.resigned());
    assert!(world.unit(id).expect("alive").resigned);
    let report = tick_once(&mut world, id, &mut ctx, &mut rng);
    assert!(report.resigned);
    assert_eq!(report.moved, None);
    assert_eq!(report.actions, 0);
}

#[test]
fn test_wrong_archetype_faults_without_panicking() {
    let (mut world, id) = fixtures::single_unit(20, 20, UnitType::Mopper, MapLocation::new(10, 10));
    let mut ctx = UnitContext::new(id, UnitArchetype::Soldier, AgentConfig::default());
    let mut rng = ChaCha8Rng::seed_from_u64(3407);

    let before = ctx.state.clone();
    let report = tick_once(&mut world, id, &mut ctx, &mut rng);
    assert!(report.fault.is_some());
    assert_eq!(ctx.state.brain, before.brain);
}

#[test]
fn test_tower_opens_with_a_soldier() {
    let mut world = fixtures::open_map(20, 20);
    let tower = world
        .add_unit(Team::A, UnitType::Tower(TowerKind::Paint), MapLocation::new(3, 3))
        .expect("tower");
    let mut sandbox = Sandbox::new(world, AgentConfig::default());
    sandbox.step();

    let spawned: Vec<_> = sandbox
        .world()
        .units()
        .filter(|unit| unit.id != tower)
        .collect();
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].unit_type, UnitType::Soldier);
    assert!(spawned[0].location.is_within_distance_squared(MapLocation::new(3, 3), 2));
}

#[test]
fn test_opening_mopper_against_enemy_paint() {
    let mut world = fixtures::open_map(20, 20);
    world
        .add_unit(Team::A, UnitType::Tower(TowerKind::Paint), MapLocation::new(5, 5))
        .expect("tower");
    for x in 7..=9 {
        world.set_paint(MapLocation::new(x, 5), Some((Team::B, false)));
    }
    let mut sandbox = Sandbox::new(world, AgentConfig::default());
    sandbox.run(2);

    let types: Vec<_> = sandbox.world().units().map(|unit| unit.unit_type).collect();
    assert!(types.contains(&UnitType::Mopper), "{types:?}");
}

#[test]
fn test_standard_match_issues_no_illegal_action() {
    let mut sandbox = Sandbox::new(fixtures::standard_match(), AgentConfig::default());
    let stats = sandbox.run(300).clone();

    assert!(sandbox.world().violations().is_empty(), "{:?}", sandbox.world().violations());
    assert_eq!(stats.faults, 0, "{:?}", stats.fault_reports);
    assert_eq!(stats.overruns, 0);
    assert!(stats.moves > 0);
    assert!(sandbox.world().painted_count(Team::A) > 0);
    assert!(sandbox.world().painted_count(Team::B) > 0);
}
