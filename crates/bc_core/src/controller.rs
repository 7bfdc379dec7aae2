//! Top-level tick entry point.
//!
//! [`tick`] is what a scheduler calls once per unit per round. It wraps the
//! archetype state machine with the recovery policy: a faulting tick is
//! logged and its changes to persistent state are rolled back, so the unit
//! always gets to decide again next round.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::behavior::{BehaviorState, Common, SoldierRole};
use crate::context::{Brain, UnitContext};
use crate::error::{ActionError, AgentError, Result};
use crate::geometry::{Direction, MapLocation};
use crate::world::{
    Message, PaintType, Team, TileObservation, UnitId, UnitObservation, UnitType, WorldQuery,
};

/// Summary of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Round the tick started in.
    pub round: u32,
    /// Unit that ticked.
    pub unit: UnitId,
    /// Behavior state after the tick, for mobile units.
    pub state: Option<BehaviorState>,
    /// Soldier role after the tick.
    pub role: Option<SoldierRole>,
    /// Direction moved, if the unit moved.
    pub moved: Option<Direction>,
    /// Non-move actions issued (paint, attack, build, mark, transfer, message).
    pub actions: u32,
    /// Error that aborted the tick, if any.
    pub fault: Option<String>,
    /// The round advanced before the tick finished.
    pub overran: bool,
    /// The unit has resigned.
    pub resigned: bool,
}

/// Run one tick for the unit behind `ctx`.
///
/// Never fails: faults are caught, logged and reported, and persistent state
/// is restored to what it was when the tick started. After the configured
/// resign round the unit resigns once and every later tick is a no-op.
pub fn tick<W, R>(ctx: &mut UnitContext, world: &mut W, rng: &mut R) -> TickReport
where
    W: WorldQuery + ?Sized,
    R: Rng,
{
    let started = world.round();
    let mut report = TickReport {
        round: started,
        unit: ctx.id(),
        state: ctx.behavior_state(),
        role: ctx.role(),
        moved: None,
        actions: 0,
        fault: None,
        overran: false,
        resigned: ctx.resigned(),
    };
    if ctx.resigned() {
        return report;
    }
    if ctx
        .config()
        .resign_after_round
        .is_some_and(|round| started >= round)
    {
        tracing::info!(round = started, unit = ctx.id().0, "resigning");
        world.resign();
        ctx.mark_resigned();
        report.resigned = true;
        return report;
    }

    ctx.begin_tick();
    let checkpoint = ctx.state.clone();
    let mut recorder = Recorder::new(world);
    if let Err(err) = dispatch(ctx, &mut recorder, rng) {
        tracing::warn!(
            round = started,
            unit = ctx.id().0,
            state = ?ctx.behavior_state(),
            %err,
            "tick fault, restoring checkpoint"
        );
        ctx.state = checkpoint;
        report.fault = Some(err.to_string());
    }
    report.moved = recorder.moved;
    report.actions = recorder.actions;

    if !world.unit_type().is_tower() {
        ctx.state.navigator.record_visit(world.current_location());
    }

    let finished = world.round();
    if finished != started {
        tracing::warn!(started, finished, unit = ctx.id().0, "tick overran its round");
        report.overran = true;
    }
    report.state = ctx.behavior_state();
    report.role = ctx.role();
    tracing::trace!(
        round = started,
        unit = ctx.id().0,
        state = ?report.state,
        role = ?report.role,
        moved = ?report.moved,
        actions = report.actions,
        "tick"
    );
    report
}

fn dispatch<W, R>(ctx: &mut UnitContext, world: &mut W, rng: &mut R) -> Result<()>
where
    W: WorldQuery + ?Sized,
    R: Rng,
{
    if world.unit_type().archetype() != ctx.archetype() {
        return Err(AgentError::InvalidState(format!(
            "context built for {:?} driving a {:?}",
            ctx.archetype(),
            world.unit_type()
        )));
    }
    let turns_alive = ctx.turns_alive();
    let (config, state) = ctx.config_and_state();
    let mut common = Common {
        nav: &mut state.navigator,
        resupply: &mut state.resupply,
        config,
        turns_alive,
    };
    match &mut state.brain {
        Brain::Soldier(brain) => brain.tick(world, &mut common, rng),
        Brain::Mopper(brain) => brain.tick(world, &mut common, rng),
        Brain::Splasher(brain) => brain.tick(world, &mut common, rng),
        Brain::Tower(brain) => brain.tick(world, config, rng),
    }
}

/// Pass-through view of the world that records what the tick did.
struct Recorder<'w, W: ?Sized> {
    inner: &'w mut W,
    moved: Option<Direction>,
    actions: u32,
}

impl<'w, W: WorldQuery + ?Sized> Recorder<'w, W> {
    fn new(inner: &'w mut W) -> Self {
        Self {
            inner,
            moved: None,
            actions: 0,
        }
    }

    fn count(
        &mut self,
        result: std::result::Result<(), ActionError>,
    ) -> std::result::Result<(), ActionError> {
        if result.is_ok() {
            self.actions += 1;
        }
        result
    }
}

impl<W: WorldQuery + ?Sized> WorldQuery for Recorder<'_, W> {
    fn round(&self) -> u32 {
        self.inner.round()
    }
    fn id(&self) -> UnitId {
        self.inner.id()
    }
    fn team(&self) -> Team {
        self.inner.team()
    }
    fn unit_type(&self) -> UnitType {
        self.inner.unit_type()
    }
    fn current_location(&self) -> MapLocation {
        self.inner.current_location()
    }
    fn map_bounds(&self) -> (i32, i32) {
        self.inner.map_bounds()
    }
    fn paint(&self) -> i32 {
        self.inner.paint()
    }
    fn money(&self) -> i32 {
        self.inner.money()
    }
    fn tower_count(&self) -> usize {
        self.inner.tower_count()
    }
    fn is_movement_ready(&self) -> bool {
        self.inner.is_movement_ready()
    }
    fn is_action_ready(&self) -> bool {
        self.inner.is_action_ready()
    }
    fn sense_tile(&self, loc: MapLocation) -> Option<TileObservation> {
        self.inner.sense_tile(loc)
    }
    fn sense_tiles_in_radius(&self, center: MapLocation, radius_sq: i32) -> Vec<TileObservation> {
        self.inner.sense_tiles_in_radius(center, radius_sq)
    }
    fn sense_units_in_radius(
        &self,
        center: MapLocation,
        radius_sq: i32,
        team: Option<Team>,
    ) -> Vec<UnitObservation> {
        self.inner.sense_units_in_radius(center, radius_sq, team)
    }
    fn sense_unit_at(&self, loc: MapLocation) -> Option<UnitObservation> {
        self.inner.sense_unit_at(loc)
    }
    fn can_move(&self, dir: Direction) -> bool {
        self.inner.can_move(dir)
    }
    fn move_unit(&mut self, dir: Direction) -> std::result::Result<(), ActionError> {
        self.inner.move_unit(dir)?;
        self.moved = Some(dir);
        Ok(())
    }
    fn can_act_on(&self, loc: MapLocation) -> bool {
        self.inner.can_act_on(loc)
    }
    fn act(&mut self, loc: MapLocation, secondary: bool) -> std::result::Result<(), ActionError> {
        let result = self.inner.act(loc, secondary);
        self.count(result)
    }
    fn can_swing(&self, dir: Direction) -> bool {
        self.inner.can_swing(dir)
    }
    fn swing(&mut self, dir: Direction) -> std::result::Result<(), ActionError> {
        let result = self.inner.swing(dir);
        self.count(result)
    }
    fn can_area_attack(&self) -> bool {
        self.inner.can_area_attack()
    }
    fn area_attack(&mut self) -> std::result::Result<(), ActionError> {
        let result = self.inner.area_attack();
        self.count(result)
    }
    fn can_mark(&self, loc: MapLocation) -> bool {
        self.inner.can_mark(loc)
    }
    fn mark(&mut self, loc: MapLocation, secondary: bool) -> std::result::Result<(), ActionError> {
        let result = self.inner.mark(loc, secondary);
        self.count(result)
    }
    fn can_build(&self, kind: UnitType, loc: MapLocation) -> bool {
        self.inner.can_build(kind, loc)
    }
    fn build(&mut self, kind: UnitType, loc: MapLocation) -> std::result::Result<(), ActionError> {
        let result = self.inner.build(kind, loc);
        self.count(result)
    }
    fn can_complete_resource_pattern(&self, center: MapLocation) -> bool {
        self.inner.can_complete_resource_pattern(center)
    }
    fn complete_resource_pattern(
        &mut self,
        center: MapLocation,
    ) -> std::result::Result<(), ActionError> {
        let result = self.inner.complete_resource_pattern(center);
        self.count(result)
    }
    fn can_transfer_paint(&self, loc: MapLocation, amount: i32) -> bool {
        self.inner.can_transfer_paint(loc, amount)
    }
    fn transfer_paint(
        &mut self,
        loc: MapLocation,
        amount: i32,
    ) -> std::result::Result<(), ActionError> {
        let result = self.inner.transfer_paint(loc, amount);
        self.count(result)
    }
    fn can_send_message(&self, loc: MapLocation) -> bool {
        self.inner.can_send_message(loc)
    }
    fn send_message(
        &mut self,
        loc: MapLocation,
        payload: u32,
    ) -> std::result::Result<(), ActionError> {
        let result = self.inner.send_message(loc, payload);
        self.count(result)
    }
    fn can_broadcast(&self) -> bool {
        self.inner.can_broadcast()
    }
    fn broadcast(&mut self, payload: u32) -> std::result::Result<(), ActionError> {
        let result = self.inner.broadcast(payload);
        self.count(result)
    }
    fn drain_inbox(&mut self, since_round: u32) -> Vec<Message> {
        self.inner.drain_inbox(since_round)
    }
    fn resign(&mut self) {
        self.inner.resign();
    }
    fn read_marker(&self, loc: MapLocation) -> Option<PaintType> {
        self.inner.read_marker(loc)
    }
}
