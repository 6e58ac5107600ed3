//! Movement interpolation and the damage/economy formulas shared by the
//! command processor and the agent controller.

use shared::{
    Vec3, ARRIVAL_TOLERANCE, BLAST_ENERGY_COST, PROFIT_PER_UNIT, TICK_INTERVAL_MS, TRADE_AP_COST,
    UPGRADE_BASE_COST, UPGRADE_COST_GROWTH,
};

/// Seconds assumed to elapse per tick when advancing travel progress.
const TICK_SECONDS: f32 = TICK_INTERVAL_MS as f32 / 1000.0;

/// Progress gained this tick for a trip of `distance` units at `speed`
/// units/second. A degenerate (zero-length) trip completes immediately.
pub fn progress_step(distance: f32, speed: f32) -> f32 {
    let travel_time = distance / speed;
    if travel_time <= f32::EPSILON {
        1.0
    } else {
        TICK_SECONDS / travel_time
    }
}

/// One interpolation step between trip endpoints. Returns the new position
/// and progress; progress >= 1.0 means the mover has arrived and should be
/// snapped to `end`.
pub fn interpolate(start: &Vec3, end: &Vec3, progress: f32, speed: f32) -> (Vec3, f32) {
    let next = progress + progress_step(start.distance(end), speed);
    (start.lerp(end, next), next)
}

/// True when `position` is close enough to `target` to interact with it.
pub fn within_tolerance(position: &Vec3, target: &Vec3) -> bool {
    position.distance(target) <= ARRIVAL_TOLERANCE
}

/// Action points consumed by a trip of `distance` units with the ship's
/// travel-cost multiplier.
pub fn travel_cost(distance: f32, multiplier: f32) -> u32 {
    (distance.ceil() * multiplier).ceil() as u32
}

/// Up-front cost of a TRAVEL action: the trip plus the trade executed
/// automatically on arrival. Charged exactly once, at submission.
pub fn travel_action_cost(distance: f32, multiplier: f32) -> u32 {
    travel_cost(distance, multiplier) + TRADE_AP_COST
}

/// Units moved and credits earned by trading `cargo_holds` worth of capacity
/// against a port with `remaining` of `max` cargo left. Profit scales with
/// the port's efficiency and is floored to whole credits.
pub fn trade_yield(cargo_holds: u32, remaining: u32, max: u32) -> (u32, u64) {
    if max == 0 {
        return (0, 0);
    }
    let traded = cargo_holds.min(remaining);
    let efficiency = remaining as f64 / max as f64;
    let profit = (traded as f64 * efficiency * PROFIT_PER_UNIT).floor() as u64;
    (traded, profit)
}

/// Shield damage of one blast.
pub fn blast_damage() -> u32 {
    BLAST_ENERGY_COST / 2
}

/// Escalating credit cost of the next cargo-hold upgrade. The exponent is
/// anchored at the 50-hold starting loadout.
pub fn upgrade_cost(cargo_holds: u32) -> u64 {
    let steps = cargo_holds as i32 - 49;
    (UPGRADE_BASE_COST * UPGRADE_COST_GROWTH.powi(steps)).floor() as u64
}
