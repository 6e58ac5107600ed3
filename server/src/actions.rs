//! Command processor: validates and applies player-submitted actions.
//!
//! Every action is checked against the same ladder — location, state,
//! affordability — and failures come back as a structured [`ActionFailure`]
//! for the one requesting client. The global cooldown is enforced by the
//! world store before dispatch reaches this module.

use log::debug;
use rand::rngs::StdRng;
use rand::Rng;
use shared::{
    ActionKind, BLAST_ENERGY_COST, COMBAT_AP_COST, ENERGY_BATCH_SIZE, ENERGY_UNIT_PRICE,
    ENGAGE_RANGE, NPC_BOUNTY_MAX, NPC_BOUNTY_MIN, NPC_RESPAWN_SHIELD_FACTOR, SHIELD_BATCH_SIZE,
    SHIELD_UNIT_PRICE, TRADE_AP_COST,
};
use thiserror::Error;

use crate::movement;
use crate::world::entities::{Hub, Npc, Player, Port};

/// A validated player command. `from_wire` is the only place the optional
/// target id is interpreted, so a missing target is rejected before any
/// domain logic runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Trade,
    Travel { port_id: u32 },
    UpgradeCargo,
    EngageCombat { npc_id: u32 },
    FireBlast { npc_id: u32 },
    BuyShields,
    BuyEnergy,
}

impl Action {
    pub fn from_wire(kind: ActionKind, target_id: Option<u32>) -> Result<Self, ActionFailure> {
        let need_target = || {
            target_id.ok_or_else(|| {
                ActionFailure::InvalidRequest(format!("{} requires a target id", kind))
            })
        };
        Ok(match kind {
            ActionKind::Trade => Action::Trade,
            ActionKind::Travel => Action::Travel {
                port_id: need_target()?,
            },
            ActionKind::UpgradeCargo => Action::UpgradeCargo,
            ActionKind::EngageCombat => Action::EngageCombat {
                npc_id: need_target()?,
            },
            ActionKind::FireBlast => Action::FireBlast {
                npc_id: need_target()?,
            },
            ActionKind::BuyShields => Action::BuyShields,
            ActionKind::BuyEnergy => Action::BuyEnergy,
        })
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Trade => ActionKind::Trade,
            Action::Travel { .. } => ActionKind::Travel,
            Action::UpgradeCargo => ActionKind::UpgradeCargo,
            Action::EngageCombat { .. } => ActionKind::EngageCombat,
            Action::FireBlast { .. } => ActionKind::FireBlast,
            Action::BuyShields => ActionKind::BuyShields,
            Action::BuyEnergy => ActionKind::BuyEnergy,
        }
    }
}

/// Domain failure taxonomy. All variants are recovered locally and reported
/// to the single requesting client; none of them interrupts the tick loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionFailure {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    PreconditionFailed(String),
    #[error("insufficient {resource}: need {needed}, have {available}")]
    InsufficientResource {
        resource: &'static str,
        needed: u64,
        available: u64,
    },
    #[error("action on cooldown: {remaining_ticks} ticks ({remaining_ms} ms) remaining")]
    Cooldown {
        remaining_ticks: u64,
        remaining_ms: u64,
    },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

fn check_resource(resource: &'static str, needed: u64, available: u64) -> Result<(), ActionFailure> {
    if available < needed {
        Err(ActionFailure::InsufficientResource {
            resource,
            needed,
            available,
        })
    } else {
        Ok(())
    }
}

/// Dispatches one already-cooldown-checked action. On success the player's
/// last-action tick is set to `tick`, arming the global cooldown for the
/// next action of any kind.
pub fn apply(
    player: &mut Player,
    ports: &mut [Port],
    hubs: &[Hub],
    npcs: &mut [Npc],
    rng: &mut StdRng,
    action: Action,
    tick: u64,
) -> Result<(), ActionFailure> {
    match action {
        Action::Trade => trade(player, ports),
        Action::Travel { port_id } => travel(player, ports, port_id),
        Action::UpgradeCargo => upgrade_cargo(player, hubs),
        Action::EngageCombat { npc_id } => engage_combat(player, npcs, npc_id),
        Action::FireBlast { npc_id } => fire_blast(player, npcs, rng, npc_id),
        Action::BuyShields => buy_shields(player, hubs),
        Action::BuyEnergy => buy_energy(player, hubs),
    }?;

    player.last_action_tick = Some(tick);
    debug!(
        "Player {} executed {} at tick {}",
        player.id,
        action.kind(),
        tick
    );
    Ok(())
}

fn trade(player: &mut Player, ports: &mut [Port]) -> Result<(), ActionFailure> {
    let port = &mut ports[player.port_id as usize];
    if !movement::within_tolerance(&player.position, &port.position) {
        return Err(ActionFailure::PreconditionFailed(
            "not docked at a port".to_string(),
        ));
    }
    check_resource(
        "action points",
        TRADE_AP_COST as u64,
        player.action_points as u64,
    )?;

    let (traded, profit) =
        movement::trade_yield(player.cargo_holds, port.remaining_cargo, port.max_cargo);
    player.action_points -= TRADE_AP_COST;
    player.credits += profit;
    player.total_profit += profit;
    port.remaining_cargo -= traded;
    Ok(())
}

fn travel(player: &mut Player, ports: &[Port], port_id: u32) -> Result<(), ActionFailure> {
    // A trip cannot be aborted or redirected; the player is committed until
    // arrival.
    if player.moving {
        return Err(ActionFailure::PreconditionFailed(
            "already traveling".to_string(),
        ));
    }
    let port = ports
        .get(port_id as usize)
        .ok_or_else(|| ActionFailure::NotFound(format!("port {}", port_id)))?;

    let distance = player.position.distance(&port.position);
    // The trade leg executed on arrival is reserved up front, together with
    // the trip itself.
    let cost = movement::travel_action_cost(distance, player.ship().travel_cost_multiplier);
    check_resource("action points", cost as u64, player.action_points as u64)?;

    player.action_points -= cost;
    player.destination_port_id = Some(port_id);
    player.travel_start = Some(player.position);
    player.progress = 0.0;
    player.moving = true;
    Ok(())
}

fn nearest_hub<'a>(player: &Player, hubs: &'a [Hub]) -> Option<&'a Hub> {
    hubs.iter().min_by(|a, b| {
        player
            .position
            .distance(&a.position)
            .total_cmp(&player.position.distance(&b.position))
    })
}

fn require_at_hub(player: &Player, hubs: &[Hub]) -> Result<(), ActionFailure> {
    match nearest_hub(player, hubs) {
        Some(hub) if movement::within_tolerance(&player.position, &hub.position) => Ok(()),
        _ => Err(ActionFailure::PreconditionFailed(
            "not docked at an upgrade hub".to_string(),
        )),
    }
}

fn upgrade_cargo(player: &mut Player, hubs: &[Hub]) -> Result<(), ActionFailure> {
    require_at_hub(player, hubs)?;
    if player.cargo_holds >= player.ship().max_cargo_holds {
        return Err(ActionFailure::PreconditionFailed(format!(
            "cargo holds already at the {}'s maximum of {}",
            player.ship().name,
            player.ship().max_cargo_holds
        )));
    }
    let cost = movement::upgrade_cost(player.cargo_holds);
    check_resource("credits", cost, player.credits)?;

    player.credits -= cost;
    player.cargo_holds += 1;
    Ok(())
}

fn engage_combat(player: &mut Player, npcs: &mut [Npc], npc_id: u32) -> Result<(), ActionFailure> {
    let npc = npcs
        .iter_mut()
        .find(|n| n.id == npc_id)
        .ok_or_else(|| ActionFailure::NotFound(format!("enemy {}", npc_id)))?;

    if player.position.distance(&npc.position) > ENGAGE_RANGE {
        return Err(ActionFailure::PreconditionFailed(
            "enemy out of engagement range".to_string(),
        ));
    }
    check_resource(
        "action points",
        COMBAT_AP_COST as u64,
        player.action_points as u64,
    )?;

    player.action_points -= COMBAT_AP_COST;
    npc.in_combat = true;
    npc.combat_target = Some(player.id);
    npc.calm_ticks = 0;
    Ok(())
}

fn fire_blast(
    player: &mut Player,
    npcs: &mut [Npc],
    rng: &mut StdRng,
    npc_id: u32,
) -> Result<(), ActionFailure> {
    let npc = npcs
        .iter_mut()
        .find(|n| n.id == npc_id)
        .ok_or_else(|| ActionFailure::NotFound(format!("enemy {}", npc_id)))?;

    if !npc.in_combat || npc.combat_target != Some(player.id) {
        return Err(ActionFailure::PreconditionFailed(
            "not in combat with this enemy".to_string(),
        ));
    }
    check_resource(
        "energy",
        BLAST_ENERGY_COST as u64,
        player.energy as u64,
    )?;
    check_resource(
        "action points",
        COMBAT_AP_COST as u64,
        player.action_points as u64,
    )?;

    player.energy -= BLAST_ENERGY_COST;
    player.action_points -= COMBAT_AP_COST;
    npc.shields = npc.shields.saturating_sub(movement::blast_damage());
    npc.calm_ticks = 0;

    if npc.shields == 0 {
        // Defeat: award the full bounty, then respawn in place with reduced
        // shields and a fresh bounty.
        let bounty = npc.credits;
        player.credits += bounty;
        player.total_profit += bounty;
        npc.in_combat = false;
        npc.combat_target = None;
        npc.shields = (npc.max_shields as f32 * NPC_RESPAWN_SHIELD_FACTOR).floor() as u32;
        npc.credits = rng.gen_range(NPC_BOUNTY_MIN..=NPC_BOUNTY_MAX);
        debug!(
            "Player {} defeated {} for a {} credit bounty",
            player.id, npc.name, bounty
        );
    }
    Ok(())
}

fn buy_shields(player: &mut Player, hubs: &[Hub]) -> Result<(), ActionFailure> {
    require_at_hub(player, hubs)?;
    if player.shields >= player.max_shields {
        return Err(ActionFailure::PreconditionFailed(
            "shields already full".to_string(),
        ));
    }
    let amount = SHIELD_BATCH_SIZE.min(player.max_shields - player.shields);
    let cost = amount as u64 * SHIELD_UNIT_PRICE;
    check_resource("credits", cost, player.credits)?;
    check_resource(
        "action points",
        COMBAT_AP_COST as u64,
        player.action_points as u64,
    )?;

    player.credits -= cost;
    player.action_points -= COMBAT_AP_COST;
    player.shields += amount;
    Ok(())
}

fn buy_energy(player: &mut Player, hubs: &[Hub]) -> Result<(), ActionFailure> {
    require_at_hub(player, hubs)?;
    if player.energy >= player.max_energy {
        return Err(ActionFailure::PreconditionFailed(
            "energy already full".to_string(),
        ));
    }
    let amount = ENERGY_BATCH_SIZE.min(player.max_energy - player.energy);
    let cost = amount as u64 * ENERGY_UNIT_PRICE;
    check_resource("credits", cost, player.credits)?;
    check_resource(
        "action points",
        COMBAT_AP_COST as u64,
        player.action_points as u64,
    )?;

    player.credits -= cost;
    player.action_points -= COMBAT_AP_COST;
    player.energy += amount;
    Ok(())
}
