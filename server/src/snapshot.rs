//! Snapshot builders: convert live world entities into the plain wire
//! shapes, split into the rarely-sent static payload and the per-tick
//! dynamic payload.

use shared::{
    CombinedState, DynamicState, HubState, NpcState, PlayerState, PortState, StaticState,
};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::world::entities::{Bot, Hub, Npc, Player, Port};
use crate::world::WorldState;

/// Where per-tick snapshots are handed off. The world never talks to the
/// transport directly; the server loop hands it a publisher at startup.
pub trait Publisher: Send + Sync {
    /// Fan the dynamic payload out to every connected client.
    fn publish_dynamic(&self, state: DynamicState);
    /// Deliver the static payload to one client, on join.
    fn publish_static(&self, player_id: u32, state: StaticState);
}

pub fn port_state(port: &Port) -> PortState {
    PortState {
        id: port.id,
        name: port.name.clone(),
        position: port.position,
        remaining_cargo: port.remaining_cargo,
        max_cargo: port.max_cargo,
        efficiency: port.efficiency(),
    }
}

pub fn hub_state(hub: &Hub) -> HubState {
    HubState {
        id: hub.id,
        name: hub.name.clone(),
        position: hub.position,
    }
}

pub fn player_state(player: &Player) -> PlayerState {
    PlayerState {
        id: player.id,
        name: player.name.clone(),
        position: player.position,
        port_id: player.port_id,
        destination_port_id: player.destination_port_id,
        progress: player.progress,
        moving: player.moving,
        action_points: player.action_points,
        credits: player.credits,
        total_profit: player.total_profit,
        cargo_holds: player.cargo_holds,
        max_cargo_holds: player.ship().max_cargo_holds,
        shields: player.shields,
        max_shields: player.max_shields,
        energy: player.energy,
        max_energy: player.max_energy,
    }
}

pub fn bot_state(bot: &Bot) -> PlayerState {
    PlayerState {
        id: bot.id,
        name: bot.name.clone(),
        position: bot.position,
        port_id: bot.port_id,
        destination_port_id: Some(bot.destination_port_id),
        progress: bot.progress,
        moving: bot.moving,
        action_points: bot.action_points,
        credits: bot.credits,
        total_profit: bot.total_profit,
        cargo_holds: bot.cargo_holds,
        max_cargo_holds: bot.ship().max_cargo_holds,
        shields: bot.shields,
        max_shields: bot.max_shields,
        energy: bot.energy,
        max_energy: bot.max_energy,
    }
}

pub fn npc_state(npc: &Npc) -> NpcState {
    NpcState {
        id: npc.id,
        name: npc.name.clone(),
        position: npc.position,
        port_id: npc.port_id,
        destination_port_id: npc.destination_port_id,
        progress: npc.progress,
        shields: npc.shields,
        max_shields: npc.max_shields,
        credits: npc.credits,
        in_combat: npc.in_combat,
        combat_target: npc.combat_target,
    }
}

/// Ports and hubs with the derived efficiency field; sent once per client.
pub fn static_state(world: &WorldState) -> StaticState {
    StaticState {
        ports: world.ports.iter().map(port_state).collect(),
        hubs: world.hubs.iter().map(hub_state).collect(),
    }
}

/// Everything that changes tick to tick.
pub fn dynamic_state(world: &WorldState, tick: u64) -> DynamicState {
    DynamicState {
        tick,
        timestamp: unix_millis(),
        players: world.players.values().map(player_state).collect(),
        bots: world.bots.iter().map(bot_state).collect(),
        npcs: world.npcs.iter().map(npc_state).collect(),
        leaderboard: world.leaderboard.clone(),
    }
}

/// Legacy combined payload for clients that predate the static/dynamic split.
pub fn combined_state(world: &WorldState, tick: u64) -> CombinedState {
    let stat = static_state(world);
    let dynamic = dynamic_state(world, tick);
    CombinedState {
        tick: dynamic.tick,
        timestamp: dynamic.timestamp,
        ports: stat.ports,
        hubs: stat.hubs,
        players: dynamic.players,
        bots: dynamic.bots,
        npcs: dynamic.npcs,
        leaderboard: dynamic.leaderboard,
    }
}

fn unix_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    millis.min(u64::MAX as u128) as u64
}
