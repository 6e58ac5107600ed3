//! Wire protocol and gameplay constants shared between the server and any
//! client implementation.
//!
//! Everything here is plain data: the snapshot structs are built by the
//! server from its internal entities and never alias live simulation state.
//! The dynamic snapshot is broadcast every tick; the static snapshot is sent
//! once per client on join (ports and hubs never move, so re-sending their
//! geometry every 100 ms would be wasted bandwidth).

use serde::{Deserialize, Serialize};

mod vec3;
pub use vec3::Vec3;

// Simulation cadence
pub const TICK_INTERVAL_MS: u64 = 100;
pub const ACTION_COOLDOWN_TICKS: u64 = 5;

// Movement
pub const PLAYER_SPEED: f32 = 5.0;
pub const NPC_SPEED: f32 = 0.5;
pub const ARRIVAL_TOLERANCE: f32 = 0.25;

// Action costs (action points)
pub const TRADE_AP_COST: u32 = 10;
pub const COMBAT_AP_COST: u32 = 10;

// Trading
pub const PROFIT_PER_UNIT: f64 = 100.0;
pub const PORT_CAPACITY_MIN: u32 = 1000;
pub const PORT_CAPACITY_MAX: u32 = 3000;

// Combat
pub const ENGAGE_RANGE: f32 = 10.0;
pub const NPC_AGGRO_RADIUS: f32 = 20.0;
pub const BLAST_ENERGY_COST: u32 = 50;
pub const NPC_MAX_SHIELDS: u32 = 400;
pub const NPC_RESPAWN_SHIELD_FACTOR: f32 = 0.3;
pub const NPC_BOUNTY_MIN: u64 = 100;
pub const NPC_BOUNTY_MAX: u64 = 500;
pub const NPC_DISENGAGE_TICKS: u64 = 50;

// Hub purchases
pub const SHIELD_BATCH_SIZE: u32 = 10;
pub const SHIELD_UNIT_PRICE: u64 = 5;
pub const ENERGY_BATCH_SIZE: u32 = 50;
pub const ENERGY_UNIT_PRICE: u64 = 2;
pub const UPGRADE_BASE_COST: f64 = 1000.0;
pub const UPGRADE_COST_GROWTH: f64 = 1.1;

// Starting resources for a freshly joined player
pub const START_ACTION_POINTS: u32 = 500;
pub const START_CARGO_HOLDS: u32 = 50;
pub const START_SHIELDS: u32 = 100;
pub const MAX_SHIELDS: u32 = 500;
pub const START_ENERGY: u32 = 200;
pub const MAX_ENERGY: u32 = 1000;

/// Player-submitted action kinds. `Travel`, `EngageCombat` and `FireBlast`
/// require a target id in the enclosing `Packet::Action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Trade,
    Travel,
    UpgradeCargo,
    EngageCombat,
    FireBlast,
    BuyShields,
    BuyEnergy,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionKind::Trade => "TRADE",
            ActionKind::Travel => "TRAVEL",
            ActionKind::UpgradeCargo => "UPGRADE_CARGO",
            ActionKind::EngageCombat => "ENGAGE_COMBAT",
            ActionKind::FireBlast => "FIRE_BLAST",
            ActionKind::BuyShields => "BUY_SHIELDS",
            ActionKind::BuyEnergy => "BUY_ENERGY",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortState {
    pub id: u32,
    pub name: String,
    pub position: Vec3,
    pub remaining_cargo: u32,
    pub max_cargo: u32,
    /// Fraction of capacity remaining; drives profit-per-trade.
    pub efficiency: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubState {
    pub id: u32,
    pub name: String,
    pub position: Vec3,
}

/// Wire shape for players and trading bots alike.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: u32,
    pub name: String,
    pub position: Vec3,
    pub port_id: u32,
    pub destination_port_id: Option<u32>,
    pub progress: f32,
    pub moving: bool,
    pub action_points: u32,
    pub credits: u64,
    pub total_profit: u64,
    pub cargo_holds: u32,
    pub max_cargo_holds: u32,
    pub shields: u32,
    pub max_shields: u32,
    pub energy: u32,
    pub max_energy: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NpcState {
    pub id: u32,
    pub name: String,
    pub position: Vec3,
    pub port_id: u32,
    pub destination_port_id: u32,
    pub progress: f32,
    pub shields: u32,
    pub max_shields: u32,
    pub credits: u64,
    pub in_combat: bool,
    pub combat_target: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Contiguous, starting at 1, ordered by descending lifetime profit.
    pub rank: u32,
    pub name: String,
    pub total_profit: u64,
    pub is_bot: bool,
}

/// Sent once per client on join; only numeric port fields mutate afterwards
/// and those ride along in the dynamic payload consumers already receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticState {
    pub ports: Vec<PortState>,
    pub hubs: Vec<HubState>,
}

/// Broadcast to every client each tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicState {
    pub tick: u64,
    pub timestamp: u64,
    pub players: Vec<PlayerState>,
    pub bots: Vec<PlayerState>,
    pub npcs: Vec<NpcState>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Legacy combined payload kept for clients that predate the static/dynamic
/// split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedState {
    pub tick: u64,
    pub timestamp: u64,
    pub ports: Vec<PortState>,
    pub hubs: Vec<HubState>,
    pub players: Vec<PlayerState>,
    pub bots: Vec<PlayerState>,
    pub npcs: Vec<NpcState>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    // Client -> server
    Join {
        name: String,
    },
    Action {
        kind: ActionKind,
        target_id: Option<u32>,
    },
    Ping,
    Disconnect,
    HealthCheck,
    StatsRequest,

    // Server -> client
    Joined {
        player_id: u32,
        player_name: String,
    },
    StaticData(StaticState),
    Dynamic(DynamicState),
    ActionOk {
        action: ActionKind,
        state: PlayerState,
    },
    ActionError {
        action: ActionKind,
        error: String,
    },
    Error {
        error: String,
    },
    Pong,
    Health {
        status: String,
        tick: u64,
        player_count: usize,
        bot_count: usize,
        uptime_secs: u64,
    },
    Stats {
        tick: u64,
        player_count: usize,
        bot_count: usize,
        tick_rate_ms: u64,
    },
    Disconnected {
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kind_display() {
        assert_eq!(ActionKind::Trade.to_string(), "TRADE");
        assert_eq!(ActionKind::UpgradeCargo.to_string(), "UPGRADE_CARGO");
        assert_eq!(ActionKind::FireBlast.to_string(), "FIRE_BLAST");
    }

    #[test]
    fn test_packet_serialization_join() {
        let packet = Packet::Join {
            name: "Drifter".to_string(),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Join { name } => assert_eq!(name, "Drifter"),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_action() {
        let packet = Packet::Action {
            kind: ActionKind::Travel,
            target_id: Some(7),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Action { kind, target_id } => {
                assert_eq!(kind, ActionKind::Travel);
                assert_eq!(target_id, Some(7));
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_dynamic() {
        let state = DynamicState {
            tick: 42,
            timestamp: 123456789,
            players: vec![PlayerState {
                id: 1,
                name: "Drifter".to_string(),
                position: Vec3::new(1.0, 2.0, 3.0),
                port_id: 0,
                destination_port_id: Some(3),
                progress: 0.5,
                moving: true,
                action_points: 480,
                credits: 5000,
                total_profit: 5000,
                cargo_holds: 50,
                max_cargo_holds: 100,
                shields: 100,
                max_shields: 500,
                energy: 200,
                max_energy: 1000,
            }],
            bots: vec![],
            npcs: vec![NpcState {
                id: 0,
                name: "Raider 1".to_string(),
                position: Vec3::ZERO,
                port_id: 0,
                destination_port_id: 1,
                progress: 0.0,
                shields: 400,
                max_shields: 400,
                credits: 300,
                in_combat: false,
                combat_target: None,
            }],
            leaderboard: vec![LeaderboardEntry {
                rank: 1,
                name: "Drifter".to_string(),
                total_profit: 5000,
                is_bot: false,
            }],
        };

        let packet = Packet::Dynamic(state);
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::Dynamic(state) => {
                assert_eq!(state.tick, 42);
                assert_eq!(state.players.len(), 1);
                assert_eq!(state.players[0].destination_port_id, Some(3));
                assert_eq!(state.npcs[0].shields, 400);
                assert_eq!(state.leaderboard[0].rank, 1);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_static_state_split_from_dynamic() {
        let static_state = StaticState {
            ports: vec![PortState {
                id: 0,
                name: "Port 1".to_string(),
                position: Vec3::new(10.0, 0.0, 0.0),
                remaining_cargo: 950,
                max_cargo: 1000,
                efficiency: 0.95,
            }],
            hubs: vec![HubState {
                id: 0,
                name: "Hub 1".to_string(),
                position: Vec3::ZERO,
            }],
        };

        let serialized = bincode::serialize(&Packet::StaticData(static_state)).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::StaticData(state) => {
                assert_eq!(state.ports.len(), 1);
                assert!(state.ports[0].efficiency >= 0.0 && state.ports[0].efficiency <= 1.0);
                assert!(state.ports[0].remaining_cargo <= state.ports[0].max_cargo);
                assert_eq!(state.hubs.len(), 1);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }
}
