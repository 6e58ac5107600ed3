//! Internal simulation entities. All of them are owned exclusively by the
//! world state store; snapshot accessors clone their fields into the plain
//! wire shapes in `shared` instead of handing out references.

use shared::{
    Vec3, MAX_ENERGY, MAX_SHIELDS, PLAYER_SPEED, START_ACTION_POINTS, START_CARGO_HOLDS,
    START_ENERGY, START_SHIELDS,
};

/// Immutable catalog entry referenced, never owned, by players and bots.
#[derive(Debug, Clone, Copy)]
pub struct ShipType {
    pub name: &'static str,
    pub max_cargo_holds: u32,
    pub travel_cost_multiplier: f32,
    pub purchase_cost: u64,
}

pub const SHIP_TYPES: &[ShipType] = &[
    ShipType {
        name: "Scout",
        max_cargo_holds: 100,
        travel_cost_multiplier: 1.0,
        purchase_cost: 0,
    },
    ShipType {
        name: "Freighter",
        max_cargo_holds: 250,
        travel_cost_multiplier: 1.5,
        purchase_cost: 25_000,
    },
    ShipType {
        name: "Cruiser",
        max_cargo_holds: 500,
        travel_cost_multiplier: 2.0,
        purchase_cost: 100_000,
    },
];

/// Index of the ship everyone starts with.
pub const DEFAULT_SHIP: usize = 0;

#[derive(Debug, Clone)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub position: Vec3,
    pub port_id: u32,
    pub destination_port_id: Option<u32>,
    pub travel_start: Option<Vec3>,
    pub progress: f32,
    pub speed: f32,
    pub moving: bool,
    pub action_points: u32,
    pub credits: u64,
    pub total_profit: u64,
    pub cargo_holds: u32,
    pub ship_type: usize,
    pub last_action_tick: Option<u64>,
    pub shields: u32,
    pub max_shields: u32,
    pub energy: u32,
    pub max_energy: u32,
}

impl Player {
    pub fn new(id: u32, name: String, port_id: u32, position: Vec3) -> Self {
        Self {
            id,
            name,
            position,
            port_id,
            destination_port_id: None,
            travel_start: None,
            progress: 0.0,
            speed: PLAYER_SPEED,
            moving: false,
            action_points: START_ACTION_POINTS,
            credits: 0,
            total_profit: 0,
            cargo_holds: START_CARGO_HOLDS,
            ship_type: DEFAULT_SHIP,
            last_action_tick: None,
            shields: START_SHIELDS,
            max_shields: MAX_SHIELDS,
            energy: START_ENERGY,
            max_energy: MAX_ENERGY,
        }
    }

    pub fn ship(&self) -> &'static ShipType {
        &SHIP_TYPES[self.ship_type]
    }
}

/// Autonomous trader. Same shape as a player except the destination is
/// always set (it equals the current port while stationary) and identity is
/// world-generated rather than connection-scoped.
#[derive(Debug, Clone)]
pub struct Bot {
    pub id: u32,
    pub name: String,
    pub position: Vec3,
    pub port_id: u32,
    pub destination_port_id: u32,
    pub travel_start: Vec3,
    pub progress: f32,
    pub speed: f32,
    pub moving: bool,
    pub action_points: u32,
    pub credits: u64,
    pub total_profit: u64,
    pub cargo_holds: u32,
    pub ship_type: usize,
    pub last_action_tick: Option<u64>,
    pub shields: u32,
    pub max_shields: u32,
    pub energy: u32,
    pub max_energy: u32,
}

impl Bot {
    pub fn ship(&self) -> &'static ShipType {
        &SHIP_TYPES[self.ship_type]
    }
}

/// Hostile raider. Never removed: defeat is modeled as respawn-in-place
/// with reduced shields and a fresh bounty.
#[derive(Debug, Clone)]
pub struct Npc {
    pub id: u32,
    pub name: String,
    pub position: Vec3,
    pub port_id: u32,
    pub destination_port_id: u32,
    pub progress: f32,
    pub shields: u32,
    pub max_shields: u32,
    pub energy: u32,
    pub max_energy_per_attack: u32,
    pub credits: u64,
    pub in_combat: bool,
    pub combat_target: Option<u32>,
    /// Consecutive ticks in combat with no player nearby and no blast
    /// received; drives the return-to-patrol timeout.
    pub calm_ticks: u64,
}

#[derive(Debug, Clone)]
pub struct Port {
    pub id: u32,
    pub name: String,
    pub position: Vec3,
    pub remaining_cargo: u32,
    pub max_cargo: u32,
}

impl Port {
    pub fn efficiency(&self) -> f32 {
        if self.max_cargo == 0 {
            0.0
        } else {
            self.remaining_cargo as f32 / self.max_cargo as f32
        }
    }
}

#[derive(Debug, Clone)]
pub struct Hub {
    pub id: u32,
    pub name: String,
    pub position: Vec3,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_starting_resources() {
        let player = Player::new(1, "Drifter".to_string(), 3, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(player.action_points, 500);
        assert_eq!(player.cargo_holds, 50);
        assert_eq!(player.shields, 100);
        assert_eq!(player.max_shields, 500);
        assert_eq!(player.energy, 200);
        assert_eq!(player.max_energy, 1000);
        assert_eq!(player.ship().name, "Scout");
        assert!(!player.moving);
        assert!(player.destination_port_id.is_none());
        assert!(player.last_action_tick.is_none());
    }

    #[test]
    fn test_port_efficiency() {
        let port = Port {
            id: 0,
            name: "Port 1".to_string(),
            position: Vec3::ZERO,
            remaining_cargo: 500,
            max_cargo: 2000,
        };
        assert_eq!(port.efficiency(), 0.25);
    }

    #[test]
    fn test_ship_catalog() {
        assert_eq!(SHIP_TYPES[DEFAULT_SHIP].travel_cost_multiplier, 1.0);
        assert_eq!(SHIP_TYPES[DEFAULT_SHIP].purchase_cost, 0);
        // Bigger hulls cost more and carry more
        for pair in SHIP_TYPES.windows(2) {
            assert!(pair[1].max_cargo_holds > pair[0].max_cargo_holds);
            assert!(pair[1].purchase_cost > pair[0].purchase_cost);
        }
    }
}
