//! World state store: the single owner and single writer of all entities.
//!
//! Every mutation flows through here — tick updates via [`WorldState::update`]
//! and player commands via [`WorldState::process_action`] — on one logical
//! thread (the server's message loop). Snapshot accessors clone entity fields
//! into the plain wire shapes from `shared`; internal references never escape.

pub mod entities;

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    LeaderboardEntry, PlayerState, Vec3, NPC_BOUNTY_MAX, NPC_BOUNTY_MIN, NPC_MAX_SHIELDS,
    PORT_CAPACITY_MAX, PORT_CAPACITY_MIN,
};
use std::collections::HashMap;

use crate::actions::{Action, ActionFailure};
use crate::{actions, agents, movement, scheduler, snapshot};
use entities::{Bot, Hub, Npc, Player, Port, DEFAULT_SHIP};

const BOT_CALLSIGNS: &[&str] = &[
    "Vex", "Moss", "Harlan", "Juno", "Pike", "Sable", "Orrin", "Tamsin", "Cass", "Ryle",
];

/// Procedural generation parameters. The seed makes generation and agent
/// decisions reproducible; leave it `None` for entropy-seeded production use.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub port_count: usize,
    pub radius: f32,
    pub hub_count: usize,
    pub bot_count: usize,
    pub npc_count: usize,
    pub seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            port_count: 40,
            radius: 500.0,
            hub_count: 5,
            bot_count: 20,
            npc_count: 10,
            seed: None,
        }
    }
}

pub struct WorldState {
    pub players: HashMap<u32, Player>,
    pub bots: Vec<Bot>,
    pub npcs: Vec<Npc>,
    pub ports: Vec<Port>,
    pub hubs: Vec<Hub>,
    pub leaderboard: Vec<LeaderboardEntry>,
    rng: StdRng,
}

impl WorldState {
    /// Builds the world: ports and hubs placed uniformly inside a sphere,
    /// bots and NPCs spawned at random ports.
    pub fn new(config: WorldConfig) -> Self {
        assert!(config.port_count > 0, "world needs at least one port");

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let ports: Vec<Port> = (0..config.port_count)
            .map(|i| {
                let capacity = rng.gen_range(PORT_CAPACITY_MIN..=PORT_CAPACITY_MAX);
                Port {
                    id: i as u32,
                    name: format!("Port {}", i + 1),
                    position: random_point_in_sphere(&mut rng, config.radius),
                    remaining_cargo: capacity,
                    max_cargo: capacity,
                }
            })
            .collect();

        let hubs: Vec<Hub> = (0..config.hub_count)
            .map(|i| Hub {
                id: i as u32,
                name: format!("Hub {}", i + 1),
                position: random_point_in_sphere(&mut rng, config.radius),
            })
            .collect();

        let bots: Vec<Bot> = (0..config.bot_count)
            .map(|i| {
                let port_id = rng.gen_range(0..ports.len()) as u32;
                let position = ports[port_id as usize].position;
                let callsign = BOT_CALLSIGNS[rng.gen_range(0..BOT_CALLSIGNS.len())];
                Bot {
                    id: i as u32,
                    name: format!("{}-{}", callsign, rng.gen_range(10..100)),
                    position,
                    port_id,
                    destination_port_id: port_id,
                    travel_start: position,
                    progress: 0.0,
                    speed: shared::PLAYER_SPEED,
                    moving: false,
                    action_points: rng.gen_range(300..=700),
                    credits: rng.gen_range(0..=500),
                    total_profit: 0,
                    cargo_holds: shared::START_CARGO_HOLDS,
                    ship_type: DEFAULT_SHIP,
                    last_action_tick: None,
                    shields: shared::START_SHIELDS,
                    max_shields: shared::MAX_SHIELDS,
                    energy: shared::START_ENERGY,
                    max_energy: shared::MAX_ENERGY,
                }
            })
            .collect();

        let npcs: Vec<Npc> = (0..config.npc_count)
            .map(|i| {
                let port_id = rng.gen_range(0..ports.len()) as u32;
                let destination = random_port_except(&mut rng, ports.len(), port_id);
                Npc {
                    id: i as u32,
                    name: format!("Raider-{}", rng.gen_range(100..1000)),
                    position: ports[port_id as usize].position,
                    port_id,
                    destination_port_id: destination,
                    progress: 0.0,
                    shields: NPC_MAX_SHIELDS,
                    max_shields: NPC_MAX_SHIELDS,
                    energy: shared::BLAST_ENERGY_COST,
                    max_energy_per_attack: shared::BLAST_ENERGY_COST,
                    credits: rng.gen_range(NPC_BOUNTY_MIN..=NPC_BOUNTY_MAX),
                    in_combat: false,
                    combat_target: None,
                    calm_ticks: 0,
                }
            })
            .collect();

        info!(
            "World initialized: {} ports, {} hubs, {} bots, {} NPCs in radius {}",
            ports.len(),
            hubs.len(),
            bots.len(),
            npcs.len(),
            config.radius
        );

        Self {
            players: HashMap::new(),
            bots,
            npcs,
            ports,
            hubs,
            leaderboard: Vec::new(),
            rng,
        }
    }

    /// Registers a player at a uniformly random port with the fixed starting
    /// loadout.
    pub fn add_player(&mut self, id: u32, name: &str) -> PlayerState {
        let port_id = self.rng.gen_range(0..self.ports.len()) as u32;
        let position = self.ports[port_id as usize].position;
        let player = Player::new(id, name.to_string(), port_id, position);
        info!("Player {} ({}) joined at port {}", id, name, port_id);
        let state = snapshot::player_state(&player);
        self.players.insert(id, player);
        state
    }

    /// Idempotent removal. Any NPC fighting this player returns to patrol.
    pub fn remove_player(&mut self, id: u32) {
        if self.players.remove(&id).is_some() {
            info!("Player {} removed", id);
        }
        for npc in &mut self.npcs {
            if npc.combat_target == Some(id) {
                npc.in_combat = false;
                npc.combat_target = None;
                npc.calm_ticks = 0;
            }
        }
    }

    /// One simulation step. Order matters: player movement and agent
    /// decisions change profits this tick, and the leaderboard must reflect
    /// them.
    pub fn update(&mut self, tick: u64) {
        self.move_players();
        agents::update_bots(&mut self.bots, &mut self.ports, tick);
        agents::update_npcs(&mut self.npcs, &self.players, &self.ports, &mut self.rng);
        self.recompute_leaderboard();
    }

    /// Validates and applies one player command. The cooldown gate runs
    /// before any per-action logic.
    pub fn process_action(
        &mut self,
        player_id: u32,
        action: Action,
        tick: u64,
    ) -> Result<PlayerState, ActionFailure> {
        let player = self
            .players
            .get_mut(&player_id)
            .ok_or_else(|| ActionFailure::NotFound("player".to_string()))?;

        if !scheduler::cooldown_ready(tick, player.last_action_tick) {
            return Err(ActionFailure::Cooldown {
                remaining_ticks: scheduler::cooldown_remaining_ticks(tick, player.last_action_tick),
                remaining_ms: scheduler::cooldown_remaining_ms(tick, player.last_action_tick),
            });
        }

        actions::apply(
            player,
            &mut self.ports,
            &self.hubs,
            &mut self.npcs,
            &mut self.rng,
            action,
            tick,
        )?;

        Ok(snapshot::player_state(player))
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn bot_count(&self) -> usize {
        self.bots.len()
    }

    /// Advances every traveling player one interpolation step; arrival snaps
    /// to the destination and executes the trade leg that was paid for when
    /// the trip began.
    fn move_players(&mut self) {
        for player in self.players.values_mut() {
            if !player.moving {
                continue;
            }
            let (Some(dest_id), Some(start)) = (player.destination_port_id, player.travel_start)
            else {
                // Inconsistent trip state; clear the moving flag.
                player.moving = false;
                continue;
            };

            let dest = self.ports[dest_id as usize].position;
            let (position, progress) =
                movement::interpolate(&start, &dest, player.progress, player.speed);

            if progress >= 1.0 {
                player.position = dest;
                player.port_id = dest_id;
                player.destination_port_id = None;
                player.travel_start = None;
                player.progress = 0.0;
                player.moving = false;

                // Arrival trade: profit only, the cost was charged when the
                // TRAVEL action was accepted.
                let port = &mut self.ports[dest_id as usize];
                let (traded, profit) =
                    movement::trade_yield(player.cargo_holds, port.remaining_cargo, port.max_cargo);
                port.remaining_cargo -= traded;
                player.credits += profit;
                player.total_profit += profit;
            } else {
                player.position = position;
                player.progress = progress;
            }
        }
    }

    fn recompute_leaderboard(&mut self) {
        let mut entries: Vec<LeaderboardEntry> = self
            .players
            .values()
            .map(|p| LeaderboardEntry {
                rank: 0,
                name: p.name.clone(),
                total_profit: p.total_profit,
                is_bot: false,
            })
            .chain(self.bots.iter().map(|b| LeaderboardEntry {
                rank: 0,
                name: b.name.clone(),
                total_profit: b.total_profit,
                is_bot: true,
            }))
            .collect();

        // Stable sort keeps iteration order for equal profits.
        entries.sort_by(|a, b| b.total_profit.cmp(&a.total_profit));
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.rank = i as u32 + 1;
        }
        self.leaderboard = entries;
    }
}

/// Uniform random point inside a sphere: spherical coordinates with a
/// cube-root-scaled radius, re-rolled in the unlikely case the point lands
/// outside the boundary.
fn random_point_in_sphere(rng: &mut StdRng, radius: f32) -> Vec3 {
    loop {
        let theta = rng.gen_range(0.0..std::f32::consts::TAU);
        let phi = rng.gen_range(0.0..std::f32::consts::PI);
        let r = radius * rng.gen::<f32>().cbrt();
        let point = Vec3::new(
            r * phi.sin() * theta.cos(),
            r * phi.sin() * theta.sin(),
            r * phi.cos(),
        );
        if point.length() <= radius {
            return point;
        }
    }
}

/// Random port id different from `current` when more than one port exists.
pub(crate) fn random_port_except(rng: &mut StdRng, port_count: usize, current: u32) -> u32 {
    if port_count <= 1 {
        return current;
    }
    loop {
        let candidate = rng.gen_range(0..port_count) as u32;
        if candidate != current {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> WorldConfig {
        WorldConfig {
            port_count: 10,
            radius: 100.0,
            hub_count: 3,
            bot_count: 5,
            npc_count: 4,
            seed: Some(7),
        }
    }

    #[test]
    fn test_initialize_places_everything_in_sphere() {
        let world = WorldState::new(test_config());

        assert_eq!(world.ports.len(), 10);
        assert_eq!(world.hubs.len(), 3);
        assert_eq!(world.bots.len(), 5);
        assert_eq!(world.npcs.len(), 4);

        for port in &world.ports {
            assert!(port.position.length() <= 100.0);
            assert!(port.max_cargo >= PORT_CAPACITY_MIN && port.max_cargo <= PORT_CAPACITY_MAX);
            assert_eq!(port.remaining_cargo, port.max_cargo, "ports start full");
        }
        for hub in &world.hubs {
            assert!(hub.position.length() <= 100.0);
        }
        for npc in &world.npcs {
            assert_ne!(
                npc.port_id, npc.destination_port_id,
                "NPCs start with a distinct destination"
            );
            assert_eq!(npc.shields, NPC_MAX_SHIELDS);
            assert!(npc.credits >= NPC_BOUNTY_MIN && npc.credits <= NPC_BOUNTY_MAX);
        }
        for bot in &world.bots {
            assert_eq!(
                bot.destination_port_id, bot.port_id,
                "stationary bots point at their own port"
            );
        }
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = WorldState::new(test_config());
        let b = WorldState::new(test_config());

        for (pa, pb) in a.ports.iter().zip(b.ports.iter()) {
            assert_eq!(pa.position, pb.position);
            assert_eq!(pa.max_cargo, pb.max_cargo);
        }
        for (na, nb) in a.npcs.iter().zip(b.npcs.iter()) {
            assert_eq!(na.credits, nb.credits);
            assert_eq!(na.destination_port_id, nb.destination_port_id);
        }
    }

    #[test]
    fn test_add_player_spawns_at_port() {
        let mut world = WorldState::new(test_config());
        let state = world.add_player(1, "Drifter");

        assert_eq!(state.id, 1);
        assert_eq!(state.action_points, 500);
        assert_eq!(state.cargo_holds, 50);
        let port = &world.ports[state.port_id as usize];
        assert_eq!(state.position, port.position);
    }

    #[test]
    fn test_remove_player_idempotent() {
        let mut world = WorldState::new(test_config());
        world.add_player(1, "Drifter");
        assert_eq!(world.player_count(), 1);

        world.remove_player(1);
        assert_eq!(world.player_count(), 0);

        // Second removal is safe and changes nothing
        world.remove_player(1);
        assert_eq!(world.player_count(), 0);
        assert_eq!(world.bot_count(), 5);
    }

    #[test]
    fn test_remove_player_releases_npc_combat() {
        let mut world = WorldState::new(test_config());
        world.add_player(1, "Drifter");
        world.npcs[0].in_combat = true;
        world.npcs[0].combat_target = Some(1);

        world.remove_player(1);
        assert!(!world.npcs[0].in_combat);
        assert_eq!(world.npcs[0].combat_target, None);
    }

    #[test]
    fn test_travel_and_arrival_single_charge() {
        let mut world = WorldState::new(test_config());
        let state = world.add_player(1, "Drifter");

        // Pick some other port as the destination
        let target = (0..world.ports.len() as u32)
            .find(|id| *id != state.port_id)
            .unwrap();
        let distance = world.ports[state.port_id as usize]
            .position
            .distance(&world.ports[target as usize].position);
        let expected_cost = movement::travel_action_cost(distance, 1.0);

        world
            .process_action(1, Action::Travel { port_id: target }, 10)
            .unwrap();

        let ap_after_submit = world.players[&1].action_points;
        assert_eq!(ap_after_submit, 500 - expected_cost);

        // Run ticks until arrival; AP must not change again
        let mut tick = 11;
        while world.players[&1].moving {
            world.update(tick);
            tick += 1;
            assert!(tick < 100_000, "player never arrived");
        }
        assert_eq!(world.players[&1].action_points, ap_after_submit);
        assert_eq!(world.players[&1].port_id, target);
        assert_eq!(world.players[&1].progress, 0.0);

        // Arrival executed the trade leg: profit credited, port depleted
        assert!(world.players[&1].total_profit > 0);
        let port = &world.ports[target as usize];
        assert!(port.remaining_cargo < port.max_cargo);
    }

    #[test]
    fn test_travel_progress_monotonic() {
        let mut world = WorldState::new(test_config());
        let state = world.add_player(1, "Drifter");
        let target = (0..world.ports.len() as u32)
            .find(|id| *id != state.port_id)
            .unwrap();

        world
            .process_action(1, Action::Travel { port_id: target }, 10)
            .unwrap();

        let mut last_progress = 0.0;
        let mut tick = 11;
        while world.players[&1].moving {
            world.update(tick);
            let progress = world.players[&1].progress;
            if world.players[&1].moving {
                assert!(progress >= last_progress);
                last_progress = progress;
            }
            tick += 1;
            assert!(tick < 100_000);
        }
    }

    #[test]
    fn test_leaderboard_sorted_contiguous() {
        let mut world = WorldState::new(test_config());
        world.add_player(1, "Rich");
        world.add_player(2, "Poor");
        world.players.get_mut(&1).unwrap().total_profit = 9000;
        world.players.get_mut(&2).unwrap().total_profit = 100;
        world.bots[0].total_profit = 5000;

        world.update(1);

        let board = &world.leaderboard;
        assert_eq!(board.len(), 2 + world.bots.len());
        assert_eq!(board[0].name, "Rich");
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[1].name, world.bots[0].name);
        for (i, entry) in board.iter().enumerate() {
            assert_eq!(entry.rank, i as u32 + 1, "ranks are contiguous from 1");
        }
        for pair in board.windows(2) {
            assert!(pair[0].total_profit >= pair[1].total_profit);
        }
    }

    #[test]
    fn test_random_port_except() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(random_port_except(&mut rng, 1, 0), 0);
        for _ in 0..50 {
            assert_ne!(random_port_except(&mut rng, 5, 2), 2);
        }
    }
}
