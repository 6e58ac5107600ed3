//! Per-tick decision loops for autonomous entities: trading bots and
//! hostile NPC raiders.
//!
//! Bots run a trade-or-relocate heuristic against port efficiency; raiders
//! patrol between ports, freeze when a player comes close, and return to
//! patrol once no player has been nearby for a full quiet spell.

use log::debug;
use rand::rngs::StdRng;
use shared::{NPC_AGGRO_RADIUS, NPC_DISENGAGE_TICKS, NPC_SPEED, TRADE_AP_COST};
use std::collections::HashMap;

use crate::movement;
use crate::scheduler;
use crate::world::entities::{Bot, Npc, Player, Port};
use crate::world::random_port_except;

/// Ports a bot considers when relocating.
const BOT_SEARCH_BREADTH: usize = 5;

/// Port efficiency above which a bot trades in place instead of moving on.
const BOT_TRADE_THRESHOLD: f32 = 0.5;

/// Advances every bot one tick: traveling bots interpolate toward their
/// destination, settled bots re-evaluate the trade-or-relocate heuristic
/// when their cooldown allows.
pub fn update_bots(bots: &mut [Bot], ports: &mut [Port], tick: u64) {
    for bot in bots.iter_mut() {
        if bot.moving {
            let dest = ports[bot.destination_port_id as usize].position;
            let (position, progress) =
                movement::interpolate(&bot.travel_start, &dest, bot.progress, bot.speed);

            if progress >= 1.0 {
                // Arrival: snap, settle the travel bill, then decide again
                let distance = bot.travel_start.distance(&dest);
                let cost = movement::travel_cost(distance, bot.ship().travel_cost_multiplier);
                bot.position = dest;
                bot.port_id = bot.destination_port_id;
                bot.travel_start = dest;
                bot.progress = 0.0;
                bot.moving = false;
                bot.action_points = bot.action_points.saturating_sub(cost);
            } else {
                bot.position = position;
                bot.progress = progress;
                continue;
            }
        }

        if scheduler::cooldown_ready(tick, bot.last_action_tick) {
            decide(bot, ports, tick);
        }
    }
}

/// Trade at the current port while it stays efficient; otherwise look for a
/// strictly better affordable port among the nearest few, falling back to
/// the nearest one with any cargo left.
fn decide(bot: &mut Bot, ports: &mut [Port], tick: u64) {
    let current = &ports[bot.port_id as usize];
    let current_efficiency = current.efficiency();

    if current_efficiency > BOT_TRADE_THRESHOLD && bot.action_points >= TRADE_AP_COST {
        let port = &mut ports[bot.port_id as usize];
        let (traded, profit) =
            movement::trade_yield(bot.cargo_holds, port.remaining_cargo, port.max_cargo);
        bot.action_points -= TRADE_AP_COST;
        bot.credits += profit;
        bot.total_profit += profit;
        port.remaining_cargo -= traded;
        bot.last_action_tick = Some(tick);
        debug!("Bot {} traded at port {} for {}", bot.name, bot.port_id, profit);
        return;
    }

    // Nearest-first candidate list, excluding the port we are sitting at
    let mut nearest: Vec<&Port> = ports.iter().filter(|p| p.id != bot.port_id).collect();
    nearest.sort_by(|a, b| {
        bot.position
            .distance(&a.position)
            .total_cmp(&bot.position.distance(&b.position))
    });
    nearest.truncate(BOT_SEARCH_BREADTH);

    let affordable = |port: &Port| {
        let distance = bot.position.distance(&port.position);
        let cost = movement::travel_cost(distance, bot.ship().travel_cost_multiplier)
            + TRADE_AP_COST;
        bot.action_points >= cost
    };

    let best = nearest
        .iter()
        .filter(|p| p.efficiency() > current_efficiency && affordable(p))
        .max_by(|a, b| a.efficiency().total_cmp(&b.efficiency()))
        .or_else(|| {
            // Nothing strictly better: take the nearest port that still has
            // any cargo at all
            nearest
                .iter()
                .find(|p| p.remaining_cargo > 0 && affordable(p))
        });

    if let Some(target) = best {
        bot.destination_port_id = target.id;
        bot.travel_start = bot.position;
        bot.progress = 0.0;
        bot.moving = true;
        bot.last_action_tick = Some(tick);
        debug!(
            "Bot {} relocating from port {} to port {}",
            bot.name, bot.port_id, target.id
        );
    }
}

/// Advances every NPC one tick through the Idle/Traveling/InCombat state
/// machine. In-combat raiders are frozen in place; a quiet spell of
/// `NPC_DISENGAGE_TICKS` with no player nearby releases them back to patrol.
pub fn update_npcs(
    npcs: &mut [Npc],
    players: &HashMap<u32, Player>,
    ports: &[Port],
    rng: &mut StdRng,
) {
    for npc in npcs.iter_mut() {
        let player_nearby = players
            .values()
            .any(|p| p.position.distance(&npc.position) <= NPC_AGGRO_RADIUS);

        if npc.in_combat {
            if player_nearby {
                npc.calm_ticks = 0;
            } else {
                npc.calm_ticks += 1;
                if npc.calm_ticks >= NPC_DISENGAGE_TICKS {
                    npc.in_combat = false;
                    npc.combat_target = None;
                    npc.calm_ticks = 0;
                    debug!("{} lost interest and resumed patrol", npc.name);
                }
            }
            continue;
        }

        if player_nearby {
            // Freeze and wait; the raider does not auto-attack
            npc.in_combat = true;
            npc.calm_ticks = 0;
            continue;
        }

        let start = ports[npc.port_id as usize].position;
        let dest = ports[npc.destination_port_id as usize].position;
        let (position, progress) = movement::interpolate(&start, &dest, npc.progress, NPC_SPEED);

        if progress >= 1.0 {
            npc.position = dest;
            npc.port_id = npc.destination_port_id;
            npc.destination_port_id = random_port_except(rng, ports.len(), npc.port_id);
            npc.progress = 0.0;
        } else {
            npc.position = position;
            npc.progress = progress;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use shared::{Vec3, MAX_ENERGY, MAX_SHIELDS, PLAYER_SPEED, START_SHIELDS};
    use crate::world::entities::DEFAULT_SHIP;

    fn test_rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    fn test_port(id: u32, x: f32, remaining: u32, max: u32) -> Port {
        Port {
            id,
            name: format!("Port {}", id + 1),
            position: Vec3::new(x, 0.0, 0.0),
            remaining_cargo: remaining,
            max_cargo: max,
        }
    }

    fn test_bot(port_id: u32, position: Vec3) -> Bot {
        Bot {
            id: 0,
            name: "Vex-11".to_string(),
            position,
            port_id,
            destination_port_id: port_id,
            travel_start: position,
            progress: 0.0,
            speed: PLAYER_SPEED,
            moving: false,
            action_points: 500,
            credits: 0,
            total_profit: 0,
            cargo_holds: 50,
            ship_type: DEFAULT_SHIP,
            last_action_tick: None,
            shields: START_SHIELDS,
            max_shields: MAX_SHIELDS,
            energy: 200,
            max_energy: MAX_ENERGY,
        }
    }

    fn test_npc(position: Vec3) -> Npc {
        Npc {
            id: 0,
            name: "Raider-500".to_string(),
            position,
            port_id: 0,
            destination_port_id: 1,
            progress: 0.0,
            shields: 400,
            max_shields: 400,
            energy: 50,
            max_energy_per_attack: 50,
            credits: 300,
            in_combat: false,
            combat_target: None,
            calm_ticks: 0,
        }
    }

    fn test_player_at(id: u32, position: Vec3) -> Player {
        Player::new(id, format!("P{}", id), 0, position)
    }

    #[test]
    fn test_bot_trades_at_efficient_port() {
        let mut bots = vec![test_bot(0, Vec3::ZERO)];
        let mut ports = vec![test_port(0, 0.0, 1000, 1000), test_port(1, 50.0, 100, 1000)];

        update_bots(&mut bots, &mut ports, 10);

        assert!(!bots[0].moving);
        assert_eq!(bots[0].total_profit, 5000);
        assert_eq!(bots[0].action_points, 490);
        assert_eq!(ports[0].remaining_cargo, 950);
        assert_eq!(bots[0].last_action_tick, Some(10));
    }

    #[test]
    fn test_bot_relocates_to_better_port() {
        let mut bots = vec![test_bot(0, Vec3::ZERO)];
        // Current port is depleted below threshold; port 1 is better
        let mut ports = vec![test_port(0, 0.0, 100, 1000), test_port(1, 20.0, 900, 1000)];

        update_bots(&mut bots, &mut ports, 10);

        assert!(bots[0].moving);
        assert_eq!(bots[0].destination_port_id, 1);
        assert_eq!(bots[0].progress, 0.0);
        // Departure does not charge; the bill is settled on arrival
        assert_eq!(bots[0].action_points, 500);
    }

    #[test]
    fn test_bot_prefers_most_efficient_candidate() {
        let mut bots = vec![test_bot(0, Vec3::ZERO)];
        let mut ports = vec![
            test_port(0, 0.0, 100, 1000),
            test_port(1, 10.0, 600, 1000),
            test_port(2, 20.0, 950, 1000),
            test_port(3, 30.0, 400, 1000),
        ];

        update_bots(&mut bots, &mut ports, 10);

        assert!(bots[0].moving);
        assert_eq!(bots[0].destination_port_id, 2);
    }

    #[test]
    fn test_bot_fallback_to_nearest_with_cargo() {
        let mut bots = vec![test_bot(0, Vec3::ZERO)];
        // All candidates are at or below the current efficiency, but port 1
        // still has cargo
        let mut ports = vec![
            test_port(0, 0.0, 300, 1000),
            test_port(1, 10.0, 200, 1000),
            test_port(2, 20.0, 0, 1000),
        ];

        update_bots(&mut bots, &mut ports, 10);

        assert!(bots[0].moving);
        assert_eq!(bots[0].destination_port_id, 1);
    }

    #[test]
    fn test_bot_arrival_pays_travel_once() {
        let mut bots = vec![test_bot(0, Vec3::ZERO)];
        let mut ports = vec![test_port(0, 0.0, 100, 1000), test_port(1, 10.0, 900, 1000)];

        update_bots(&mut bots, &mut ports, 10);
        assert!(bots[0].moving);

        // 10 units at 5 units/s = 20 ticks; run until settled
        let mut tick = 11;
        while bots[0].moving {
            update_bots(&mut bots, &mut ports, tick);
            tick += 1;
            assert!(tick < 1000, "bot never arrived");
        }

        assert_eq!(bots[0].port_id, 1);
        // travel cost 10, and arrival tick ran the heuristic: port 1 is
        // efficient, so the bot also traded (10 AP)
        assert_eq!(bots[0].action_points, 500 - 10 - 10);
        assert!(bots[0].total_profit > 0);
        assert!(ports[1].remaining_cargo < 900);
    }

    #[test]
    fn test_bot_cooldown_throttles_decisions() {
        let mut bots = vec![test_bot(0, Vec3::ZERO)];
        let mut ports = vec![test_port(0, 0.0, 1000, 1000)];

        update_bots(&mut bots, &mut ports, 10);
        let profit_after_first = bots[0].total_profit;

        // Within the cooldown window: no second trade
        update_bots(&mut bots, &mut ports, 12);
        assert_eq!(bots[0].total_profit, profit_after_first);

        // Window elapsed: trades again
        update_bots(&mut bots, &mut ports, 15);
        assert!(bots[0].total_profit > profit_after_first);
    }

    #[test]
    fn test_npc_patrols_between_ports() {
        let ports = vec![test_port(0, 0.0, 500, 1000), test_port(1, 10.0, 500, 1000)];
        let mut npcs = vec![test_npc(Vec3::ZERO)];
        let players = HashMap::new();
        let mut rng = test_rng();

        update_npcs(&mut npcs, &players, &ports, &mut rng);
        assert!(npcs[0].progress > 0.0);
        assert!(npcs[0].position.x > 0.0);

        // 10 units at 0.5 units/s = 200 ticks to arrive; stop mid-way
        // through the return leg
        for _ in 0..250 {
            update_npcs(&mut npcs, &players, &ports, &mut rng);
        }
        // Arrived and picked the only other port as the fresh destination
        assert_eq!(npcs[0].port_id, 1);
        assert_ne!(npcs[0].destination_port_id, npcs[0].port_id);
    }

    #[test]
    fn test_npc_freezes_near_player() {
        let ports = vec![test_port(0, 0.0, 500, 1000), test_port(1, 100.0, 500, 1000)];
        let mut npcs = vec![test_npc(Vec3::ZERO)];
        let mut players = HashMap::new();
        players.insert(1, test_player_at(1, Vec3::new(5.0, 0.0, 0.0)));
        let mut rng = test_rng();

        update_npcs(&mut npcs, &players, &ports, &mut rng);

        assert!(npcs[0].in_combat);
        // Frozen, not auto-attacking and not moving
        assert_eq!(npcs[0].combat_target, None);
        assert_eq!(npcs[0].progress, 0.0);
        assert_eq!(npcs[0].position, Vec3::ZERO);
    }

    #[test]
    fn test_npc_disengages_after_quiet_spell() {
        let ports = vec![test_port(0, 0.0, 500, 1000), test_port(1, 100.0, 500, 1000)];
        let mut npcs = vec![test_npc(Vec3::ZERO)];
        npcs[0].in_combat = true;
        npcs[0].combat_target = Some(1);
        let players = HashMap::new(); // attacker walked away / disconnected
        let mut rng = test_rng();

        for _ in 0..(NPC_DISENGAGE_TICKS - 1) {
            update_npcs(&mut npcs, &players, &ports, &mut rng);
            assert!(npcs[0].in_combat);
        }
        update_npcs(&mut npcs, &players, &ports, &mut rng);
        assert!(!npcs[0].in_combat);
        assert_eq!(npcs[0].combat_target, None);

        // Back on patrol next tick
        update_npcs(&mut npcs, &players, &ports, &mut rng);
        assert!(npcs[0].progress > 0.0);
    }

    #[test]
    fn test_npc_nearby_player_resets_disengage_counter() {
        let ports = vec![test_port(0, 0.0, 500, 1000), test_port(1, 100.0, 500, 1000)];
        let mut npcs = vec![test_npc(Vec3::ZERO)];
        npcs[0].in_combat = true;
        npcs[0].calm_ticks = NPC_DISENGAGE_TICKS - 1;
        let mut players = HashMap::new();
        players.insert(1, test_player_at(1, Vec3::new(5.0, 0.0, 0.0)));
        let mut rng = test_rng();

        update_npcs(&mut npcs, &players, &ports, &mut rng);
        assert!(npcs[0].in_combat);
        assert_eq!(npcs[0].calm_ticks, 0);
    }
}
