//! Server network layer: UDP transport, client tracking, and the single
//! message loop that owns the world state.
//!
//! Tick fires and inbound packets enter the same bounded FIFO queue, so all
//! world mutation happens on one logical thread — no command and no tick
//! ever interleave partial mutations of the same entity. When the queue is
//! full the sender is told the server is busy instead of being blocked.

use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{DynamicState, Packet, StaticState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

use crate::actions::Action;
use crate::scheduler::TickScheduler;
use crate::snapshot::{self, Publisher};
use crate::world::WorldState;

/// Depth of the single-writer message queue. Full queue = backpressure.
const MESSAGE_QUEUE_DEPTH: usize = 1024;

/// Clients that stay silent this long are dropped; any packet (including
/// `Ping`) refreshes the deadline.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Messages entering the single-writer loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    Tick {
        tick: u64,
    },
    ClientTimeout {
        player_id: u32,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages leaving the loop toward the network sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    SendToPlayer { player_id: u32, packet: Packet },
    Broadcast { packet: Packet },
}

/// A connected client and its keepalive state
#[derive(Debug)]
pub struct Client {
    pub id: u32,
    pub addr: SocketAddr,
    pub name: String,
    pub last_seen: Instant,
}

/// Tracks connected clients, enforces capacity, and maps addresses to
/// player ids for response routing.
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_player_id: u32,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_player_id: 1,
            max_clients,
        }
    }

    /// Returns the new player id, or None when the server is full.
    pub fn add_client(&mut self, addr: SocketAddr, name: &str) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let player_id = self.next_player_id;
        self.next_player_id += 1;

        self.clients.insert(
            player_id,
            Client {
                id: player_id,
                addr,
                name: name.to_string(),
                last_seen: Instant::now(),
            },
        );
        info!("Client {} ({}) connected from {}", player_id, name, addr);
        Some(player_id)
    }

    pub fn remove_client(&mut self, player_id: u32) -> bool {
        if let Some(client) = self.clients.remove(&player_id) {
            info!("Client {} ({}) disconnected", client.id, client.name);
            true
        } else {
            false
        }
    }

    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Refreshes the keepalive deadline for whoever sends from `addr`.
    pub fn touch(&mut self, addr: SocketAddr) {
        if let Some(client) = self.clients.values_mut().find(|c| c.addr == addr) {
            client.last_seen = Instant::now();
        }
    }

    pub fn addr_of(&self, player_id: u32) -> Option<SocketAddr> {
        self.clients.get(&player_id).map(|c| c.addr)
    }

    pub fn addrs(&self) -> Vec<(u32, SocketAddr)> {
        self.clients.iter().map(|(id, c)| (*id, c.addr)).collect()
    }

    /// Removes and returns the ids of clients past the keepalive deadline.
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.last_seen.elapsed() > CLIENT_TIMEOUT)
            .map(|(id, _)| *id)
            .collect();

        for player_id in &timed_out {
            self.remove_client(*player_id);
        }
        timed_out
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Publisher backed by the outbound packet channel. Snapshot fan-out only
/// ever touches serialized copies, never live world state.
pub struct ChannelPublisher {
    game_tx: mpsc::UnboundedSender<GameMessage>,
}

impl ChannelPublisher {
    pub fn new(game_tx: mpsc::UnboundedSender<GameMessage>) -> Self {
        Self { game_tx }
    }
}

impl Publisher for ChannelPublisher {
    fn publish_dynamic(&self, state: DynamicState) {
        if let Err(e) = self.game_tx.send(GameMessage::Broadcast {
            packet: Packet::Dynamic(state),
        }) {
            error!("Failed to queue dynamic broadcast: {}", e);
        }
    }

    fn publish_static(&self, player_id: u32, state: StaticState) {
        if let Err(e) = self.game_tx.send(GameMessage::SendToPlayer {
            player_id,
            packet: Packet::StaticData(state),
        }) {
            error!("Failed to queue static payload: {}", e);
        }
    }
}

/// Main server coordinating the transport tasks and the simulation loop.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    world: WorldState,
    scheduler: TickScheduler,
    tick_rate_ms: u64,
    started_at: Instant,

    server_tx: mpsc::Sender<ServerMessage>,
    server_rx: mpsc::Receiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        world: WorldState,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", addr);

        let (server_tx, server_rx) = mpsc::channel(MESSAGE_QUEUE_DEPTH);
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            world,
            scheduler: TickScheduler::new(tick_duration),
            tick_rate_ms: tick_duration.as_millis() as u64,
            started_at: Instant::now(),
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
        })
    }

    /// Spawns the task that listens for incoming packets and feeds the
    /// single-writer queue. A full queue is surfaced to the sender as a
    /// transient failure instead of blocking the socket.
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 8192];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) else {
                            warn!("Failed to deserialize packet from {}", addr);
                            continue;
                        };
                        if let Err(mpsc::error::TrySendError::Full(_)) =
                            server_tx.try_send(ServerMessage::PacketReceived { packet, addr })
                        {
                            warn!("Message queue full, rejecting packet from {}", addr);
                            let busy = Packet::Error {
                                error: "server busy, try again".to_string(),
                            };
                            if let Ok(data) = serialize(&busy) {
                                let _ = socket.send_to(&data, addr).await;
                            }
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that drains the outgoing packet queue.
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = self.game_rx.take().expect("sender task already spawned");

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = send_packet(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::SendToPlayer { player_id, packet } => {
                        let addr = {
                            let clients = clients.read().await;
                            clients.addr_of(player_id)
                        };
                        if let Some(addr) = addr {
                            if let Err(e) = send_packet(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", player_id, e);
                            }
                        }
                    }
                    GameMessage::Broadcast { packet } => {
                        let addrs = {
                            let clients = clients.read().await;
                            clients.addrs()
                        };
                        for (player_id, addr) in addrs {
                            if let Err(e) = send_packet(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", player_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns the task that monitors client keepalives.
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients = clients.write().await;
                    clients.check_timeouts()
                };

                for player_id in timed_out {
                    if server_tx
                        .send(ServerMessage::ClientTimeout { player_id })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
            }
        });
    }

    fn queue_reply(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Processes one inbound packet against the world state.
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        {
            let mut clients = self.clients.write().await;
            clients.touch(addr);
        }

        match packet {
            Packet::Join { name } => {
                // A rejoin from the same address replaces the old player
                let existing = {
                    let clients = self.clients.read().await;
                    clients.find_by_addr(addr)
                };
                if let Some(old_id) = existing {
                    info!("Replacing existing client {} from {}", old_id, addr);
                    let mut clients = self.clients.write().await;
                    clients.remove_client(old_id);
                    self.world.remove_player(old_id);
                }

                let player_id = {
                    let mut clients = self.clients.write().await;
                    clients.add_client(addr, &name)
                };

                match player_id {
                    Some(player_id) => {
                        self.world.add_player(player_id, &name);
                        self.queue_reply(
                            Packet::Joined {
                                player_id,
                                player_name: name,
                            },
                            addr,
                        );
                        let publisher = ChannelPublisher::new(self.game_tx.clone());
                        publisher.publish_static(player_id, snapshot::static_state(&self.world));
                    }
                    None => {
                        self.queue_reply(
                            Packet::Disconnected {
                                reason: "server full".to_string(),
                            },
                            addr,
                        );
                    }
                }
            }

            Packet::Action { kind, target_id } => {
                let player_id = {
                    let clients = self.clients.read().await;
                    clients.find_by_addr(addr)
                };
                let Some(player_id) = player_id else {
                    self.queue_reply(
                        Packet::Error {
                            error: "not joined".to_string(),
                        },
                        addr,
                    );
                    return;
                };

                let tick = self.scheduler.current_tick();
                let result = Action::from_wire(kind, target_id)
                    .and_then(|action| self.world.process_action(player_id, action, tick));

                let reply = match result {
                    Ok(state) => Packet::ActionOk {
                        action: kind,
                        state,
                    },
                    Err(failure) => Packet::ActionError {
                        action: kind,
                        error: failure.to_string(),
                    },
                };
                self.queue_reply(reply, addr);
            }

            Packet::Ping => {
                self.queue_reply(Packet::Pong, addr);
            }

            Packet::Disconnect => {
                let player_id = {
                    let clients = self.clients.read().await;
                    clients.find_by_addr(addr)
                };
                if let Some(player_id) = player_id {
                    let mut clients = self.clients.write().await;
                    clients.remove_client(player_id);
                    self.world.remove_player(player_id);
                }
            }

            Packet::HealthCheck => {
                let clients = self.clients.read().await;
                self.queue_reply(
                    Packet::Health {
                        status: "ok".to_string(),
                        tick: self.scheduler.current_tick(),
                        player_count: clients.len(),
                        bot_count: self.world.bot_count(),
                        uptime_secs: self.started_at.elapsed().as_secs(),
                    },
                    addr,
                );
            }

            Packet::StatsRequest => {
                let clients = self.clients.read().await;
                self.queue_reply(
                    Packet::Stats {
                        tick: self.scheduler.current_tick(),
                        player_count: clients.len(),
                        bot_count: self.world.bot_count(),
                        tick_rate_ms: self.tick_rate_ms,
                    },
                    addr,
                );
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Runs one simulation step and fans the dynamic snapshot out.
    async fn handle_tick(&mut self, tick: u64) {
        self.world.update(tick);

        let client_count = {
            let clients = self.clients.read().await;
            clients.len()
        };
        if client_count > 0 {
            let publisher = ChannelPublisher::new(self.game_tx.clone());
            publisher.publish_dynamic(snapshot::dynamic_state(&self.world, tick));
        }

        if tick % 100 == 0 {
            debug!(
                "Tick {}: {} clients, {} players, {} bots",
                tick,
                client_count,
                self.world.player_count(),
                self.world.bot_count()
            );
        }
    }

    /// Main loop: spawns the transport tasks, starts the scheduler, and
    /// drains the single-writer queue until shutdown.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        // The scheduler drops a message into the same queue every tick;
        // a full queue skips the broadcast but never stalls the timer.
        let tick_tx = self.server_tx.clone();
        self.scheduler.on_tick(move |tick| {
            if tick_tx.try_send(ServerMessage::Tick { tick }).is_err() {
                warn!("Message queue full, skipping tick {} broadcast", tick);
            }
        });
        self.scheduler.start();

        info!("Server started successfully");

        loop {
            match self.server_rx.recv().await {
                Some(ServerMessage::PacketReceived { packet, addr }) => {
                    self.handle_packet(packet, addr).await;
                }
                Some(ServerMessage::Tick { tick }) => {
                    self.handle_tick(tick).await;
                }
                Some(ServerMessage::ClientTimeout { player_id }) => {
                    self.world.remove_player(player_id);
                }
                Some(ServerMessage::Shutdown) | None => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        self.scheduler.stop();
        Ok(())
    }
}

async fn send_packet(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}
