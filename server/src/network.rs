//! Server network layer handling UDP communications and the authority tick

use crate::registry::ParticipantRegistry;
use crate::session::{Scene, Session};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::config::{SessionConfig, CLIENT_TIMEOUT};
use shared::{timestamp_ms, InputIntent, InputState, Packet, ParticipantId, Role, SessionError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    ParticipantTimeout {
        participant_id: ParticipantId,
    },
    Shutdown,
}

/// Messages sent from the tick loop to network tasks
#[derive(Debug)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<ParticipantId>,
    },
}

/// Session authority coordinating networking and simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    registry: Arc<RwLock<ParticipantRegistry>>,
    session: Session,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    /// Binds the socket. Fails if more participants may connect than the
    /// session has entities for.
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_participants: usize,
        config: SessionConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if max_participants > config.capacity {
            error!(
                "Participant limit {} exceeds entity capacity {}",
                max_participants, config.capacity
            );
            return Err(Box::new(SessionError::CapacityExceeded {
                capacity: config.capacity,
            }));
        }

        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let registry = ParticipantRegistry::new(max_participants);
        let mut session = Session::new(Role::Authority, config);
        session.activate(&registry)?;

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            registry: Arc::new(RwLock::new(registry)),
            session,
            tick_duration,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sender that can stop a running server from another task.
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
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

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let registry = Arc::clone(&self.registry);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let addrs = {
                            let registry = registry.read().await;
                            registry.participant_addrs()
                        };

                        for (participant_id, addr) in addrs {
                            if Some(participant_id) == exclude {
                                continue;
                            }

                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to participant {}: {}", participant_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that drops participants who went silent
    fn spawn_timeout_checker(&self) {
        let registry = Arc::clone(&self.registry);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let registry = registry.read().await;
                    registry.timed_out_participants(CLIENT_TIMEOUT)
                };

                for participant_id in timed_out {
                    if let Err(e) =
                        server_tx.send(ServerMessage::ParticipantTimeout { participant_id })
                    {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn broadcast_packet(&self, packet: Packet, exclude: Option<ParticipantId>) {
        if let Err(e) = self
            .game_tx
            .send(GameMessage::BroadcastPacket { packet, exclude })
        {
            error!("Failed to queue broadcast packet: {}", e);
        }
    }

    async fn participant_at(&self, addr: SocketAddr) -> Option<ParticipantId> {
        let mut registry = self.registry.write().await;
        let id = registry.find_by_addr(addr)?;
        registry.touch(id);
        Some(id)
    }

    /// Removes the participant from the registry first, then from the session.
    ///
    /// Unknown ids are ignored, so a repeated timeout report cannot restart
    /// the countdown.
    async fn remove_participant(
        &mut self,
        participant_id: ParticipantId,
    ) -> Result<(), SessionError> {
        let mut registry = self.registry.write().await;
        if !registry.remove_participant(&participant_id) {
            return Ok(());
        }
        self.session.on_leave(participant_id, &*registry)
    }

    async fn handle_timeout(&mut self, participant_id: ParticipantId) -> Result<(), SessionError> {
        info!("Participant {} timed out", participant_id);
        self.remove_participant(participant_id).await
    }

    /// Applies one incoming packet. Only capacity errors escape.
    async fn handle_packet(
        &mut self,
        packet: Packet,
        addr: SocketAddr,
    ) -> Result<(), SessionError> {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Participant connecting from {} (version: {})",
                    addr, client_version
                );

                let existing = {
                    let registry = self.registry.read().await;
                    registry.find_by_addr(addr)
                };
                if let Some(existing_id) = existing {
                    info!("Replacing participant {} from {}", existing_id, addr);
                    self.remove_participant(existing_id).await?;
                }

                let participant_id = {
                    let mut registry = self.registry.write().await;
                    registry.add_participant(addr)
                };

                match participant_id {
                    Some(participant_id) => {
                        self.session.on_join(participant_id)?;
                        // Late joiners get LoadScene with the next tick
                        self.send_packet(Packet::Connected { participant_id }, addr);
                    }
                    None => {
                        warn!("Rejecting {}: session full", addr);
                        self.send_packet(
                            Packet::Disconnected {
                                reason: "Server full".to_string(),
                            },
                            addr,
                        );
                    }
                }
            }

            Packet::SetReady { ready } => {
                if let Some(participant_id) = self.participant_at(addr).await {
                    let registry = self.registry.read().await;
                    if let Err(e) = self.session.set_ready(participant_id, ready, &*registry) {
                        warn!("Ready request from {} rejected: {}", participant_id, e);
                    }
                }
            }

            Packet::Heartbeat => {
                self.participant_at(addr).await;
            }

            Packet::Input {
                sequence,
                timestamp,
                intent,
            } => {
                if let Some(participant_id) = self.participant_at(addr).await {
                    let input = InputState {
                        sequence,
                        timestamp,
                        intent,
                    };

                    // Clients only send inputs once the gameplay scene runs
                    let mut registry = self.registry.write().await;
                    registry.mark_scene_loaded(participant_id);
                    registry.add_input(participant_id, input);
                }
            }

            Packet::Disconnect => {
                let participant_id = {
                    let registry = self.registry.read().await;
                    registry.find_by_addr(addr)
                };

                if let Some(participant_id) = participant_id {
                    self.remove_participant(participant_id).await?;
                }
            }

            _ => {
                warn!("Unexpected packet type from {}", addr);
            }
        }
        Ok(())
    }

    /// Runs one authority tick and queues the resulting broadcasts.
    async fn tick(&mut self, dt: Duration) -> Result<(), SessionError> {
        let intents: Vec<(ParticipantId, InputIntent)> = {
            let mut registry = self.registry.write().await;
            registry
                .take_latest_inputs()
                .into_iter()
                .map(|(participant_id, input)| (participant_id, input.intent))
                .collect()
        };

        let loaded = {
            let registry = self.registry.read().await;
            self.session.advance_tick(dt, &*registry, &intents)?
        };
        if let Some(scene) = loaded {
            info!("Session started, loading '{}'", scene);
        }

        self.send_pending_scene_loads().await;
        self.broadcast_session_state().await;
        Ok(())
    }

    /// Repeats LoadScene to everyone who has not confirmed it with an input.
    ///
    /// A single lost datagram would otherwise leave that client in the lobby.
    async fn send_pending_scene_loads(&self) {
        let Scene::Gameplay(scene) = self.session.scene() else {
            return;
        };

        let awaiting = {
            let registry = self.registry.read().await;
            registry.awaiting_scene()
        };
        for (_, addr) in awaiting {
            self.send_packet(
                Packet::LoadScene {
                    scene: scene.clone(),
                },
                addr,
            );
        }
    }

    /// Broadcasts the lobby replica or the world snapshot, depending on scene
    async fn broadcast_session_state(&self) {
        let last_processed_input = {
            let registry = self.registry.read().await;
            if registry.is_empty() {
                return;
            }
            registry.last_processed_inputs()
        };

        let packet = match self.session.lobby_state() {
            Some((ready, countdown_active)) => Packet::LobbyState {
                ready,
                countdown_active,
            },
            None => Packet::GameState {
                tick: self.session.tick(),
                // Take timestamp as close to transmission as possible
                timestamp: timestamp_ms(),
                last_processed_input,
                entities: self.session.snapshot(),
            },
        };

        self.broadcast_packet(packet, None);
    }

    /// Main server loop coordinating all operations
    ///
    /// Returns an error only when the session hits a fatal condition.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        let mut last_tick = Instant::now();

        info!("Server started successfully");

        loop {
            let outcome = tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await
                        },
                        Some(ServerMessage::ParticipantTimeout { participant_id }) => {
                            self.handle_timeout(participant_id).await
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle server tick events
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick);
                    last_tick = now;

                    let outcome = self.tick(dt).await;

                    if self.session.tick() % 60 == 0 && self.session.tick() > 0 {
                        let count = self.registry.read().await.len();
                        let hz = 1.0 / dt.as_secs_f32().max(f32::EPSILON);
                        debug!("Tick {}: {} participants, {:.1}Hz", self.session.tick(), count, hz);
                    }
                    outcome
                },
            };

            if let Err(e) = outcome {
                error!("Fatal session error: {}", e);
                return Err(Box::new(e));
            }
        }

        Ok(())
    }
}
