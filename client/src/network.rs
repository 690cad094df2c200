use crate::camera::OrbitCamera;
use crate::game::ClientGameState;
use crate::input::{InputDevice, InputManager};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{timestamp_ms, InputState, Packet, ParticipantId, Role, CLIENT_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep, Instant};

/// Presentation frames run faster than the simulation tick.
const FRAME_INTERVAL: Duration = Duration::from_millis(8);
/// How long to wait for the lobby broadcast to reflect a ready request
/// before sending it again.
const READY_RESEND_INTERVAL: Duration = Duration::from_millis(250);

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    role: Role,
    participant_id: Option<ParticipantId>,
    connected: bool,
    running: bool,
    auto_ready: bool,
    /// Last ready flag we asked for and when it was sent
    ready_request: Option<(bool, Instant)>,

    game_state: ClientGameState,
    input_manager: InputManager,
    camera: OrbitCamera,
    device: Box<dyn InputDevice + Send>,
    tick_duration: Duration,

    ping_ms: u64,
    fake_ping_ms: u64,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        tick_duration: Duration,
        fake_ping_ms: u64,
        auto_ready: bool,
        device: Box<dyn InputDevice + Send>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            role: Role::Observer,
            participant_id: None,
            connected: false,
            running: true,
            auto_ready,
            ready_request: None,
            game_state: ClientGameState::new(),
            input_manager: InputManager::new(),
            camera: OrbitCamera::default(),
            device,
            tick_duration,
            ping_ms: 0,
            fake_ping_ms,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn participant_id(&self) -> Option<ParticipantId> {
        self.participant_id
    }

    pub fn game_state(&self) -> &ClientGameState {
        &self.game_state
    }

    pub fn ping_ms(&self) -> u64 {
        self.ping_ms
    }

    async fn connect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");

        let packet = Packet::Connect {
            client_version: CLIENT_VERSION,
        };
        self.send_packet(&packet).await?;

        Ok(())
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    /// Observers cannot flip flags themselves; the request goes to the
    /// authority, which answers with the next lobby broadcast.
    ///
    /// The request is repeated from the tick loop until that broadcast agrees.
    pub async fn request_set_ready(
        &mut self,
        ready: bool,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match self.role {
            Role::Observer => {}
            Role::Authority => {
                return Err("the session authority commits ready flags directly".into());
            }
        }
        if !self.connected {
            return Ok(());
        }

        info!("Requesting ready = {}", ready);
        self.ready_request = Some((ready, Instant::now()));
        self.send_packet(&Packet::SetReady { ready }).await
    }

    /// The ready flag to send again, if the replicated lobby still disagrees
    /// with our last request and the resend interval has passed.
    fn ready_resend_due(&self, now: Instant) -> Option<bool> {
        let (ready, sent_at) = self.ready_request?;
        let participant_id = self.participant_id?;
        let acknowledged = self.game_state.lobby().is_ready(participant_id) == ready;
        if acknowledged || self.game_state.in_gameplay() {
            return None;
        }
        (now.duration_since(sent_at) >= READY_RESEND_INTERVAL).then_some(ready)
    }

    async fn handle_packet(&mut self, packet: Packet) -> Result<(), Box<dyn std::error::Error>> {
        match packet {
            Packet::Connected { participant_id } => {
                info!("Connected! Participant ID: {}", participant_id);
                self.participant_id = Some(participant_id);
                self.connected = true;
                self.game_state.set_participant(Some(participant_id));

                if self.auto_ready {
                    self.request_set_ready(true).await?;
                }
            }

            Packet::LobbyState {
                ready,
                countdown_active,
            } => {
                self.game_state.apply_lobby_state(ready, countdown_active);
            }

            Packet::LoadScene { scene } => {
                if self.game_state.load_scene(scene) {
                    self.ready_request = None;
                    self.camera.clear_target();
                }
            }

            Packet::GameState {
                tick,
                timestamp,
                last_processed_input,
                entities,
            } => {
                if timestamp > 0 {
                    self.ping_ms = timestamp_ms().saturating_sub(timestamp);
                }

                let appeared = self.game_state.apply_server_state(
                    tick,
                    timestamp,
                    &last_processed_input,
                    entities,
                );
                if let Some(local) = appeared {
                    self.camera.set_target(local.entity, local.pose.rotation);
                }
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.running = false;
                self.participant_id = None;
                self.ready_request = None;
                self.game_state.reset();
            }

            _ => {
                warn!("Unexpected packet type");
            }
        }
        Ok(())
    }

    /// Sends the tick's input in gameplay. In the lobby nothing moves, so a
    /// heartbeat keeps the connection alive instead, along with any ready
    /// request the authority has not acknowledged yet.
    async fn send_input(&mut self, input: InputState) -> Result<(), Box<dyn std::error::Error>> {
        if !self.connected {
            return Ok(());
        }

        if !self.game_state.in_gameplay() {
            if let Some(ready) = self.ready_resend_due(Instant::now()) {
                debug!("Ready request not reflected yet, sending again");
                self.request_set_ready(ready).await?;
            }
            return self.send_packet(&Packet::Heartbeat).await;
        }

        let packet = Packet::Input {
            sequence: input.sequence,
            timestamp: input.timestamp,
            intent: input.intent,
        };

        self.send_packet(&packet).await
    }

    /// Runs until the server disconnects us.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.connect().await?;

        let mut tick_interval = interval(self.tick_duration);
        let mut frame_interval = interval(FRAME_INTERVAL);
        let mut last_frame = tokio::time::Instant::now();

        let mut buffer = [0u8; 2048];

        while self.running {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Packet>(&buffer[0..len]) {
                                Ok(packet) => self.handle_packet(packet).await?,
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = frame_interval.tick() => {
                    let now = tokio::time::Instant::now();
                    let dt = now.duration_since(last_frame).as_secs_f32();
                    last_frame = now;

                    let sample = self.device.sample();
                    self.input_manager.update_frame(&sample, &mut self.camera);
                    self.game_state.advance_presentation_frame(dt);
                },

                _ = tick_interval.tick() => {
                    let input = self.input_manager.flush_tick(&self.camera);
                    if let Err(e) = self.send_input(input).await {
                        error!("Error sending input: {}", e);
                    }
                },
            }
        }

        Ok(())
    }

    /// Tells the server we are leaving.
    pub async fn disconnect(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.connected {
            self.send_packet(&Packet::Disconnect).await?;
            self.connected = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{MovePattern, ScriptedDevice};
    use shared::{EntityState, Pose};
    use std::collections::HashMap;

    async fn client() -> Client {
        Client::new(
            "127.0.0.1:9",
            Duration::from_millis(16),
            0,
            false,
            Box::new(ScriptedDevice::new(MovePattern::Idle)),
        )
        .await
        .unwrap()
    }

    /// A client pointed at a local socket standing in for the server.
    async fn client_with_server() -> (Client, UdpSocket) {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let client = Client::new(
            &addr,
            Duration::from_millis(16),
            0,
            false,
            Box::new(ScriptedDevice::new(MovePattern::Idle)),
        )
        .await
        .unwrap();
        (client, server)
    }

    async fn recv(server: &UdpSocket) -> Packet {
        let mut buf = [0u8; 2048];
        let (len, _) = tokio::time::timeout(Duration::from_secs(1), server.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        deserialize(&buf[..len]).unwrap()
    }

    fn game_state_for(owner: ParticipantId, entity: u32) -> Packet {
        Packet::GameState {
            tick: 1,
            timestamp: 0,
            last_processed_input: HashMap::new(),
            entities: vec![EntityState {
                entity,
                owner,
                pose: Pose::default(),
            }],
        }
    }

    #[test]
    fn test_client_is_an_observer() {
        tokio_test::block_on(async {
            let client = client().await;
            assert_eq!(client.role(), Role::Observer);
        });
    }

    #[test]
    fn test_connected_assigns_participant() {
        tokio_test::block_on(async {
            let mut client = client().await;
            client
                .handle_packet(Packet::Connected { participant_id: 4 })
                .await
                .unwrap();

            assert_eq!(client.participant_id(), Some(4));
            assert_eq!(client.game_state().participant_id(), Some(4));
        });
    }

    #[test]
    fn test_own_entity_becomes_camera_target() {
        tokio_test::block_on(async {
            let mut client = client().await;
            let packets = vec![
                Packet::Connected { participant_id: 2 },
                Packet::LoadScene {
                    scene: "game".to_string(),
                },
                game_state_for(2, 8),
            ];
            for packet in packets {
                client.handle_packet(packet).await.unwrap();
            }

            assert!(client.game_state().in_gameplay());
            assert_eq!(client.camera.target(), Some(8));
        });
    }

    #[test]
    fn test_repeated_load_scene_keeps_camera_target() {
        tokio_test::block_on(async {
            let mut client = client().await;
            let load = Packet::LoadScene {
                scene: "game".to_string(),
            };
            client
                .handle_packet(Packet::Connected { participant_id: 2 })
                .await
                .unwrap();
            client.handle_packet(load.clone()).await.unwrap();
            client.handle_packet(game_state_for(2, 8)).await.unwrap();

            client.handle_packet(load).await.unwrap();
            assert_eq!(client.camera.target(), Some(8));
            assert_eq!(client.game_state().local_entity(), Some(8));
        });
    }

    #[test]
    fn test_disconnected_stops_the_loop() {
        tokio_test::block_on(async {
            let mut client = client().await;
            client
                .handle_packet(Packet::Connected { participant_id: 1 })
                .await
                .unwrap();
            client
                .handle_packet(Packet::Disconnected {
                    reason: "Server full".to_string(),
                })
                .await
                .unwrap();

            assert!(!client.running);
            assert!(!client.connected);
            assert_eq!(client.participant_id(), None);
        });
    }

    #[test]
    fn test_lobby_sends_heartbeat_instead_of_input() {
        tokio_test::block_on(async {
            let (mut client, server) = client_with_server().await;
            client
                .handle_packet(Packet::Connected { participant_id: 1 })
                .await
                .unwrap();

            let input = client.input_manager.flush_tick(&client.camera);
            client.send_input(input).await.unwrap();
            assert!(matches!(recv(&server).await, Packet::Heartbeat));

            client
                .handle_packet(Packet::LoadScene {
                    scene: "game".to_string(),
                })
                .await
                .unwrap();
            let input = client.input_manager.flush_tick(&client.camera);
            client.send_input(input).await.unwrap();
            match recv(&server).await {
                Packet::Input { sequence, .. } => assert_eq!(sequence, 2),
                other => panic!("Unexpected packet: {:?}", other),
            }
        });
    }

    #[test]
    fn test_ready_request_repeats_until_lobby_agrees() {
        tokio_test::block_on(async {
            let (mut client, server) = client_with_server().await;
            client
                .handle_packet(Packet::Connected { participant_id: 3 })
                .await
                .unwrap();

            client.request_set_ready(true).await.unwrap();
            assert!(matches!(recv(&server).await, Packet::SetReady { ready: true }));

            // Lost request: the broadcast still shows us not ready
            client
                .handle_packet(Packet::LobbyState {
                    ready: vec![(3, false)],
                    countdown_active: false,
                })
                .await
                .unwrap();
            let now = Instant::now();
            assert_eq!(client.ready_resend_due(now), None);
            let later = now + READY_RESEND_INTERVAL;
            assert_eq!(client.ready_resend_due(later), Some(true));

            client
                .handle_packet(Packet::LobbyState {
                    ready: vec![(3, true)],
                    countdown_active: true,
                })
                .await
                .unwrap();
            assert_eq!(client.ready_resend_due(later), None);
        });
    }

    #[test]
    fn test_authority_role_does_not_request() {
        tokio_test::block_on(async {
            let mut client = client().await;
            client.connected = true;
            client.role = Role::Authority;

            assert!(client.request_set_ready(true).await.is_err());
            assert!(client.ready_request.is_none());
        });
    }
}
