use crate::error::SessionError;
use crate::world::{LoginOutcome, WorldCommand};
use bytes::BytesMut;
use mc8_protocol::{
    next_client_frame, ClientPacket, FramingError, SessionState, ServerPacket, PROTOCOL_VERSION,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

const READ_CHUNK: usize = 4096;

/// Per-connection session-machine state threaded through `dispatch`.
/// `handshake_username` is the username declared in the `ANONYMOUS` ->
/// `HANDSHAKE` step; `spec.md` §4.3 step 1 requires the later
/// `LoginRequest` username to match it exactly.
struct DispatchState {
    state: SessionState,
    eid: Option<i32>,
    handshake_username: Option<String>,
}

impl DispatchState {
    fn new() -> Self {
        Self { state: SessionState::Anonymous, eid: None, handshake_username: None }
    }
}

/// One tokio task per TCP connection: the I/O pump that reads frames off
/// the socket and forwards them to the world task, and drains the
/// world's replies back onto the socket. Mirrors the teacher's
/// `Connection` task loop, adapted to this protocol's framing and to a
/// single shared world owner instead of a sharded table.
pub async fn handle_connection(mut socket: TcpStream, world: mpsc::UnboundedSender<WorldCommand>) {
    let peer = socket.peer_addr().ok();
    let mut session = DispatchState::new();
    let mut recv_buf = BytesMut::with_capacity(READ_CHUNK);

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerPacket>();

    let result: Result<(), SessionError> = 'session: loop {
        tokio::select! {
            read = socket.read_buf(&mut recv_buf) => {
                match read {
                    Ok(0) => break 'session Ok(()), // peer closed cleanly
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(?peer, error = %e, "transport lost");
                        break 'session Ok(());
                    }
                }

                loop {
                    match next_client_frame(&mut recv_buf) {
                        Ok(None) => break,
                        Ok(Some(packet)) => {
                            if let Err(e) = dispatch(
                                &packet,
                                &mut session,
                                &world,
                                &outbound_tx,
                            ).await {
                                break 'session Err(e);
                            }
                        }
                        Err(FramingError::BadOpcode) => {
                            tracing::warn!(?peer, opcode = recv_buf.first().copied().unwrap_or(0), "unrecognised opcode");
                            break 'session Err(SessionError::BadOpcode);
                        }
                        Err(FramingError::Malformed(reason)) => {
                            tracing::warn!(?peer, %reason, "malformed frame");
                            break 'session Err(SessionError::BadOpcode);
                        }
                    }
                }
            }
            outgoing = outbound_rx.recv() => {
                match outgoing {
                    Some(packet) => {
                        if write_packet(&mut socket, &packet).await.is_err() {
                            break 'session Ok(());
                        }
                    }
                    None => break 'session Ok(()),
                }
            }
        }
    };

    if let Err(err) = result {
        let _ = write_packet(&mut socket, &ServerPacket::Kick { reason: err.kick_reason().to_string() }).await;
    }
    if let Some(eid) = session.eid {
        let _ = world.send(WorldCommand::Disconnect { eid });
    }
}

async fn dispatch(
    packet: &ClientPacket,
    session: &mut DispatchState,
    world: &mpsc::UnboundedSender<WorldCommand>,
    outbound_tx: &mpsc::UnboundedSender<ServerPacket>,
) -> Result<(), SessionError> {
    if !session.state.accepts(opcode_of(packet)) {
        return Err(SessionError::BadState);
    }

    match (session.state, packet) {
        (SessionState::Anonymous, ClientPacket::Handshake { username }) => {
            outbound_tx
                .send(ServerPacket::Handshake { connection_hash: "-".to_string() })
                .ok();
            session.handshake_username = Some(username.clone());
            session.state = SessionState::Handshake;
        }
        (SessionState::Handshake, ClientPacket::LoginRequest { protocol_version, username, .. }) => {
            if *protocol_version != PROTOCOL_VERSION {
                return Err(SessionError::BadProtocol);
            }
            if username.is_empty() || session.handshake_username.as_deref() != Some(username.as_str()) {
                return Err(SessionError::BadCredentials);
            }
            session.state = SessionState::LoggingIn;

            let (reply_tx, reply_rx) = oneshot::channel::<LoginOutcome>();
            if world
                .send(WorldCommand::Login {
                    username: username.clone(),
                    outbound: outbound_tx.clone(),
                    reply: reply_tx,
                })
                .is_err()
            {
                return Err(SessionError::BadCredentials);
            }
            match reply_rx.await {
                Ok(outcome) => {
                    session.eid = Some(outcome.eid);
                    session.state = SessionState::PlayGame;
                }
                Err(_) => return Err(SessionError::BadCredentials),
            }
        }
        (SessionState::PlayGame, other) => {
            if let Some(id) = session.eid {
                let _ = world.send(WorldCommand::Packet { eid: id, packet: other.clone() });
            }
        }
        _ => return Err(SessionError::BadState),
    }
    Ok(())
}

fn opcode_of(packet: &ClientPacket) -> u8 {
    use mc8_protocol::*;
    match packet {
        ClientPacket::KeepAlive => OP_KEEP_ALIVE,
        ClientPacket::Handshake { .. } => OP_HANDSHAKE,
        ClientPacket::LoginRequest { .. } => OP_LOGIN_REQUEST,
        ClientPacket::ChatMessage { .. } => OP_CHAT_MESSAGE,
        ClientPacket::PlayerOnGround { .. } => OP_PLAYER_ON_GROUND,
        ClientPacket::PlayerPosition { .. } => OP_PLAYER_POSITION,
        ClientPacket::PlayerLook { .. } => OP_PLAYER_LOOK,
        ClientPacket::PlayerPosLook { .. } => OP_PLAYER_POS_LOOK,
        ClientPacket::PlayerDigging { .. } => OP_PLAYER_DIGGING,
        ClientPacket::HoldItem { .. } => OP_HOLD_ITEM,
        ClientPacket::EntityAnimation { .. } => OP_ENTITY_ANIMATION,
        ClientPacket::BlockChange { .. } => OP_BLOCK_CHANGE,
    }
}

async fn write_packet(socket: &mut TcpStream, packet: &ServerPacket) -> std::io::Result<()> {
    let mut buf = BytesMut::new();
    packet.encode(&mut buf);
    socket.write_all(&buf).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels() -> (
        mpsc::UnboundedSender<WorldCommand>,
        mpsc::UnboundedReceiver<WorldCommand>,
        mpsc::UnboundedSender<ServerPacket>,
        mpsc::UnboundedReceiver<ServerPacket>,
    ) {
        let (world_tx, world_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (world_tx, world_rx, outbound_tx, outbound_rx)
    }

    async fn handshake(session: &mut DispatchState, world: &mpsc::UnboundedSender<WorldCommand>, outbound: &mpsc::UnboundedSender<ServerPacket>, username: &str) {
        dispatch(&ClientPacket::Handshake { username: username.to_string() }, session, world, outbound)
            .await
            .expect("handshake is always accepted from ANONYMOUS");
    }

    #[tokio::test]
    async fn packet_outside_accepted_state_is_bad_state() {
        let (world_tx, _world_rx, outbound_tx, _outbound_rx) = channels();
        let mut session = DispatchState::new();

        let result = dispatch(
            &ClientPacket::ChatMessage { message: "hi".to_string() },
            &mut session,
            &world_tx,
            &outbound_tx,
        )
        .await;

        assert!(matches!(result, Err(SessionError::BadState)));
    }

    #[tokio::test]
    async fn login_request_before_handshake_is_bad_state() {
        let (world_tx, _world_rx, outbound_tx, _outbound_rx) = channels();
        let mut session = DispatchState::new();

        let result = dispatch(
            &ClientPacket::LoginRequest {
                protocol_version: PROTOCOL_VERSION,
                username: "alice".to_string(),
                password: String::new(),
            },
            &mut session,
            &world_tx,
            &outbound_tx,
        )
        .await;

        assert!(matches!(result, Err(SessionError::BadState)));
    }

    #[tokio::test]
    async fn wrong_protocol_version_is_rejected() {
        let (world_tx, _world_rx, outbound_tx, _outbound_rx) = channels();
        let mut session = DispatchState::new();
        handshake(&mut session, &world_tx, &outbound_tx, "alice").await;

        let result = dispatch(
            &ClientPacket::LoginRequest {
                protocol_version: PROTOCOL_VERSION + 1,
                username: "alice".to_string(),
                password: String::new(),
            },
            &mut session,
            &world_tx,
            &outbound_tx,
        )
        .await;

        assert!(matches!(result, Err(SessionError::BadProtocol)));
    }

    #[tokio::test]
    async fn username_mismatched_with_handshake_is_rejected() {
        let (world_tx, _world_rx, outbound_tx, _outbound_rx) = channels();
        let mut session = DispatchState::new();
        handshake(&mut session, &world_tx, &outbound_tx, "alice").await;

        let result = dispatch(
            &ClientPacket::LoginRequest {
                protocol_version: PROTOCOL_VERSION,
                username: "bob".to_string(),
                password: String::new(),
            },
            &mut session,
            &world_tx,
            &outbound_tx,
        )
        .await;

        assert!(matches!(result, Err(SessionError::BadCredentials)));
    }

    #[tokio::test]
    async fn empty_username_is_rejected_even_if_handshake_was_also_empty() {
        let (world_tx, _world_rx, outbound_tx, _outbound_rx) = channels();
        let mut session = DispatchState::new();
        handshake(&mut session, &world_tx, &outbound_tx, "").await;

        let result = dispatch(
            &ClientPacket::LoginRequest {
                protocol_version: PROTOCOL_VERSION,
                username: String::new(),
                password: String::new(),
            },
            &mut session,
            &world_tx,
            &outbound_tx,
        )
        .await;

        assert!(matches!(result, Err(SessionError::BadCredentials)));
    }

    #[tokio::test]
    async fn matching_username_proceeds_to_login_and_awaits_world_reply() {
        let (world_tx, mut world_rx, outbound_tx, _outbound_rx) = channels();
        let mut session = DispatchState::new();
        handshake(&mut session, &world_tx, &outbound_tx, "alice").await;

        let login = tokio::spawn(async move {
            dispatch(
                &ClientPacket::LoginRequest {
                    protocol_version: PROTOCOL_VERSION,
                    username: "alice".to_string(),
                    password: String::new(),
                },
                &mut session,
                &world_tx,
                &outbound_tx,
            )
            .await
            .map(|()| session)
        });

        match world_rx.recv().await {
            Some(WorldCommand::Login { username, reply, .. }) => {
                assert_eq!(username, "alice");
                reply.send(LoginOutcome { eid: 1, seed: 0 }).ok();
            }
            Some(WorldCommand::Packet { .. }) | Some(WorldCommand::Disconnect { .. }) => {
                panic!("expected a Login command")
            }
            None => panic!("world channel closed before a Login command arrived"),
        }

        let session = login.await.unwrap().expect("matching username logs in");
        assert_eq!(session.eid, Some(1));
    }
}
