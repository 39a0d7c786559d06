use crate::player::PlayerState;
use mc8_protocol::{ClientPacket, ServerPacket};
use mc8_types::{absolute_int, EntityId, FIRST_ENTITY_ID};
use mc8_world::LoadedWorld;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;

const VIEW_RADIUS: i32 = 5;
const TICK_TIME_STEP: i64 = 20;
const TICK_TIME_WRAP: i64 = 24000;

pub enum WorldCommand {
    Login {
        username: String,
        outbound: UnboundedSender<ServerPacket>,
        reply: oneshot::Sender<LoginOutcome>,
    },
    Packet {
        eid: EntityId,
        packet: ClientPacket,
    },
    Disconnect {
        eid: EntityId,
    },
}

pub struct LoginOutcome {
    pub eid: EntityId,
    pub seed: i64,
}

/// Everything mutable about the running game lives here, and only this
/// task ever touches it — the cooperative single-owner model of
/// `spec.md` §5, expressed as "one task" rather than "one OS thread".
struct WorldState {
    loaded: LoadedWorld,
    players: std::collections::HashMap<EntityId, PlayerState>,
    next_eid: EntityId,
    time: i64,
}

impl WorldState {
    fn all_coords_in_radius(center: (i32, i32), radius: i32) -> Vec<(i32, i32)> {
        let mut coords = Vec::new();
        for cx in (center.0 - radius)..(center.0 + radius) {
            for cz in (center.1 - radius)..(center.1 + radius) {
                coords.push((cx, cz));
            }
        }
        coords
    }

    fn login(&mut self, username: String, outbound: UnboundedSender<ServerPacket>) -> LoginOutcome {
        let eid = self.next_eid;
        self.next_eid += 1;

        outbound_send(&outbound, ServerPacket::LoginRequest {
            eid,
            seed: self.loaded.seed,
            dimension: 0,
        });

        let (spawn_x, spawn_y, spawn_z) = self.loaded.spawn;
        let spawn_chunk = (spawn_x >> 4, spawn_z >> 4);

        let mut player = PlayerState::new(eid, username, outbound);

        let visible = Self::all_coords_in_radius(spawn_chunk, VIEW_RADIUS);
        for coord in &visible {
            if let Some(chunk) = self.loaded.get_chunk(coord.0, coord.1) {
                player.send(chunk.pre_chunk_packet(true));
                player.send(chunk.to_map_chunk_packet());
            } else {
                tracing::warn!(cx = coord.0, cz = coord.1, "no chunk at initial visible window position");
            }
        }
        player.visible_chunks = visible.into_iter().collect();

        player.send(ServerPacket::WindowItems { window_id: 0, items: player.inventory.to_vec() });

        let y = spawn_y as f64 + 2.0;
        player.x = spawn_x as f64;
        player.y = y;
        player.z = spawn_z as f64;
        player.stance = y;

        player.send(ServerPacket::SpawnPosition { x: spawn_x, y: spawn_y, z: spawn_z });

        if let Some(chunk) = self.loaded.get_chunk_mut(spawn_chunk.0, spawn_chunk.1) {
            let spawn_packet = ServerPacket::NamedEntitySpawn {
                eid,
                name: player.username.clone(),
                x: absolute_int(player.x),
                y: absolute_int(player.y),
                z: absolute_int(player.z),
                yaw: 0,
                pitch: 0,
                held_item: 0,
            };
            for &other in &chunk.occupants {
                if let Some(p) = self.players.get(&other) {
                    p.send(spawn_packet.clone());
                }
            }
            chunk.occupants.insert(eid);
        }
        player.chunk = Some(spawn_chunk);

        player.send(ServerPacket::PlayerPosLook {
            x: player.x,
            y: player.y,
            stance: player.stance,
            z: player.z,
            yaw: player.yaw,
            pitch: player.pitch,
            on_ground: player.on_ground,
        });

        self.players.insert(eid, player);

        LoginOutcome { eid, seed: self.loaded.seed }
    }

    fn disconnect(&mut self, eid: EntityId) {
        let Some(player) = self.players.remove(&eid) else { return };
        if let Some((cx, cz)) = player.chunk {
            if let Some(chunk) = self.loaded.get_chunk_mut(cx, cz) {
                chunk.occupants.remove(&eid);
                for &other in &chunk.occupants {
                    if let Some(p) = self.players.get(&other) {
                        p.send(ServerPacket::EntityDestroy { eid });
                    }
                }
            }
        }
    }

    fn handle_packet(&mut self, eid: EntityId, packet: ClientPacket) {
        match packet {
            ClientPacket::KeepAlive => {
                if let Some(player) = self.players.get(&eid) {
                    player.send(ServerPacket::KeepAlive);
                }
            }
            ClientPacket::PlayerOnGround { on_ground } => {
                if let Some(player) = self.players.get_mut(&eid) {
                    player.on_ground = on_ground;
                }
            }
            ClientPacket::PlayerLook { yaw, pitch, on_ground } => {
                self.apply_look(eid, yaw, pitch, on_ground);
            }
            ClientPacket::PlayerPosition { x, y, stance, z, on_ground } => {
                self.apply_move(eid, x, y, stance, z, None, Some(on_ground));
            }
            ClientPacket::PlayerPosLook { x, y, stance, z, yaw, pitch, on_ground } => {
                self.apply_move(eid, x, y, stance, z, Some((yaw, pitch)), Some(on_ground));
            }
            ClientPacket::ChatMessage { message } => {
                self.broadcast_chat(eid, &message);
            }
            ClientPacket::PlayerDigging { status, x, y, z, face } => {
                tracing::debug!(eid, status, x, y, z, face, "dig packet parsed, no world mutation");
            }
            ClientPacket::EntityAnimation { animation, .. } => {
                self.relay_to_chunk(eid, ServerPacket::EntityAnimation { eid, animation });
            }
            ClientPacket::BlockChange { x, y, z, block_id, meta } => {
                tracing::debug!(eid, x, y = y as i32, z, block_id, meta, "block change parsed, not applied");
            }
            ClientPacket::Handshake { .. } | ClientPacket::LoginRequest { .. } => {
                // Only arrive pre-login; the connection task handles these
                // itself and never forwards them here.
            }
            ClientPacket::HoldItem { .. } => {
                // `SessionState::PlayGame.accepts()` excludes 0x10, so the
                // dispatcher kicks before this ever reaches the world task.
                unreachable!("HoldItem is rejected by the session state table before dispatch")
            }
        }
    }

    fn apply_look(&mut self, eid: EntityId, yaw: f32, pitch: f32, on_ground: bool) {
        let Some(player) = self.players.get_mut(&eid) else { return };
        player.last_dh = yaw - player.yaw;
        player.last_dp = pitch - player.pitch;
        player.yaw = yaw;
        player.pitch = pitch;
        player.on_ground = on_ground;
        let chunk = player.chunk;
        let packet = ServerPacket::EntityLook { eid, yaw: yaw as i8, pitch: pitch as i8 };
        if let Some((cx, cz)) = chunk {
            self.broadcast_to_chunk_except(cx, cz, eid, packet);
        }
    }

    /// The shared move path for `PlayerPosition`/`PlayerPosLook`. Mirrors
    /// `Player.move()`: recompute deltas, update fields, reconcile the
    /// visible-chunk window on a chunk transition, then (per the inverted
    /// open question #6) unconditionally broadcast to peers — both
    /// callers are client-originated packets, and there is no
    /// server-initiated move path that would need to suppress the echo.
    fn apply_move(
        &mut self,
        eid: EntityId,
        x: f64,
        y: f64,
        stance: f64,
        z: f64,
        look: Option<(f32, f32)>,
        on_ground: Option<bool>,
    ) {
        let Some(player) = self.players.get_mut(&eid) else { return };

        let dx = x - player.x;
        let dy = y - player.y;
        let dz = z - player.z;
        player.last_dx = dx;
        player.last_dy = dy;
        player.last_dz = dz;

        if let Some((yaw, pitch)) = look {
            player.last_dh = yaw - player.yaw;
            player.last_dp = pitch - player.pitch;
            player.yaw = yaw;
            player.pitch = pitch;
        }
        player.stance = stance;
        if let Some(g) = on_ground {
            player.on_ground = g;
        }

        // Preserved source bug (`spec.md` §9 item 1): raw, unscaled,
        // unsigned comparison — a large negative delta is wrongly
        // classified as "small", see `relative_move_threshold_bug_is_preserved`.
        let relative = dx < 4.0 && dy < 4.0 && dz < 4.0;

        player.x = x;
        player.y = y;
        player.z = z;

        let new_chunk = ((x.floor() as i32) >> 4, (z.floor() as i32) >> 4);
        if self.loaded.get_chunk(new_chunk.0, new_chunk.1).is_none() {
            tracing::warn!(cx = new_chunk.0, cz = new_chunk.1, "move into an unloaded chunk, ignoring");
            return;
        }

        let old_chunk = self.players.get(&eid).and_then(|p| p.chunk);
        if old_chunk != Some(new_chunk) {
            self.transition_chunk(eid, old_chunk, new_chunk);
        }

        let Some(player) = self.players.get(&eid) else { return };
        player.send(ServerPacket::PlayerPosLook {
            x: player.x,
            y: player.y,
            stance: player.stance,
            z: player.z,
            yaw: player.yaw,
            pitch: player.pitch,
            on_ground: player.on_ground,
        });

        let (dx, dy, dz, yaw_i, pitch_i) = (
            player.last_dx,
            player.last_dy,
            player.last_dz,
            player.yaw as i8,
            player.pitch as i8,
        );
        let move_packet = if relative {
            ServerPacket::EntityRelativePosLook {
                eid,
                dx: absolute_int(dx) as i8,
                dy: absolute_int(dy) as i8,
                dz: absolute_int(dz) as i8,
                yaw: yaw_i,
                pitch: pitch_i,
            }
        } else {
            ServerPacket::EntityMove {
                eid,
                x: absolute_int(player.x),
                y: absolute_int(player.y),
                z: absolute_int(player.z),
                yaw: yaw_i,
                pitch: pitch_i,
            }
        };
        if let Some((cx, cz)) = player.chunk {
            self.broadcast_to_chunk_except(cx, cz, eid, move_packet);
        }
    }

    /// Reconcile visible-chunk window, occupant lists, and spawn/destroy
    /// broadcasts across a chunk boundary (open question #5: implemented
    /// as correct reconciliation rather than left as a silent gap).
    fn transition_chunk(&mut self, eid: EntityId, old_chunk: Option<(i32, i32)>, new_chunk: (i32, i32)) {
        let Some(player) = self.players.get_mut(&eid) else { return };
        let old_visible = std::mem::take(&mut player.visible_chunks);

        let candidate: HashSet<(i32, i32)> = if let Some(old) = old_chunk {
            let (dcx, dcz) = (new_chunk.0 - old.0, new_chunk.1 - old.1);
            old_visible.iter().map(|(x, z)| (x + dcx, z + dcz)).collect()
        } else {
            Self::all_coords_in_radius(new_chunk, VIEW_RADIUS).into_iter().collect()
        };

        for coord in old_visible.difference(&candidate) {
            if let Some(chunk) = self.loaded.get_chunk(coord.0, coord.1) {
                if !chunk.persistent {
                    player.send(chunk.pre_chunk_packet(false));
                }
            }
        }
        for coord in candidate.difference(&old_visible) {
            if let Some(chunk) = self.loaded.get_chunk(coord.0, coord.1) {
                player.send(chunk.pre_chunk_packet(true));
                player.send(chunk.to_map_chunk_packet());
            }
        }

        let player_name = player.username.clone();
        let player_pos = (player.x, player.y, player.z);
        player.visible_chunks = candidate;

        if let Some((ocx, ocz)) = old_chunk {
            if let Some(chunk) = self.loaded.get_chunk_mut(ocx, ocz) {
                chunk.occupants.remove(&eid);
            }
        }
        let new_occupants_before: Vec<EntityId> = self
            .loaded
            .get_chunk(new_chunk.0, new_chunk.1)
            .map(|c| c.occupants.iter().copied().collect())
            .unwrap_or_default();
        if let Some(chunk) = self.loaded.get_chunk_mut(new_chunk.0, new_chunk.1) {
            chunk.occupants.insert(eid);
        }

        let old_occupants: Vec<EntityId> = old_chunk
            .and_then(|(ocx, ocz)| self.loaded.get_chunk(ocx, ocz))
            .map(|c| c.occupants.iter().copied().collect())
            .unwrap_or_default();

        for other in old_occupants {
            if other != eid && !new_occupants_before.contains(&other) {
                if let Some(p) = self.players.get(&other) {
                    p.send(ServerPacket::EntityDestroy { eid });
                }
            }
        }
        let spawn_packet = ServerPacket::NamedEntitySpawn {
            eid,
            name: player_name,
            x: absolute_int(player_pos.0),
            y: absolute_int(player_pos.1),
            z: absolute_int(player_pos.2),
            yaw: 0,
            pitch: 0,
            held_item: 0,
        };
        for other in new_occupants_before {
            if other != eid {
                if let Some(p) = self.players.get(&other) {
                    p.send(spawn_packet.clone());
                }
            }
        }

        if let Some(player) = self.players.get_mut(&eid) {
            player.chunk = Some(new_chunk);
        }
    }

    fn broadcast_to_chunk_except(&self, cx: i32, cz: i32, except: EntityId, packet: ServerPacket) {
        let Some(chunk) = self.loaded.get_chunk(cx, cz) else { return };
        for &other in &chunk.occupants {
            if other != except {
                if let Some(p) = self.players.get(&other) {
                    p.send(packet.clone());
                }
            }
        }
    }

    fn relay_to_chunk(&self, eid: EntityId, packet: ServerPacket) {
        let Some(player) = self.players.get(&eid) else { return };
        let Some((cx, cz)) = player.chunk else { return };
        self.broadcast_to_chunk_except(cx, cz, eid, packet)
    }

    /// The source only ever echoes chat back to its sender
    /// (`ChatManager.handleChatMessage`); `spec.md` §1 describes the
    /// server as relaying chat *between* clients, so this broadcasts to
    /// everyone connected, formatted `<username> message` — see DESIGN.md.
    fn broadcast_chat(&self, eid: EntityId, message: &str) {
        let Some(sender) = self.players.get(&eid) else { return };
        let formatted = format!("<{}> {}", sender.username, message);
        for player in self.players.values() {
            player.send(ServerPacket::ChatMessage { message: formatted.clone() });
        }
    }

    fn tick(&mut self) {
        self.time += TICK_TIME_STEP;
        if self.time > TICK_TIME_WRAP {
            self.time = 0;
        }
        for player in self.players.values() {
            player.send(ServerPacket::TimeUpdate { time: self.time });
        }
    }
}

fn outbound_send(sender: &UnboundedSender<ServerPacket>, packet: ServerPacket) {
    let _ = sender.send(packet);
}

/// Run the single world-owning task: a `tokio::select!` between the
/// inbound command channel and the 1-second tick interval, matching
/// `spec.md` §5's cooperative-scheduler model.
pub async fn run(loaded: LoadedWorld, mut commands: UnboundedReceiver<WorldCommand>) {
    let mut state = WorldState {
        loaded,
        players: std::collections::HashMap::new(),
        next_eid: FIRST_ENTITY_ID,
        time: 0,
    };

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.tick().await; // the first tick fires immediately; skip it

    loop {
        tokio::select! {
            cmd = commands.recv() => {
                match cmd {
                    Some(WorldCommand::Login { username, outbound, reply }) => {
                        let outcome = state.login(username, outbound);
                        let _ = reply.send(outcome);
                    }
                    Some(WorldCommand::Packet { eid, packet }) => state.handle_packet(eid, packet),
                    Some(WorldCommand::Disconnect { eid }) => state.disconnect(eid),
                    None => break,
                }
            }
            _ = interval.tick() => {
                state.tick();
            }
        }
    }
}
