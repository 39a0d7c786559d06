use crate::codec::*;
use bytes::{BufMut, BytesMut};
use mc8_types::ItemStack;

pub const OP_KEEP_ALIVE: u8 = 0x00;
pub const OP_LOGIN_REQUEST: u8 = 0x01;
pub const OP_HANDSHAKE: u8 = 0x02;
pub const OP_CHAT_MESSAGE: u8 = 0x03;
pub const OP_TIME_UPDATE: u8 = 0x04;
pub const OP_SPAWN_POSITION: u8 = 0x06;
pub const OP_PLAYER_ON_GROUND: u8 = 0x0A;
pub const OP_PLAYER_POSITION: u8 = 0x0B;
pub const OP_PLAYER_LOOK: u8 = 0x0C;
pub const OP_PLAYER_POS_LOOK: u8 = 0x0D;
pub const OP_PLAYER_DIGGING: u8 = 0x0E;
pub const OP_HOLD_ITEM: u8 = 0x10;
pub const OP_ENTITY_ANIMATION: u8 = 0x12;
pub const OP_NAMED_ENTITY_SPAWN: u8 = 0x14;
pub const OP_ENTITY_DESTROY: u8 = 0x1D;
pub const OP_ENTITY_STILL: u8 = 0x1E;
pub const OP_ENTITY_RELATIVE_POS: u8 = 0x1F;
pub const OP_ENTITY_LOOK: u8 = 0x20;
pub const OP_ENTITY_RELATIVE_POS_LOOK: u8 = 0x21;
pub const OP_ENTITY_MOVE: u8 = 0x22;
pub const OP_PRE_CHUNK: u8 = 0x32;
pub const OP_MAP_CHUNK: u8 = 0x33;
pub const OP_BLOCK_CHANGE: u8 = 0x35;
pub const OP_SET_SLOT: u8 = 0x67;
pub const OP_WINDOW_ITEMS: u8 = 0x68;
pub const OP_KICK: u8 = 0xFF;

/// Exact kick reason strings from `spec.md` §7 — note `BadOpcode` says "was
/// sent" while `BadState` says just "sent"; these are two different
/// strings in the source, not a typo, and are preserved as such.
pub const MSG_BAD_OPCODE: &str = "Invalid packet was sent!";
pub const MSG_BAD_STATE: &str = "Invalid packet sent!";
pub const MSG_BAD_PROTOCOL: &str = "Invalid protocol version!";
pub const MSG_BAD_CREDENTIALS: &str = "The server rejected your login request.";

pub const PROTOCOL_VERSION: i32 = 8;

/// Whether the client is permitted to send this opcode at all (catalog
/// membership + direction check — `BadOpcode` covers both "not in the
/// catalog" and "wrong direction" with the same kick message).
pub fn client_may_send(opcode: u8) -> bool {
    matches!(
        opcode,
        OP_KEEP_ALIVE
            | OP_LOGIN_REQUEST
            | OP_HANDSHAKE
            | OP_CHAT_MESSAGE
            | OP_PLAYER_ON_GROUND
            | OP_PLAYER_POSITION
            | OP_PLAYER_LOOK
            | OP_PLAYER_POS_LOOK
            | OP_PLAYER_DIGGING
            | OP_HOLD_ITEM
            | OP_ENTITY_ANIMATION
            | OP_BLOCK_CHANGE
    )
}

/// Fixed-size portion of each upstream opcode's payload, in bytes,
/// excluding the opcode byte and excluding variable-length strings/arrays
/// (`spec.md` §4.1's `minSize`). Packets the client never sends have no
/// entry; `client_may_send` is checked first.
pub fn min_size(opcode: u8) -> Option<usize> {
    Some(match opcode {
        OP_KEEP_ALIVE => 0,
        OP_LOGIN_REQUEST => 4, // i32 protoVer, then two variable strings
        OP_HANDSHAKE => 0,     // one variable string
        OP_CHAT_MESSAGE => 0,  // one variable string
        OP_PLAYER_ON_GROUND => 1,
        OP_PLAYER_POSITION => 8 + 8 + 8 + 8 + 1,
        OP_PLAYER_LOOK => 4 + 4 + 1,
        OP_PLAYER_POS_LOOK => 8 + 8 + 8 + 8 + 4 + 4 + 1,
        OP_PLAYER_DIGGING => 1 + 4 + 1 + 4 + 1,
        OP_HOLD_ITEM => 2,
        OP_ENTITY_ANIMATION => 4 + 1,
        OP_BLOCK_CHANGE => 4 + 1 + 4 + 1 + 1,
        _ => return None,
    })
}

/// A decoded inventory slot: `None` is the empty-slot sentinel (wire
/// `itemId == -1`, `count`/`uses` omitted).
fn read_slot_item(buf: &mut &[u8]) -> CodecResult<Option<ItemStack>> {
    let item_id = read_i16(buf)? as i32;
    if item_id == -1 {
        return Ok(None);
    }
    let count = read_i8(buf)?;
    let uses = read_i16(buf)?;
    Ok(Some(ItemStack::new(item_id, count, uses)))
}

fn write_slot_item(buf: &mut BytesMut, item: Option<ItemStack>) {
    match item {
        None => buf.put_i16(-1),
        Some(item) => {
            buf.put_i16(item.item_id as i16);
            buf.put_i8(item.count);
            buf.put_i16(item.uses);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientPacket {
    KeepAlive,
    Handshake { username: String },
    LoginRequest { protocol_version: i32, username: String, password: String },
    ChatMessage { message: String },
    PlayerOnGround { on_ground: bool },
    PlayerPosition { x: f64, y: f64, stance: f64, z: f64, on_ground: bool },
    PlayerLook { yaw: f32, pitch: f32, on_ground: bool },
    PlayerPosLook { x: f64, y: f64, stance: f64, z: f64, yaw: f32, pitch: f32, on_ground: bool },
    PlayerDigging { status: i8, x: i32, y: i8, z: i32, face: i8 },
    HoldItem { slot: i16 },
    EntityAnimation { eid: i32, animation: i8 },
    BlockChange { x: i32, y: i8, z: i32, block_id: i8, meta: i8 },
}

#[derive(Debug)]
pub enum FrameError {
    /// Not an error — the buffer doesn't yet hold a full frame.
    Incomplete,
    Codec(CodecError),
}

impl From<CodecError> for FrameError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::NotEnoughData => FrameError::Incomplete,
            other => FrameError::Codec(other),
        }
    }
}

/// Decode one client packet from `payload` (the bytes immediately
/// following the opcode byte). Returns the packet and how many bytes of
/// `payload` it consumed; the caller advances its receive buffer by
/// `1 + consumed`. Returns `FrameError::Incomplete` (not an error — see
/// `spec.md` §7 `ShortRead`) if `payload` doesn't yet hold a full frame,
/// including the case where a fixed prefix is present but a
/// variable-length string trails off the end of the buffer.
pub fn decode_client(opcode: u8, payload: &[u8]) -> Result<(ClientPacket, usize), FrameError> {
    let mut buf = payload;
    let packet = match opcode {
        OP_KEEP_ALIVE => ClientPacket::KeepAlive,
        OP_HANDSHAKE => ClientPacket::Handshake { username: read_string(&mut buf)? },
        OP_LOGIN_REQUEST => {
            let protocol_version = read_i32(&mut buf)?;
            let username = read_string(&mut buf)?;
            let password = read_string(&mut buf)?;
            ClientPacket::LoginRequest { protocol_version, username, password }
        }
        OP_CHAT_MESSAGE => ClientPacket::ChatMessage { message: read_string(&mut buf)? },
        OP_PLAYER_ON_GROUND => ClientPacket::PlayerOnGround { on_ground: read_i8(&mut buf)? != 0 },
        OP_PLAYER_POSITION => {
            let x = read_f64(&mut buf)?;
            let y = read_f64(&mut buf)?;
            let stance = read_f64(&mut buf)?;
            let z = read_f64(&mut buf)?;
            let on_ground = read_i8(&mut buf)? != 0;
            ClientPacket::PlayerPosition { x, y, stance, z, on_ground }
        }
        OP_PLAYER_LOOK => {
            let yaw = read_f32(&mut buf)?;
            let pitch = read_f32(&mut buf)?;
            let on_ground = read_i8(&mut buf)? != 0;
            ClientPacket::PlayerLook { yaw, pitch, on_ground }
        }
        OP_PLAYER_POS_LOOK => {
            let x = read_f64(&mut buf)?;
            let y = read_f64(&mut buf)?;
            let stance = read_f64(&mut buf)?;
            let z = read_f64(&mut buf)?;
            let yaw = read_f32(&mut buf)?;
            let pitch = read_f32(&mut buf)?;
            let on_ground = read_i8(&mut buf)? != 0;
            ClientPacket::PlayerPosLook { x, y, stance, z, yaw, pitch, on_ground }
        }
        OP_PLAYER_DIGGING => {
            let status = read_i8(&mut buf)?;
            let x = read_i32(&mut buf)?;
            let y = read_i8(&mut buf)?;
            let z = read_i32(&mut buf)?;
            let face = read_i8(&mut buf)?;
            ClientPacket::PlayerDigging { status, x, y, z, face }
        }
        OP_HOLD_ITEM => ClientPacket::HoldItem { slot: read_i16(&mut buf)? },
        OP_ENTITY_ANIMATION => {
            let eid = read_i32(&mut buf)?;
            let animation = read_i8(&mut buf)?;
            ClientPacket::EntityAnimation { eid, animation }
        }
        OP_BLOCK_CHANGE => {
            let x = read_i32(&mut buf)?;
            let y = read_i8(&mut buf)?;
            let z = read_i32(&mut buf)?;
            let block_id = read_i8(&mut buf)?;
            let meta = read_i8(&mut buf)?;
            ClientPacket::BlockChange { x, y, z, block_id, meta }
        }
        _ => return Err(FrameError::Codec(CodecError::UnknownOpcode(opcode))),
    };
    let consumed = payload.len() - buf.len();
    Ok((packet, consumed))
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerPacket {
    KeepAlive,
    Handshake { connection_hash: String },
    LoginRequest { eid: i32, seed: i64, dimension: i8 },
    ChatMessage { message: String },
    TimeUpdate { time: i64 },
    SpawnPosition { x: i32, y: i32, z: i32 },
    PlayerPosLook { x: f64, y: f64, stance: f64, z: f64, yaw: f32, pitch: f32, on_ground: bool },
    NamedEntitySpawn { eid: i32, name: String, x: i32, y: i32, z: i32, yaw: i8, pitch: i8, held_item: i16 },
    EntityDestroy { eid: i32 },
    EntityStill { eid: i32 },
    EntityRelativePos { eid: i32, dx: i8, dy: i8, dz: i8 },
    EntityLook { eid: i32, yaw: i8, pitch: i8 },
    EntityRelativePosLook { eid: i32, dx: i8, dy: i8, dz: i8, yaw: i8, pitch: i8 },
    EntityMove { eid: i32, x: i32, y: i32, z: i32, yaw: i8, pitch: i8 },
    EntityAnimation { eid: i32, animation: i8 },
    PreChunk { cx: i32, cz: i32, load: bool },
    MapChunk { block_x: i32, block_y: i16, block_z: i32, size_x: i8, size_y: i8, size_z: i8, compressed: Vec<u8> },
    BlockChange { x: i32, y: i8, z: i32, block_id: i8, meta: i8 },
    SetSlot { window_id: i8, slot: i16, item: Option<ItemStack> },
    WindowItems { window_id: i8, items: Vec<Option<ItemStack>> },
    Kick { reason: String },
}

impl ServerPacket {
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            ServerPacket::KeepAlive => buf.put_u8(OP_KEEP_ALIVE),
            ServerPacket::Handshake { connection_hash } => {
                buf.put_u8(OP_HANDSHAKE);
                write_string(buf, connection_hash);
            }
            ServerPacket::LoginRequest { eid, seed, dimension } => {
                buf.put_u8(OP_LOGIN_REQUEST);
                buf.put_i32(*eid);
                write_string(buf, "");
                write_string(buf, "");
                buf.put_i64(*seed);
                buf.put_i8(*dimension);
            }
            ServerPacket::ChatMessage { message } => {
                buf.put_u8(OP_CHAT_MESSAGE);
                write_string(buf, message);
            }
            ServerPacket::TimeUpdate { time } => {
                buf.put_u8(OP_TIME_UPDATE);
                buf.put_i64(*time);
            }
            ServerPacket::SpawnPosition { x, y, z } => {
                buf.put_u8(OP_SPAWN_POSITION);
                buf.put_i32(*x);
                buf.put_i32(*y);
                buf.put_i32(*z);
            }
            ServerPacket::PlayerPosLook { x, y, stance, z, yaw, pitch, on_ground } => {
                buf.put_u8(OP_PLAYER_POS_LOOK);
                buf.put_f64(*x);
                buf.put_f64(*y);
                buf.put_f64(*stance);
                buf.put_f64(*z);
                buf.put_f32(*yaw);
                buf.put_f32(*pitch);
                buf.put_i8(*on_ground as i8);
            }
            ServerPacket::NamedEntitySpawn { eid, name, x, y, z, yaw, pitch, held_item } => {
                buf.put_u8(OP_NAMED_ENTITY_SPAWN);
                buf.put_i32(*eid);
                write_string(buf, name);
                buf.put_i32(*x);
                buf.put_i32(*y);
                buf.put_i32(*z);
                buf.put_i8(*yaw);
                buf.put_i8(*pitch);
                buf.put_i16(*held_item);
            }
            ServerPacket::EntityDestroy { eid } => {
                buf.put_u8(OP_ENTITY_DESTROY);
                buf.put_i32(*eid);
            }
            ServerPacket::EntityStill { eid } => {
                buf.put_u8(OP_ENTITY_STILL);
                buf.put_i32(*eid);
            }
            ServerPacket::EntityRelativePos { eid, dx, dy, dz } => {
                buf.put_u8(OP_ENTITY_RELATIVE_POS);
                buf.put_i32(*eid);
                buf.put_i8(*dx);
                buf.put_i8(*dy);
                buf.put_i8(*dz);
            }
            ServerPacket::EntityLook { eid, yaw, pitch } => {
                buf.put_u8(OP_ENTITY_LOOK);
                buf.put_i32(*eid);
                buf.put_i8(*yaw);
                buf.put_i8(*pitch);
            }
            ServerPacket::EntityRelativePosLook { eid, dx, dy, dz, yaw, pitch } => {
                buf.put_u8(OP_ENTITY_RELATIVE_POS_LOOK);
                buf.put_i32(*eid);
                buf.put_i8(*dx);
                buf.put_i8(*dy);
                buf.put_i8(*dz);
                buf.put_i8(*yaw);
                buf.put_i8(*pitch);
            }
            ServerPacket::EntityMove { eid, x, y, z, yaw, pitch } => {
                buf.put_u8(OP_ENTITY_MOVE);
                buf.put_i32(*eid);
                buf.put_i32(*x);
                buf.put_i32(*y);
                buf.put_i32(*z);
                buf.put_i8(*yaw);
                buf.put_i8(*pitch);
            }
            ServerPacket::EntityAnimation { eid, animation } => {
                buf.put_u8(OP_ENTITY_ANIMATION);
                buf.put_i32(*eid);
                buf.put_i8(*animation);
            }
            ServerPacket::PreChunk { cx, cz, load } => {
                buf.put_u8(OP_PRE_CHUNK);
                buf.put_i32(*cx);
                buf.put_i32(*cz);
                buf.put_i8(if *load { 1 } else { 0 });
            }
            ServerPacket::MapChunk { block_x, block_y, block_z, size_x, size_y, size_z, compressed } => {
                buf.put_u8(OP_MAP_CHUNK);
                buf.put_i32(*block_x);
                buf.put_i16(*block_y);
                buf.put_i32(*block_z);
                buf.put_i8(*size_x);
                buf.put_i8(*size_y);
                buf.put_i8(*size_z);
                buf.put_i32(compressed.len() as i32);
                buf.put_slice(compressed);
            }
            ServerPacket::BlockChange { x, y, z, block_id, meta } => {
                buf.put_u8(OP_BLOCK_CHANGE);
                buf.put_i32(*x);
                buf.put_i8(*y);
                buf.put_i32(*z);
                buf.put_i8(*block_id);
                buf.put_i8(*meta);
            }
            ServerPacket::SetSlot { window_id, slot, item } => {
                buf.put_u8(OP_SET_SLOT);
                buf.put_i8(*window_id);
                buf.put_i16(*slot);
                write_slot_item(buf, *item);
            }
            ServerPacket::WindowItems { window_id, items } => {
                buf.put_u8(OP_WINDOW_ITEMS);
                buf.put_i8(*window_id);
                buf.put_i16(items.len() as i16);
                for item in items {
                    write_slot_item(buf, *item);
                }
            }
            ServerPacket::Kick { reason } => {
                buf.put_u8(OP_KICK);
                write_string(buf, reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_full(opcode: u8, payload: &[u8]) -> ClientPacket {
        let (packet, consumed) = decode_client(opcode, payload).expect("decode");
        assert_eq!(consumed, payload.len(), "decoder left bytes unconsumed");
        packet
    }

    #[test]
    fn keep_alive_round_trip() {
        let mut buf = BytesMut::new();
        ServerPacket::KeepAlive.encode(&mut buf);
        assert_eq!(buf[0], OP_KEEP_ALIVE);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn handshake_up_round_trip() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "alice");
        let packet = decode_full(OP_HANDSHAKE, &buf);
        assert_eq!(packet, ClientPacket::Handshake { username: "alice".into() });
    }

    #[test]
    fn login_request_up_round_trip() {
        let mut buf = BytesMut::new();
        buf.put_i32(8);
        write_string(&mut buf, "alice");
        write_string(&mut buf, "");
        let packet = decode_full(OP_LOGIN_REQUEST, &buf);
        assert_eq!(
            packet,
            ClientPacket::LoginRequest {
                protocol_version: 8,
                username: "alice".into(),
                password: "".into(),
            }
        );
    }

    #[test]
    fn login_request_missing_trailing_string_is_incomplete() {
        let mut buf = BytesMut::new();
        buf.put_i32(8);
        write_string(&mut buf, "alice");
        // second string length byte present, content truncated
        buf.put_i16(5);
        buf.put_u8(b'h');
        let result = decode_client(OP_LOGIN_REQUEST, &buf);
        assert!(matches!(result, Err(FrameError::Incomplete)));
    }

    #[test]
    fn player_pos_look_field_order_matches_wire() {
        let mut buf = BytesMut::new();
        ServerPacket::PlayerPosLook {
            x: 1.0,
            y: 2.0,
            stance: 3.0,
            z: 4.0,
            yaw: 5.0,
            pitch: 6.0,
            on_ground: true,
        }
        .encode(&mut buf);
        // opcode, then x,y,stance,z as f64 in that order
        let mut body = &buf[1..];
        assert_eq!(read_f64(&mut body).unwrap(), 1.0); // x
        assert_eq!(read_f64(&mut body).unwrap(), 2.0); // y
        assert_eq!(read_f64(&mut body).unwrap(), 3.0); // stance
        assert_eq!(read_f64(&mut body).unwrap(), 4.0); // z
    }

    #[test]
    fn empty_inventory_slot_omits_tail() {
        let mut buf = BytesMut::new();
        write_slot_item(&mut buf, None);
        assert_eq!(buf.len(), 2); // just the i16 -1 sentinel
    }

    #[test]
    fn occupied_slot_round_trips() {
        let mut buf = BytesMut::new();
        let item = Some(ItemStack::new(5, 3, 0));
        write_slot_item(&mut buf, item);
        let frozen = buf.freeze();
        let mut slice = &frozen[..];
        assert_eq!(read_slot_item(&mut slice).unwrap(), item);
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        assert!(decode_client(0x99, &[]).is_err());
    }

    #[test]
    fn client_direction_catalog_excludes_server_only_opcodes() {
        assert!(!client_may_send(OP_TIME_UPDATE));
        assert!(!client_may_send(OP_NAMED_ENTITY_SPAWN));
        assert!(client_may_send(OP_PLAYER_POS_LOOK));
    }
}
