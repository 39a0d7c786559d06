use mc8_types::{EntityId, ItemStack, INVENTORY_SIZE};
use std::collections::HashSet;
use tokio::sync::mpsc::UnboundedSender;

use mc8_protocol::ServerPacket;

/// Authoritative player state, owned exclusively by the world task (see
/// `spec.md` §5 — no lock is needed because nothing else ever touches
/// this). `outbound` is the "weak reference" the world's session list
/// holds for broadcast: sending on a closed channel is simply ignored,
/// the connection task's own teardown is what actually removes the entry.
pub struct PlayerState {
    pub eid: EntityId,
    pub username: String,
    pub outbound: UnboundedSender<ServerPacket>,

    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub stance: f64,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,

    /// Last-computed deltas, used to decide relative-vs-absolute movement
    /// broadcast shape and to build `EntityRelativePosLook` payloads.
    pub last_dx: f64,
    pub last_dy: f64,
    pub last_dz: f64,
    pub last_dh: f32,
    pub last_dp: f32,

    pub health: i32,
    pub inventory: [Option<ItemStack>; INVENTORY_SIZE],

    pub chunk: Option<(i32, i32)>,
    pub visible_chunks: HashSet<(i32, i32)>,
}

impl PlayerState {
    pub fn new(eid: EntityId, username: String, outbound: UnboundedSender<ServerPacket>) -> Self {
        Self {
            eid,
            username,
            outbound,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            stance: 0.0,
            yaw: 0.0,
            pitch: 0.0,
            on_ground: false,
            last_dx: 0.0,
            last_dy: 0.0,
            last_dz: 0.0,
            last_dh: 0.0,
            last_dp: 0.0,
            health: 20,
            inventory: [None; INVENTORY_SIZE],
            chunk: None,
            visible_chunks: HashSet::new(),
        }
    }

    pub fn send(&self, packet: ServerPacket) {
        let _ = self.outbound.send(packet);
    }
}
