use crate::codec::CodecError;
use crate::packets::{client_may_send, decode_client, min_size, ClientPacket, FrameError};
use bytes::{Buf, BytesMut};

#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("opcode not in the catalog or wrong direction")]
    BadOpcode,
    #[error("malformed packet body: {0}")]
    Malformed(#[from] CodecError),
}

/// Pull the next complete client frame off `buf`, if one is present.
///
/// Implements `spec.md` §4.3's framing algorithm: peek the opcode, look up
/// its minimum size, wait for more data if the buffer is short (whether
/// that shortfall is the fixed prefix or a variable-length string trailing
/// off the end — both surface as `Ok(None)`, matching the `ShortRead`
/// disposition of "wait, not an error"). On success, advances `buf` past
/// the consumed bytes.
pub fn next_client_frame(buf: &mut BytesMut) -> Result<Option<ClientPacket>, FramingError> {
    if buf.is_empty() {
        return Ok(None);
    }

    let opcode = buf[0];
    if !client_may_send(opcode) {
        return Err(FramingError::BadOpcode);
    }

    let fixed = min_size(opcode).expect("client_may_send implies a min_size entry");
    if buf.len() < 1 + fixed {
        return Ok(None);
    }

    match decode_client(opcode, &buf[1..]) {
        Ok((packet, consumed)) => {
            buf.advance(1 + consumed);
            Ok(Some(packet))
        }
        Err(FrameError::Incomplete) => Ok(None),
        Err(FrameError::Codec(e)) => Err(FramingError::Malformed(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn partial_fixed_prefix_waits() {
        let mut buf = BytesMut::new();
        buf.put_u8(crate::packets::OP_PLAYER_ON_GROUND);
        // missing the trailing i8
        assert!(next_client_frame(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 1, "frame with opcode but short payload must not be consumed");
    }

    #[test]
    fn complete_frame_is_consumed_and_leftover_kept() {
        let mut buf = BytesMut::new();
        buf.put_u8(crate::packets::OP_PLAYER_ON_GROUND);
        buf.put_i8(1);
        buf.put_u8(crate::packets::OP_KEEP_ALIVE); // start of a second frame
        let packet = next_client_frame(&mut buf).unwrap().unwrap();
        assert_eq!(packet, ClientPacket::PlayerOnGround { on_ground: true });
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn downstream_only_opcode_is_bad_opcode() {
        let mut buf = BytesMut::new();
        buf.put_u8(crate::packets::OP_TIME_UPDATE);
        buf.put_i64(0);
        assert!(matches!(next_client_frame(&mut buf), Err(FramingError::BadOpcode)));
    }

    #[test]
    fn opcode_outside_catalog_is_bad_opcode() {
        let mut buf = BytesMut::new();
        buf.put_u8(0x99);
        assert!(matches!(next_client_frame(&mut buf), Err(FramingError::BadOpcode)));
    }
}
