use mc8_protocol::{MSG_BAD_CREDENTIALS, MSG_BAD_OPCODE, MSG_BAD_PROTOCOL, MSG_BAD_STATE};

/// The `spec.md` §7 error-kind table, collapsed to just the kinds that end
/// in a kick (the others — `ShortRead`, `WorldMissing`, `MalformedChunk`,
/// `MissingChunk`, `TransportLost` — are handled inline where they occur
/// rather than through this type).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{}", MSG_BAD_OPCODE)]
    BadOpcode,
    #[error("{}", MSG_BAD_STATE)]
    BadState,
    #[error("{}", MSG_BAD_PROTOCOL)]
    BadProtocol,
    #[error("{}", MSG_BAD_CREDENTIALS)]
    BadCredentials,
}

impl SessionError {
    pub fn kick_reason(&self) -> &'static str {
        match self {
            SessionError::BadOpcode => MSG_BAD_OPCODE,
            SessionError::BadState => MSG_BAD_STATE,
            SessionError::BadProtocol => MSG_BAD_PROTOCOL,
            SessionError::BadCredentials => MSG_BAD_CREDENTIALS,
        }
    }
}
