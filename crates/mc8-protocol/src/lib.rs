pub mod codec;
pub mod framing;
pub mod packets;
pub mod state;

pub use codec::*;
pub use framing::*;
pub use packets::*;
pub use state::*;
