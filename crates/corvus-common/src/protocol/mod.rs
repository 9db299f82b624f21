//! Corvus Protocol Layer
//!
//! Wire envelope, response codes, sequence-number generation, and the error
//! taxonomy shared across the runtime.

pub mod envelope;
pub mod error;
pub mod sequence;

pub use envelope::{CommandKind, Envelope, ResponseCode, PING, PONG};
pub use error::{Result, RpcError};
pub use sequence::next_id;
