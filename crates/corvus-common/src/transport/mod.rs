//! Corvus Transport Layer
//!
//! Framed TCP connections for the binary envelope protocol.
//!
//! Every connection owns a reader task that decodes inbound envelopes and
//! hands them to an [`InboundHandler`]; the handler seam is how the client
//! runtime plugs its response correlation table into the transport without
//! the transport knowing about it.

pub mod codec;
pub mod tcp;

pub use codec::{decode_envelope, encode_envelope};
pub use tcp::{Connection, InboundHandler};
