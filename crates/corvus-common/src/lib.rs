//! Corvus Common Types and Transport
//!
//! This crate provides the protocol definitions and TCP transport layer
//! shared by the corvus RPC client runtime.
//!
//! # Overview
//!
//! Corvus is a cluster-aware client runtime for a binary RPC protocol. This
//! crate contains the pieces every component agrees on:
//!
//! - **Protocol layer**: the wire [`Envelope`], command kinds, response
//!   codes, sequence-number generation, and the error taxonomy
//! - **Transport layer**: framed TCP connections with an inbound dispatch
//!   seam
//!
//! # Wire format
//!
//! Every message is one [`Envelope`] encoded with postcard and sent with a
//! 4-byte big-endian length prefix:
//!
//! ```text
//! [4-byte length] [postcard-encoded envelope]
//! ```
//!
//! The envelope `body` is opaque to this crate; only header fields (seq,
//! kind, command name, code) are ever inspected here.

pub mod node;
pub mod protocol;
pub mod transport;

pub use node::Node;
pub use protocol::envelope::{CommandKind, Envelope, ResponseCode, PING, PONG};
pub use protocol::error::{Result, RpcError};
pub use protocol::sequence::next_id;
pub use transport::tcp::{Connection, InboundHandler};
