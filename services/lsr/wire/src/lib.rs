//! Wire types and framing for lsr link-state routing.
//!
//! This crate defines the identifiers and records exchanged between routing
//! nodes, the link-state advertisement carried in control packets, and the
//! framed encoding that lets a receiver tell data payloads from control
//! payloads.
//!
//! ## Wire Format
//!
//! ```text
//! +----------------------+----------------------------+
//! | u8 frame_type        | 1 = DATA, 2 = CONTROL      |
//! +----------------------+----------------------------+
//! | u32 body_len         | length of the CBOR body    |
//! +----------------------+----------------------------+
//! | u32 body_crc32       | checksum of the CBOR body  |
//! +----------------------+----------------------------+
//! | body                 | CBOR DataPacket or         |
//! |                      | Advertisement              |
//! +----------------------+----------------------------+
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod frame;
pub mod packet;
pub mod topology;

// Re-export main types
pub use error::WireError;
pub use frame::{decode, encode, FrameType, FRAME_HEADER_SIZE, MAX_BODY_SIZE};
pub use packet::{DataPacket, Packet};
pub use topology::{Adjacency, Advertisement, Cost, LinkChange, LinkRecord, LocalPort, NodeId};
