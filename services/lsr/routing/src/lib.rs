//! Forwarding table, next-hop resolution, and routing decisions for lsr.
//!
//! The forwarding table is a pure function of the link-state database: it is
//! rebuilt from scratch by [`ForwardingTable::compute`] whenever the database
//! changes, and consulted by [`ForwardingTable::decide`] for every data packet.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod router;
pub mod table;

pub use router::*;
pub use table::*;
