//! Link-state database, per-origin sequence tracking, and shortest path
//! computation for lsr.
//!
//! The [`TopologyStore`] owns this node's view of every origin's advertised
//! adjacency and decides whether an inbound advertisement is fresh. The
//! [`spf`] module turns a snapshot of that view into per-destination routes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod link_state;
pub mod spf;

pub use error::TopologyError;
pub use link_state::*;
pub use spf::compute_routes;
