//! Outbound transport capability.

use bytes::Bytes;
use lsr_wire::LocalPort;

/// Sends opaque payloads out of local ports.
///
/// Delivery is fire-and-forget: the node never learns whether a payload
/// arrived.
pub trait Transport {
    /// Send `payload` out of `port`
    fn send(&mut self, port: LocalPort, payload: Bytes);
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, port: LocalPort, payload: Bytes) {
        (**self).send(port, payload)
    }
}

/// Transport that queues outbound payloads for the caller to drain
#[derive(Debug, Default)]
pub struct QueueTransport {
    outbound: Vec<(LocalPort, Bytes)>,
}

impl QueueTransport {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads sent so far, oldest first
    pub fn outbound(&self) -> &[(LocalPort, Bytes)] {
        &self.outbound
    }

    /// Take every queued payload
    pub fn drain(&mut self) -> Vec<(LocalPort, Bytes)> {
        std::mem::take(&mut self.outbound)
    }
}

impl Transport for QueueTransport {
    fn send(&mut self, port: LocalPort, payload: Bytes) {
        self.outbound.push((port, payload));
    }
}
