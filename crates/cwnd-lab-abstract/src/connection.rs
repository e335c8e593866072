use crate::context::SimContext;
use crate::error::ConnectionError;
use bytes::Bytes;
use std::net::SocketAddrV4;

/// A one-way transport endpoint an application sends payloads over.
///
/// Transmission outcomes (loss, queueing) are the connection's concern;
/// callers get an error only for lifecycle misuse, never for in-network
/// failures, and perform no retries.
pub trait Connection {
    /// Binds the connection to a local endpoint.
    fn bind(&mut self) -> Result<(), ConnectionError>;

    /// Associates the connection with its destination.
    fn connect_to(
        &mut self,
        ctx: &mut dyn SimContext,
        peer: SocketAddrV4,
    ) -> Result<(), ConnectionError>;

    /// Hands one payload to the transport.
    fn send(&mut self, ctx: &mut dyn SimContext, payload: Bytes) -> Result<(), ConnectionError>;

    /// Closes the connection. Closing twice is a no-op.
    fn close(&mut self, ctx: &mut dyn SimContext);
}
