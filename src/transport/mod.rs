//! Streaming transport seam.
//!
//! The tracker never talks to a socket directly; it consumes these traits.
//! `WsTransport` is the production implementation, `SimulatedTransport` is a
//! script-driven one for tests.

mod simulated;
mod ws;

pub use simulated::{SimulatedController, SimulatedTransport};
pub use ws::WsTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Error surfaced by a transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open stream: {0}")]
    Connect(String),
    #[error("stream error: {0}")]
    Stream(String),
    #[error("stream is closed")]
    Closed,
}

/// Opens streaming connections keyed by an endpoint locator.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Open a connection to `locator`. Resolves once the stream is open.
    async fn connect(&self, locator: &str) -> Result<Box<dyn StreamConnection>, TransportError>;
}

/// One live bidirectional text-message stream.
///
/// Inbound messages are delivered in send order. `recv` returning `None` is
/// the terminal close; an `Err` item is a transport error and the stream may
/// still deliver a close afterwards.
#[async_trait]
pub trait StreamConnection: Send {
    /// Next inbound text message, or `None` once the stream has closed.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Send one outbound text message.
    async fn send(&mut self, text: &str) -> Result<(), TransportError>;

    /// Whether the stream is currently open, queryable at send time.
    fn is_open(&self) -> bool;

    /// Close the stream. Safe to call more than once.
    async fn close(&mut self);
}
