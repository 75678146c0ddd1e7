//! Script-driven transport for tests.
//!
//! `SimulatedTransport::new()` returns the transport plus a controller that
//! injects frames, errors, and closes, and records everything sent outbound.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{StreamConnection, StreamTransport, TransportError};

type Frame = Result<String, TransportError>;

struct Link {
    id: u64,
    tx: mpsc::UnboundedSender<Frame>,
    open: Arc<AtomicBool>,
}

#[derive(Default)]
struct SimState {
    refuse: HashSet<String>,
    links: HashMap<String, Link>,
    sent: HashMap<String, Vec<String>>,
}

/// Test transport; hand the controller to the test body.
#[derive(Clone, Default)]
pub struct SimulatedTransport {
    state: Arc<Mutex<SimState>>,
    next_id: Arc<AtomicU64>,
}

/// Drives a [`SimulatedTransport`] from a test.
#[derive(Clone)]
pub struct SimulatedController {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedTransport {
    pub fn new() -> (Self, SimulatedController) {
        let transport = Self::default();
        let controller = SimulatedController {
            state: transport.state.clone(),
        };
        (transport, controller)
    }
}

#[async_trait]
impl StreamTransport for SimulatedTransport {
    async fn connect(&self, locator: &str) -> Result<Box<dyn StreamConnection>, TransportError> {
        let mut state = self.state.lock().unwrap();

        if state.refuse.remove(locator) {
            return Err(TransportError::Connect(format!(
                "connection refused: {locator}"
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        state.links.insert(
            locator.to_string(),
            Link {
                id,
                tx,
                open: open.clone(),
            },
        );

        Ok(Box::new(SimulatedConnection {
            locator: locator.to_string(),
            id,
            rx,
            open,
            state: self.state.clone(),
        }))
    }
}

impl SimulatedController {
    /// Make the next `connect` for `locator` fail.
    pub fn refuse_next_connect(&self, locator: &str) {
        let mut state = self.state.lock().unwrap();
        state.refuse.insert(locator.to_string());
    }

    /// Deliver one inbound text frame. Returns false if nothing is
    /// connected at `locator`.
    pub fn push_text(&self, locator: &str, text: impl Into<String>) -> bool {
        let state = self.state.lock().unwrap();
        match state.links.get(locator) {
            Some(link) => link.tx.send(Ok(text.into())).is_ok(),
            None => false,
        }
    }

    /// Deliver a transport error. The link stays up; close it separately to
    /// exercise the error-then-close sequence.
    pub fn push_error(&self, locator: &str, message: &str) -> bool {
        let state = self.state.lock().unwrap();
        match state.links.get(locator) {
            Some(link) => link
                .tx
                .send(Err(TransportError::Stream(message.to_string())))
                .is_ok(),
            None => false,
        }
    }

    /// Close the link at `locator`: queued frames still drain, then the
    /// connection sees the terminal close.
    pub fn close(&self, locator: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(link) = state.links.remove(locator) {
            link.open.store(false, Ordering::Relaxed);
        }
    }

    pub fn is_connected(&self, locator: &str) -> bool {
        let state = self.state.lock().unwrap();
        state.links.contains_key(locator)
    }

    /// Everything sent outbound on `locator`, across all connections to it.
    pub fn sent_messages(&self, locator: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.sent.get(locator).cloned().unwrap_or_default()
    }
}

struct SimulatedConnection {
    locator: String,
    id: u64,
    rx: mpsc::UnboundedReceiver<Frame>,
    open: Arc<AtomicBool>,
    state: Arc<Mutex<SimState>>,
}

#[async_trait]
impl StreamConnection for SimulatedConnection {
    async fn recv(&mut self) -> Option<Frame> {
        let frame = self.rx.recv().await;
        if frame.is_none() {
            self.open.store(false, Ordering::Relaxed);
        }
        frame
    }

    async fn send(&mut self, text: &str) -> Result<(), TransportError> {
        if !self.open.load(Ordering::Relaxed) {
            return Err(TransportError::Closed);
        }
        let mut state = self.state.lock().unwrap();
        state
            .sent
            .entry(self.locator.clone())
            .or_default()
            .push(text.to_string());
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    async fn close(&mut self) {
        self.open.store(false, Ordering::Relaxed);
        let mut state = self.state.lock().unwrap();
        // Only tear down our own link; a restarted session may have
        // replaced it already.
        if state.links.get(&self.locator).is_some_and(|l| l.id == self.id) {
            state.links.remove(&self.locator);
        }
    }
}
