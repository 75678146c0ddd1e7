//! Live progress watcher for WebScraper jobs.
//!
//! The backend runs the scrapes and owns the durable records; this crate is
//! the client side: start/cancel jobs over HTTP and track a job's live
//! progress by reducing its WebSocket event stream into an in-memory
//! snapshot (see [`tracker`]).

pub mod api;
pub mod config;
pub mod context;
pub mod logging;
pub mod tracker;
pub mod transport;
