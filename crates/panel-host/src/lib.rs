//! Host-side peer for the code analyzer panel.
//!
//! Serves framed envelopes from the panel, answers the built-in request
//! types, and announces readiness with a `webviewReady` notification.

pub mod cli;
pub mod config;
pub mod handlers;
pub mod server;
