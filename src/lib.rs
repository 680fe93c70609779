//! consult-call - lifecycle wrapper for an embedded consultation call.
//!
//! [`session::CallSession`] owns one RTC widget handle and reconciles the
//! widget's asynchronous events with local state. The terminal host in
//! [`tui`] and the headless runner in [`session::call_test`] drive it.

pub mod config;
pub mod session;
pub mod tui;
