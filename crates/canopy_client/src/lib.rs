//! # Canopy Client
//!
//! Listener-facing API and transport boundary for the Canopy sync engine.
//!
//! This crate provides:
//! - [`Client`]: subscribe/unsubscribe, local writes and latest values
//! - [`ServerOperation`] and [`UserOperation`]: JSON payloads validated
//!   before they reach the engine
//! - [`RecordingListenProvider`]: a provider that logs start/stop signals
//!
//! ## Delivery
//!
//! Every call runs to completion and delivers its events before returning.
//! Within one call, events are ordered removed, added, moved, changed, value,
//! and views deeper in the tree deliver before their ancestors.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod protocol;
mod provider;

pub use client::{CancelCallback, Client, EventCallback};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use protocol::{ServerCode, ServerOperation, UserOperation};
pub use provider::{ListenSignal, RecordingListenProvider};
