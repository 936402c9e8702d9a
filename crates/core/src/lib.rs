//! Vikareta Core - Shared types library.
//!
//! This crate provides the common types used across the Vikareta session
//! coordinator components:
//! - `session` - the cross-domain session coordinator library
//! - `integration-tests` - end-to-end scenario tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients, no timers. This keeps it lightweight and allows it to be used
//! anywhere, including host environments the coordinator itself never runs
//! in.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, the authenticated-principal model, token
//!   bundles, the canonical `AuthState`, and site-domain matching

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
