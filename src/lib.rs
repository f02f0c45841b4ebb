//! Shelfwise - personal book library tracker
//!
//! This library crate exposes the composition root for the binary and for
//! integration testing.

pub mod bootstrap;
