//! Test utilities for gridbout
//!
//! In-memory links and connectors so protocol and session tests run
//! deterministically without sockets.

pub mod link;

pub use link::{link_pair, MemoryLink, ScriptedConnector};
