//! Common types shared across agentnet crates.
//!
//! This crate provides the identities, messages and errors that every
//! layer of the network speaks: the mailbox, the knowledge store, the
//! worker agents and the coordinator.

pub mod error;
pub mod message;
pub mod role;

pub use error::{NetworkError, Result};
pub use message::{Message, Payload, DEFAULT_PRIORITY};
pub use role::Role;
