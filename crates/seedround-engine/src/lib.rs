//! Seedround Engine - The negotiation workflow
//!
//! This crate ties the negotiation components together: the access gate, the
//! session state machine, the escrowed deposit, the moderated message
//! channel, the counterparty agent, and settlement on terminal states.
//!
//! # Concurrency model
//!
//! Each session is an independently lockable aggregate. Operations against
//! different sessions run fully in parallel; within one session every
//! state-mutating operation serializes on a per-session async mutex. The
//! access gate's "no existing live session" check is fused with session
//! creation inside the store, closing the check-then-insert race.
//!
//! # Stores
//!
//! Persistence is trait-backed (`SessionStore`, `MessageStore`); the
//! in-memory implementations here enforce the same invariants a SQL schema
//! would carry as unique constraints, so they double as executable
//! documentation of the storage contract.

pub mod access;
pub mod directory;
pub mod notify;
pub mod orchestrator;
pub mod store;

pub use access::AccessGate;
pub use directory::{AccessDirectory, InMemoryAccessDirectory, InMemoryListings, ListingDirectory};
pub use notify::{NotificationEvent, Notifier, RecordingNotifier, TracingNotifier};
pub use orchestrator::{NegotiationOrchestrator, PostMessageOutcome};
pub use store::{InMemoryMessages, InMemorySessions, MessageStore, SessionStore};
