//! Seedround Types - Canonical domain types for the negotiation engine
//!
//! This crate contains all foundational types for the Seedround negotiation
//! engine with zero dependencies on other seedround crates. It defines:
//!
//! - Identity types (UserId, ListingId, SessionId, etc.)
//! - The negotiation session aggregate and its state machine
//! - Deposit and settlement records
//! - Listing summary and per-listing negotiation configuration
//! - Access agreement records
//! - The error taxonomy shared by every engine component
//!
//! # Architectural Invariants
//!
//! The types encode the engine's core invariants directly:
//!
//! 1. Session status is a tagged enum with exhaustive transition handling,
//!    never string comparisons
//! 2. Deposit status only moves pending → held → {released | forfeited}
//! 3. A recorded agreement always carries finalized terms
//! 4. Records are retained for audit: terminal states end a session, they
//!    never delete it

pub mod access;
pub mod deposit;
pub mod error;
pub mod identity;
pub mod listing;
pub mod message;
pub mod session;
pub mod settlement;

pub use access::*;
pub use deposit::*;
pub use error::*;
pub use identity::*;
pub use listing::*;
pub use message::*;
pub use session::*;
pub use settlement::*;

/// Version of the Seedround types schema
pub const TYPES_VERSION: &str = "0.1.0";
