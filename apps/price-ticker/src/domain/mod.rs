//! Domain Layer - Instruments, the instrument store and subscriber tracking.
//!
//! Everything here is synchronous and transport-agnostic. Locking is
//! internal to each structure, so callers only ever see whole states.

/// Instrument records and feed change events.
pub mod instrument;

/// Authoritative in-memory instrument snapshot.
pub mod store;

/// Subscriber identities and the subscriber registry.
pub mod subscription;
