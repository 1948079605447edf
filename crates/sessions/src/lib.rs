//! `gurukul-sessions` — the session registry.
//!
//! Issues signed access/refresh token pairs, enforces single-active-session
//! refresh rotation, and maintains the self-pruning revocation set. The
//! backing store is a trait so the in-process map can be swapped for an
//! external cache or database without touching the guard.

pub mod registry;
pub mod store;
pub mod tokens;

pub use registry::{RegistryError, SessionRegistry, TokenPair};
pub use store::{InMemorySessionStore, SessionEntry, SessionStore, SessionStoreError};
pub use tokens::{Fingerprint, TokenConfig, TokenSigner};
