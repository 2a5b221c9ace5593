// src/lib.rs
// Public library surface for integration tests (and embedding the engine
// without the HTTP shell).

pub mod api;
pub mod compute;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod policy;
pub mod poller;
pub mod source;
pub mod sources;
pub mod store;
pub mod value;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::engine::Engine;
pub use crate::policy::{DerivationPolicy, DigestFold};
pub use crate::source::Source;
pub use crate::store::{DerivedValue, LatestView, Snapshot, StateStore};
pub use crate::value::Value;
