//! Versioned preference persistence.
//!
//! Settings live in reactive cells (see `gestured-reactive`), grouped in a
//! [`Schema`] whose field order is the wire contract. Two codec families
//! read the same tree shape — JSON markup and a flat-text legacy form —
//! and one version-aware walk applies the migration rules accumulated
//! over eighteen schema generations. [`PrefStore`] drives load/save and
//! the durable file lifecycle (candidate selection, atomic replace,
//! degraded-state warnings).

pub mod error;
pub mod flat;
pub mod persist;
pub mod schema;
pub mod store;
pub mod types;

pub use error::PrefsError;
pub use persist::Persist;
pub use schema::{ExceptionTable, Schema, CURRENT_VERSION, SCHEMA_ROOT};
pub use store::{PrefStore, PREFS_BASENAME, PREFS_SUFFIXES};
pub use types::{ButtonBinding, Rgb, TimeoutProfile, ANY_MODIFIER};
