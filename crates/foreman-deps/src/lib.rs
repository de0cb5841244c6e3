//! Shared dependency re-exports for the Foreman workspace.
//!
//! Member crates reach third-party crates through this one so the whole workspace
//! compiles against a single pinned set of versions.

pub use chrono;
pub use filetime;
pub use fs2;
pub use glob;
pub use serde_json;
pub use tempfile;
pub use toml;
pub use tracing;
pub use uuid;
pub use walkdir;
