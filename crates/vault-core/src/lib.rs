//! Shared foundation for the vault: the error taxonomy (whose codes are a
//! wire contract with the host shell), the process-wide path root, and the
//! provider tags.

pub mod errors;
pub mod paths;
pub mod provider;

pub use errors::{redact_paths, ErrorCode, Result, VaultError};
pub use paths::{PathRoot, VaultPaths};
pub use provider::Provider;
