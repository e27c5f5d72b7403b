//! Format identification.
//!
//! The [`Identifier`] trait is the black box that classifies files by
//! signature. [`SiegfriedIdentifier`] drives the `sf` tool; tests use
//! `testing::MockIdentifier`.
//!
//! Identification happens twice per file: once when the workspace is
//! prepared and once after scheduling, when the consistency checker compares
//! the re-identified format against the target. Converters also re-identify
//! every output they produce before reporting success.

mod batch;
mod checksum;
mod config;
mod error;
mod siegfried;
mod traits;
mod types;

pub use batch::{identify_all, plan_batches};
pub use checksum::{file_checksum, ChecksumAlgorithm};
pub use config::IdentifierConfig;
pub use error::IdentifyError;
pub use siegfried::SiegfriedIdentifier;
pub use traits::Identifier;
pub use types::FileIdentity;
