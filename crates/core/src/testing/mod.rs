//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the external tool traits,
//! allowing whole runs to be tested without Siegfried or any converter
//! binary installed. Formats travel inside the files: mocks write
//! `FORMAT:<code>` and the mock identifier reads it back.
//!
//! # Example
//!
//! ```rust,ignore
//! use archivist_core::testing::{MockConverter, MockIdentifier};
//!
//! MockIdentifier::write_tagged(&input.join("a.doc"), "fmt/40").await?;
//!
//! let converter = MockConverter::new("office").with_conversion("fmt/40", "fmt/412");
//! let identifier = MockIdentifier::new();
//! ```

mod mock_converter;
mod mock_identifier;

pub use mock_converter::{read_tag, MockConverter, RecordedConversion};
pub use mock_identifier::MockIdentifier;
