//! Converter module: back-ends that move a file one hop along its route.
//!
//! This module provides the `Converter` trait, the declarative
//! `ConverterCapability` each back-end publishes, the `ConverterRegistry`
//! holding the converters admitted to a run, and `convert_file`, the shared
//! dispatch path every hop goes through.
//!
//! # Features
//!
//! - Office documents (LibreOffice)
//! - PDF/A, PostScript and PDF page rendering (Ghostscript)
//! - Raster images and image merging (ImageMagick)
//! - E-mail with attachment extraction (msgconvert, e-mail converter jar)
//! - Per-attempt timeout, bounded retry and verification by re-identification
//!
//! # Example
//!
//! ```ignore
//! use archivist_core::converter::{convert_file, ConverterRegistry, DispatchSettings, HopRequest};
//!
//! let registry = ConverterRegistry::from_config(&config.converters, 8, &scratch).await;
//! let converter = registry.find(&from, &to).expect("no converter");
//!
//! let request = HopRequest { file_id, input, from, to };
//! match convert_file(&converter, identifier.as_ref(), &files, &settings, &request).await {
//!     Ok(success) => println!("{} outputs", success.outputs.len()),
//!     Err(failure) => println!("failed after {} attempts", failure.attempts),
//! }
//! ```

mod capability;
mod config;
mod dispatch;
mod email;
mod error;
mod ghostscript;
mod imagemagick;
mod libreoffice;
mod placement;
mod process;
mod registry;
mod resources;
mod retry;
mod traits;

pub use capability::{ConverterCapability, FormatChain, FormatMap, Platform};
pub use config::{
    ConverterKind, ConvertersConfig, EmailConfig, GhostscriptConfig, ImageMagickConfig,
    LibreOfficeConfig,
};
pub use dispatch::{
    convert_file, verify_outputs, DispatchSettings, HopFailure, HopRequest, HopSuccess, PlacedFile,
};
pub use email::EmailConverter;
pub use error::ConverterError;
pub use ghostscript::GhostscriptConverter;
pub use imagemagick::ImageMagickConverter;
pub use libreoffice::LibreOfficeConverter;
pub use placement::{move_file, unique_destination};
pub use process::{run_tool, tool_available, ToolOutput};
pub use registry::{ConverterRegistry, RegisteredConverter};
pub use resources::{PoolGuard, ResourcePool};
pub use retry::{retry, RetryConfig, RetryError, Retryable};
pub use traits::{Converter, HopJob, HopOutput, MergeJob};
