//! Registered converters in registration order.

use std::path::Path;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{info, warn};

use super::capability::Platform;
use super::config::{ConverterKind, ConvertersConfig};
use super::email::EmailConverter;
use super::ghostscript::GhostscriptConverter;
use super::imagemagick::ImageMagickConverter;
use super::libreoffice::LibreOfficeConverter;
use super::traits::Converter;
use crate::formats::FormatCode;

/// A converter admitted to the run, with the gate that serializes its
/// blocking conversions.
pub struct RegisteredConverter {
    converter: Arc<dyn Converter>,
    gate: Arc<Semaphore>,
}

impl RegisteredConverter {
    pub fn new(converter: Arc<dyn Converter>) -> Self {
        Self {
            converter,
            gate: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn name(&self) -> &str {
        self.converter.name()
    }

    pub fn converter(&self) -> &Arc<dyn Converter> {
        &self.converter
    }

    /// Enters the blocking section when `from -> to` is a blocking pair.
    ///
    /// Holding the returned permit excludes every other blocking conversion
    /// on this converter instance. Non-blocking pairs return `None`
    /// immediately.
    pub async fn enter(&self, from: &FormatCode, to: &FormatCode) -> Option<OwnedSemaphorePermit> {
        if !self.converter.is_blocking(from, to) {
            return None;
        }
        Arc::clone(&self.gate).acquire_owned().await.ok()
    }
}

impl std::fmt::Debug for RegisteredConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredConverter")
            .field("name", &self.name())
            .finish()
    }
}

/// Converters available to this run.
///
/// Order is registration order and is part of the contract: for every hop the
/// first registered converter supporting it is chosen.
#[derive(Debug, Clone, Default)]
pub struct ConverterRegistry {
    converters: Vec<Arc<RegisteredConverter>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a converter unconditionally.
    pub fn register(&mut self, converter: Arc<dyn Converter>) {
        info!(
            converter = %converter.name(),
            position = self.converters.len(),
            pairs = converter.capability().pair_count(),
            "Registered converter"
        );
        self.converters.push(Arc::new(RegisteredConverter::new(converter)));
    }

    /// Registers a converter if it runs on `platform` and its tools are
    /// available. Returns whether it was registered.
    pub async fn register_if_available(
        &mut self,
        converter: Arc<dyn Converter>,
        platform: Option<Platform>,
    ) -> bool {
        if !converter.capability().runs_on(platform) {
            warn!(converter = %converter.name(), ?platform, "Converter not available on this platform");
            return false;
        }
        if !converter.dependencies_satisfied().await {
            warn!(converter = %converter.name(), "Converter dependencies not satisfied, skipping");
            return false;
        }
        self.register(converter);
        true
    }

    /// Builds the built-in converters in configured order and registers
    /// those whose dependencies are satisfied.
    ///
    /// `pool_size` sizes per-converter resource pools such as the ICC
    /// profile slots, which are kept below `scratch_dir`.
    pub async fn from_config(
        config: &ConvertersConfig,
        pool_size: usize,
        scratch_dir: &Path,
    ) -> Self {
        let mut registry = Self::new();
        let platform = Platform::current();

        for kind in &config.order {
            let converter: Arc<dyn Converter> = match kind {
                ConverterKind::LibreOffice if config.libreoffice.enabled => {
                    Arc::new(LibreOfficeConverter::new(config.libreoffice.clone()))
                }
                ConverterKind::Ghostscript if config.ghostscript.enabled => {
                    Arc::new(GhostscriptConverter::new(
                        config.ghostscript.clone(),
                        pool_size,
                        scratch_dir,
                    ))
                }
                ConverterKind::ImageMagick if config.imagemagick.enabled => {
                    Arc::new(ImageMagickConverter::new(config.imagemagick.clone()))
                }
                ConverterKind::Email if config.email.enabled => {
                    Arc::new(EmailConverter::new(config.email.clone()))
                }
                _ => {
                    info!(converter = kind.as_str(), "Converter disabled in configuration");
                    continue;
                }
            };
            registry.register_if_available(converter, platform).await;
        }

        registry
    }

    /// First registered converter supporting `from -> to`.
    pub fn find(&self, from: &FormatCode, to: &FormatCode) -> Option<Arc<RegisteredConverter>> {
        self.converters
            .iter()
            .find(|c| c.converter.supports_conversion(from, to))
            .cloned()
    }

    pub fn supports(&self, from: &FormatCode, to: &FormatCode) -> bool {
        self.converters
            .iter()
            .any(|c| c.converter.supports_conversion(from, to))
    }

    /// First registered converter able to merge files of `format`.
    pub fn find_merger(&self, format: &FormatCode) -> Option<Arc<RegisteredConverter>> {
        self.converters
            .iter()
            .find(|c| c.converter.capability().can_merge(format))
            .cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredConverter>> {
        self.converters.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.converters.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}
