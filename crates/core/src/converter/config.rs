//! Configuration for the converter back-ends.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifies a built-in converter back-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConverterKind {
    LibreOffice,
    Email,
    Ghostscript,
    ImageMagick,
}

impl ConverterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LibreOffice => "libreoffice",
            Self::Email => "email",
            Self::Ghostscript => "ghostscript",
            Self::ImageMagick => "imagemagick",
        }
    }
}

/// Configuration for all converter back-ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertersConfig {
    /// Registration order. The first registered converter supporting a hop
    /// is the one that runs it.
    #[serde(default = "default_order")]
    pub order: Vec<ConverterKind>,

    #[serde(default)]
    pub libreoffice: LibreOfficeConfig,

    #[serde(default)]
    pub ghostscript: GhostscriptConfig,

    #[serde(default)]
    pub imagemagick: ImageMagickConfig,

    #[serde(default)]
    pub email: EmailConfig,
}

fn default_order() -> Vec<ConverterKind> {
    vec![
        ConverterKind::LibreOffice,
        ConverterKind::Email,
        ConverterKind::Ghostscript,
        ConverterKind::ImageMagick,
    ]
}

fn default_true() -> bool {
    true
}

impl Default for ConvertersConfig {
    fn default() -> Self {
        Self {
            order: default_order(),
            libreoffice: LibreOfficeConfig::default(),
            ghostscript: GhostscriptConfig::default(),
            imagemagick: ImageMagickConfig::default(),
            email: EmailConfig::default(),
        }
    }
}

/// Office suite converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibreOfficeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path to the `soffice` binary.
    #[serde(default = "default_soffice_path")]
    pub soffice_path: PathBuf,
}

fn default_soffice_path() -> PathBuf {
    PathBuf::from("soffice")
}

impl Default for LibreOfficeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            soffice_path: default_soffice_path(),
        }
    }
}

/// PDF and PostScript converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhostscriptConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path to the `gs` binary.
    #[serde(default = "default_gs_path")]
    pub gs_path: PathBuf,

    /// ICC profile embedded as the PDF/A output intent. PDF/A targets are
    /// only offered when this is set.
    #[serde(default)]
    pub icc_profile: Option<PathBuf>,

    /// Resolution for PDF to image page splitting.
    #[serde(default = "default_dpi")]
    pub render_dpi: u32,
}

fn default_gs_path() -> PathBuf {
    PathBuf::from("gs")
}

fn default_dpi() -> u32 {
    300
}

impl Default for GhostscriptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gs_path: default_gs_path(),
            icc_profile: None,
            render_dpi: default_dpi(),
        }
    }
}

/// Raster image converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageMagickConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path to the `magick` binary.
    #[serde(default = "default_magick_path")]
    pub magick_path: PathBuf,
}

fn default_magick_path() -> PathBuf {
    PathBuf::from("magick")
}

impl Default for ImageMagickConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            magick_path: default_magick_path(),
        }
    }
}

/// E-mail converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Java runtime used to run the e-mail converter jar.
    #[serde(default = "default_java_path")]
    pub java_path: PathBuf,

    /// E-mail to PDF converter jar. E-mail to PDF is only offered when set.
    #[serde(default)]
    pub jar_path: Option<PathBuf>,

    /// `msgconvert` for Outlook `.msg` to `.eml`.
    #[serde(default = "default_msgconvert_path")]
    pub msgconvert_path: PathBuf,
}

fn default_java_path() -> PathBuf {
    PathBuf::from("java")
}

fn default_msgconvert_path() -> PathBuf {
    PathBuf::from("msgconvert")
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            java_path: default_java_path(),
            jar_path: None,
            msgconvert_path: default_msgconvert_path(),
        }
    }
}
