//! Format codes and well-known PRONOM identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for a file format, usually a PRONOM PUID such as `fmt/477`.
///
/// Equality is exact string match. An empty code means the format is unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatCode(String);

impl FormatCode {
    /// Creates a format code from any string-like value.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The "unknown format" code.
    pub fn unknown() -> Self {
        Self(String::new())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier could not classify the file.
    pub fn is_unknown(&self) -> bool {
        self.0.is_empty() || self.0 == "UNKNOWN"
    }
}

impl fmt::Display for FormatCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("UNKNOWN")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for FormatCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for FormatCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Builds a list of format codes from string literals.
pub fn codes(list: &[&str]) -> Vec<FormatCode> {
    list.iter().map(|c| FormatCode::from(*c)).collect()
}

/// Well-known PRONOM identifiers used by the built-in converters.
pub mod pronom {
    // PDF
    pub const PDF_1_0: &str = "fmt/14";
    pub const PDF_1_1: &str = "fmt/15";
    pub const PDF_1_2: &str = "fmt/16";
    pub const PDF_1_3: &str = "fmt/17";
    pub const PDF_1_4: &str = "fmt/18";
    pub const PDF_1_5: &str = "fmt/19";
    pub const PDF_1_6: &str = "fmt/20";
    pub const PDF_1_7: &str = "fmt/276";
    pub const PDF_2_0: &str = "fmt/1129";

    // PDF/A
    pub const PDF_A_1A: &str = "fmt/95";
    pub const PDF_A_1B: &str = "fmt/354";
    pub const PDF_A_2A: &str = "fmt/476";
    pub const PDF_A_2B: &str = "fmt/477";
    pub const PDF_A_2U: &str = "fmt/478";
    pub const PDF_A_3A: &str = "fmt/479";
    pub const PDF_A_3B: &str = "fmt/480";
    pub const PDF_A_3U: &str = "fmt/481";

    // Office documents
    pub const WORD_97: &str = "fmt/40";
    pub const DOCX: &str = "fmt/412";
    pub const EXCEL_97: &str = "fmt/61";
    pub const XLSX: &str = "fmt/214";
    pub const POWERPOINT_97: &str = "fmt/126";
    pub const PPTX: &str = "fmt/215";
    pub const ODT_1_2: &str = "fmt/291";
    pub const ODS_1_2: &str = "fmt/295";
    pub const ODP_1_2: &str = "fmt/293";
    pub const RTF_1_9: &str = "fmt/355";
    pub const PLAIN_TEXT: &str = "x-fmt/111";

    // Raster images
    pub const PNG_1_2: &str = "fmt/13";
    pub const JPEG_1_02: &str = "fmt/44";
    pub const JFIF_1_01: &str = "fmt/43";
    pub const TIFF: &str = "fmt/353";
    pub const GIF_89A: &str = "fmt/4";
    pub const BMP_3: &str = "fmt/116";

    // PostScript
    pub const POSTSCRIPT_2: &str = "x-fmt/406";
    pub const POSTSCRIPT_3: &str = "x-fmt/407";
    pub const EPS_3: &str = "fmt/124";

    // E-mail
    pub const EML: &str = "fmt/950";
    pub const EML_INTERNET_MESSAGE: &str = "fmt/278";
    pub const OUTLOOK_MSG: &str = "x-fmt/430";

    /// Every plain PDF version.
    pub const PDF_VERSIONS: &[&str] = &[
        PDF_1_0, PDF_1_1, PDF_1_2, PDF_1_3, PDF_1_4, PDF_1_5, PDF_1_6, PDF_1_7, PDF_2_0,
    ];

    /// Every PDF/A flavour.
    pub const PDF_A_VERSIONS: &[&str] = &[
        PDF_A_1A, PDF_A_1B, PDF_A_2A, PDF_A_2B, PDF_A_2U, PDF_A_3A, PDF_A_3B, PDF_A_3U,
    ];

    /// Raster formats accepted by the image converter and image merger.
    pub const IMAGES: &[&str] = &[PNG_1_2, JPEG_1_02, JFIF_1_01, TIFF, GIF_89A, BMP_3];

    /// Returns the PDF/A part number (`1`, `2` or `3`) for a PDF/A code.
    pub fn pdfa_part(code: &str) -> Option<u8> {
        match code {
            PDF_A_1A | PDF_A_1B => Some(1),
            PDF_A_2A | PDF_A_2B | PDF_A_2U => Some(2),
            PDF_A_3A | PDF_A_3B | PDF_A_3U => Some(3),
            _ => None,
        }
    }

    /// Conventional file extension for a well-known code.
    pub fn extension(code: &str) -> Option<&'static str> {
        if is_pdf(code) {
            return Some("pdf");
        }
        let ext = match code {
            WORD_97 => "doc",
            DOCX => "docx",
            EXCEL_97 => "xls",
            XLSX => "xlsx",
            POWERPOINT_97 => "ppt",
            PPTX => "pptx",
            ODT_1_2 => "odt",
            ODS_1_2 => "ods",
            ODP_1_2 => "odp",
            RTF_1_9 => "rtf",
            PLAIN_TEXT => "txt",
            PNG_1_2 => "png",
            JPEG_1_02 | JFIF_1_01 => "jpg",
            TIFF => "tif",
            GIF_89A => "gif",
            BMP_3 => "bmp",
            POSTSCRIPT_2 | POSTSCRIPT_3 => "ps",
            EPS_3 => "eps",
            EML | EML_INTERNET_MESSAGE => "eml",
            OUTLOOK_MSG => "msg",
            _ => return None,
        };
        Some(ext)
    }

    /// Whether the code is any PDF or PDF/A flavour.
    pub fn is_pdf(code: &str) -> bool {
        PDF_VERSIONS.contains(&code) || PDF_A_VERSIONS.contains(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_code_equality_is_exact() {
        assert_eq!(FormatCode::from("fmt/40"), FormatCode::new("fmt/40".to_string()));
        assert_ne!(FormatCode::from("fmt/40"), FormatCode::from("fmt/40 "));
        assert_ne!(FormatCode::from("fmt/40"), FormatCode::from("FMT/40"));
    }

    #[test]
    fn test_unknown_display() {
        assert!(FormatCode::unknown().is_unknown());
        assert_eq!(FormatCode::unknown().to_string(), "UNKNOWN");
        assert!(!FormatCode::from("fmt/18").is_unknown());
    }

    #[test]
    fn test_serde_transparent() {
        let code = FormatCode::from("x-fmt/430");
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"x-fmt/430\"");
        let parsed: FormatCode = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, code);
    }

    #[test]
    fn test_pdfa_part() {
        assert_eq!(pronom::pdfa_part(pronom::PDF_A_2B), Some(2));
        assert_eq!(pronom::pdfa_part(pronom::PDF_A_1A), Some(1));
        assert_eq!(pronom::pdfa_part(pronom::PDF_1_7), None);
        assert!(pronom::is_pdf(pronom::PDF_A_3U));
        assert!(!pronom::is_pdf(pronom::DOCX));
    }

    #[test]
    fn test_extension() {
        assert_eq!(pronom::extension(pronom::PDF_A_2B), Some("pdf"));
        assert_eq!(pronom::extension(pronom::DOCX), Some("docx"));
        assert_eq!(pronom::extension(pronom::JFIF_1_01), Some("jpg"));
        assert_eq!(pronom::extension("fmt/999999"), None);
    }
}
