//! Declarative description of what a converter back-end can do.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::formats::FormatCode;

/// Source format to the formats it can be converted into.
pub type FormatMap = HashMap<FormatCode, Vec<FormatCode>>;

/// Host operating systems a converter runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    /// The platform this binary was built for.
    pub fn current() -> Option<Self> {
        match std::env::consts::OS {
            "linux" => Some(Self::Linux),
            "macos" => Some(Self::MacOs),
            "windows" => Some(Self::Windows),
            _ => None,
        }
    }
}

/// A fixed multi-hop path a converter knows to be reliable, e.g. Outlook
/// message to EML to PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatChain {
    pub source: FormatCode,
    pub hops: Vec<FormatCode>,
}

/// Capabilities of one converter.
///
/// Blocking pairs are always a subset of the supported pairs: declaring a
/// pair blocking also declares it supported.
#[derive(Debug, Clone, Default)]
pub struct ConverterCapability {
    supported: FormatMap,
    blocking: FormatMap,
    platforms: Vec<Platform>,
    fixed_chains: Vec<FormatChain>,
    mergeable: Vec<FormatCode>,
    merge_output: Option<FormatCode>,
}

fn insert_pairs(map: &mut FormatMap, sources: &[&str], targets: &[&str]) {
    for source in sources {
        let entry = map.entry(FormatCode::from(*source)).or_default();
        for target in targets {
            let target = FormatCode::from(*target);
            if *source != target.as_str() && !entry.contains(&target) {
                entry.push(target);
            }
        }
    }
}

impl ConverterCapability {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares every `sources × targets` pair supported.
    pub fn with_conversions(mut self, sources: &[&str], targets: &[&str]) -> Self {
        insert_pairs(&mut self.supported, sources, targets);
        self
    }

    /// Declares every `sources × targets` pair supported and blocking.
    pub fn with_blocking(mut self, sources: &[&str], targets: &[&str]) -> Self {
        insert_pairs(&mut self.supported, sources, targets);
        insert_pairs(&mut self.blocking, sources, targets);
        self
    }

    /// Restricts the converter to these platforms. No restriction when never called.
    pub fn with_platforms(mut self, platforms: &[Platform]) -> Self {
        self.platforms = platforms.to_vec();
        self
    }

    /// Declares a fixed chain starting at `source`.
    pub fn with_chain(mut self, source: &str, hops: &[&str]) -> Self {
        self.fixed_chains.push(FormatChain {
            source: FormatCode::from(source),
            hops: hops.iter().map(|h| FormatCode::from(*h)).collect(),
        });
        self
    }

    /// Declares that files in `inputs` can be concatenated into one `output`.
    pub fn with_merge(mut self, inputs: &[&str], output: &str) -> Self {
        self.mergeable = inputs.iter().map(|c| FormatCode::from(*c)).collect();
        self.merge_output = Some(FormatCode::from(output));
        self
    }

    pub fn supported(&self) -> &FormatMap {
        &self.supported
    }

    pub fn blocking(&self) -> &FormatMap {
        &self.blocking
    }

    pub fn supports(&self, from: &FormatCode, to: &FormatCode) -> bool {
        self.supported.get(from).is_some_and(|t| t.contains(to))
    }

    pub fn is_blocking(&self, from: &FormatCode, to: &FormatCode) -> bool {
        self.blocking.get(from).is_some_and(|t| t.contains(to))
    }

    /// Direct targets reachable from `from`, in declaration order.
    pub fn targets_from(&self, from: &FormatCode) -> &[FormatCode] {
        self.supported.get(from).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn runs_on(&self, platform: Option<Platform>) -> bool {
        if self.platforms.is_empty() {
            return true;
        }
        platform.is_some_and(|p| self.platforms.contains(&p))
    }

    pub fn fixed_chains(&self) -> &[FormatChain] {
        &self.fixed_chains
    }

    pub fn can_merge(&self, format: &FormatCode) -> bool {
        self.merge_output.is_some() && self.mergeable.contains(format)
    }

    pub fn merge_output(&self) -> Option<&FormatCode> {
        self.merge_output.as_ref()
    }

    /// Number of supported (source, target) pairs.
    pub fn pair_count(&self) -> usize {
        self.supported.values().map(Vec::len).sum()
    }
}
