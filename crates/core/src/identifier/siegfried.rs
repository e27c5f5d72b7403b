//! Siegfried-based identifier implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use super::checksum::{file_checksum, ChecksumAlgorithm};
use super::config::IdentifierConfig;
use super::error::IdentifyError;
use super::traits::Identifier;
use super::types::FileIdentity;

#[derive(Deserialize)]
struct SfOutput {
    files: Vec<SfFile>,
}

#[derive(Deserialize)]
struct SfFile {
    filename: String,
    #[serde(default)]
    filesize: u64,
    modified: Option<String>,
    #[serde(default)]
    errors: String,
    md5: Option<String>,
    sha256: Option<String>,
    #[serde(default)]
    matches: Vec<SfMatch>,
}

#[derive(Deserialize)]
struct SfMatch {
    ns: String,
    id: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    mime: String,
    #[serde(default)]
    warning: String,
}

/// Identifier backed by the Siegfried (`sf`) command line tool.
pub struct SiegfriedIdentifier {
    config: IdentifierConfig,
    checksum: ChecksumAlgorithm,
}

impl SiegfriedIdentifier {
    /// Creates a new identifier with the given configuration.
    pub fn new(config: IdentifierConfig, checksum: ChecksumAlgorithm) -> Self {
        Self { config, checksum }
    }

    /// Creates an identifier with default configuration and MD5 checksums.
    pub fn with_defaults() -> Self {
        Self::new(IdentifierConfig::default(), ChecksumAlgorithm::Md5)
    }

    /// Parses `sf -json` output into identities.
    fn parse_output(output: &str) -> Result<Vec<FileIdentity>, IdentifyError> {
        let parsed: SfOutput = serde_json::from_str(output)
            .map_err(|e| IdentifyError::parse(format!("Failed to parse sf output: {}", e)))?;

        Ok(parsed
            .files
            .into_iter()
            .map(|file| {
                let pronom = file.matches.iter().find(|m| m.ns == "pronom");

                let mut errors = Vec::new();
                if !file.errors.is_empty() {
                    errors.push(file.errors.clone());
                }

                let warnings = file
                    .matches
                    .iter()
                    .filter(|m| !m.warning.is_empty())
                    .map(|m| m.warning.clone())
                    .collect();

                let format = match pronom {
                    Some(m) if m.id != "UNKNOWN" => m.id.as_str().into(),
                    _ => Default::default(),
                };

                FileIdentity {
                    path: PathBuf::from(&file.filename),
                    format,
                    format_name: pronom.map(|m| m.format.clone()).unwrap_or_default(),
                    mime: pronom.map(|m| m.mime.clone()).unwrap_or_default(),
                    size_bytes: file.filesize,
                    modified: file
                        .modified
                        .as_deref()
                        .and_then(|m| DateTime::parse_from_rfc3339(m).ok())
                        .map(|m| m.with_timezone(&Utc)),
                    checksum: file.sha256.or(file.md5),
                    errors,
                    warnings,
                }
            })
            .collect())
    }

    async fn run_sf(&self, paths: &[PathBuf]) -> Result<Vec<FileIdentity>, IdentifyError> {
        let mut command = Command::new(&self.config.sf_path);
        command
            .args(["-json", "-nr", "-hash", self.checksum.as_str()])
            .args(paths)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = timeout(
            Duration::from_secs(self.config.timeout_secs),
            command.output(),
        )
        .await
        .map_err(|_| IdentifyError::Timeout {
            timeout_secs: self.config.timeout_secs,
        })?
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                IdentifyError::ToolNotFound {
                    path: self.config.sf_path.clone(),
                }
            } else {
                IdentifyError::Io(e)
            }
        })?;

        if !output.status.success() {
            return Err(IdentifyError::tool_failed(
                format!("sf exited with code: {:?}", output.status.code()),
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
            ));
        }

        let mut identities = Self::parse_output(&String::from_utf8_lossy(&output.stdout))?;

        for identity in identities.iter_mut() {
            if identity.checksum.is_none() {
                identity.checksum = file_checksum(&identity.path, self.checksum).await.ok();
            }
        }

        Ok(identities)
    }
}

#[async_trait]
impl Identifier for SiegfriedIdentifier {
    fn name(&self) -> &str {
        "siegfried"
    }

    async fn identify(&self, path: &Path) -> Result<FileIdentity, IdentifyError> {
        if !path.exists() {
            return Err(IdentifyError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        self.run_sf(&[path.to_path_buf()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IdentifyError::parse("sf returned no result"))
    }

    async fn identify_batch(&self, paths: &[PathBuf]) -> Result<Vec<FileIdentity>, IdentifyError> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let identities = self.run_sf(paths).await?;

        // sf reports files in scan order; re-key by path to restore input order.
        let mut by_path: std::collections::HashMap<PathBuf, FileIdentity> = identities
            .into_iter()
            .map(|identity| (identity.path.clone(), identity))
            .collect();

        Ok(paths
            .iter()
            .map(|path| {
                by_path
                    .remove(path)
                    .unwrap_or_else(|| FileIdentity::unidentified(path, "missing from sf output"))
            })
            .collect())
    }

    async fn validate(&self) -> Result<(), IdentifyError> {
        let result = Command::new(&self.config.sf_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(IdentifyError::ToolNotFound {
                path: self.config.sf_path.clone(),
            }),
            Err(e) => Err(IdentifyError::Io(e)),
        }
    }
}
