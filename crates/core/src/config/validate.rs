use regex_lite::Regex;
use std::path::Component;

use super::{types::Config, ConfigError};
use crate::formats::FormatCode;

/// Validate configuration
/// Currently validates:
/// - Every configured format code is PRONOM shaped
/// - Timeout, attempt and route-length bounds are non-zero
/// - Folder overrides name a folder and never escape the output root
/// - Input and output folders differ
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let pronom = Regex::new(r"^(x-)?fmt/\d+$")
        .map_err(|e| ConfigError::invalid("PRONOM pattern", e))?;

    let check = |code: &FormatCode, setting: &str| -> Result<(), ConfigError> {
        if pronom.is_match(code.as_str()) {
            Ok(())
        } else {
            Err(ConfigError::invalid(
                setting,
                format!("'{}' is not a PRONOM identifier", code),
            ))
        }
    };

    let run = &config.run;
    if run.timeout_minutes == 0 {
        return Err(ConfigError::invalid("run.timeout_minutes", "cannot be 0"));
    }
    if run.max_attempts == 0 {
        return Err(ConfigError::invalid("run.max_attempts", "cannot be 0"));
    }
    if run.max_route_hops == 0 {
        return Err(ConfigError::invalid("run.max_route_hops", "cannot be 0"));
    }
    if run.input_folder == run.output_folder {
        return Err(ConfigError::invalid(
            "run.output_folder",
            "must differ from run.input_folder",
        ));
    }
    if config.orchestrator.max_generations == 0 {
        return Err(ConfigError::invalid("orchestrator.max_generations", "cannot be 0"));
    }

    for setting in &config.formats {
        let context = format!("formats[{}]", setting.name);
        for code in &setting.pronoms {
            check(code, &context)?;
        }
        if let Some(ref target) = setting.default_target {
            check(target, &context)?;
        }
    }

    for folder in &config.folders {
        let context = format!("folders[{}]", folder.path.display());
        if folder.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("folders.path", "cannot be empty"));
        }
        if folder.path.is_absolute()
            || folder
                .path
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(ConfigError::invalid(
                &context,
                "path must be relative to the output folder",
            ));
        }
        for code in &folder.pronoms {
            check(code, &context)?;
        }
        if let Some(ref output) = folder.output {
            check(output, &context)?;
        }
    }

    Ok(())
}
