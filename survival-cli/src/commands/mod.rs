//! Command handlers -- one module per subcommand

pub mod report;
pub mod run;
pub mod sandboxes;
pub mod validate;

use std::path::Path;

use survival_core::config::SurvivalConfig;
use survival_core::error::SurvivalError;
use survival_core::matrix::HostilePathMatrix;
use survival_transform::{MagickPipeline, TransformRegistry};

use crate::error::CliError;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_PATH: &str = "survival.toml";

/// Loads the effective configuration: file, then env overrides, then CLI flags.
///
/// A missing file is only an error when the path was given explicitly.
pub async fn load_config(
    explicit: Option<&Path>,
    log_level: Option<&str>,
) -> Result<SurvivalConfig, CliError> {
    let mut config = match explicit {
        Some(path) => SurvivalConfig::from_file(path).await?,
        None if tokio::fs::try_exists(DEFAULT_CONFIG_PATH).await.unwrap_or(false) => {
            SurvivalConfig::from_file(DEFAULT_CONFIG_PATH).await?
        }
        None => SurvivalConfig::default(),
    };

    config.apply_env_overrides();
    if let Some(level) = log_level {
        config.general.log_level = level.to_owned();
    }
    config.validate()?;

    Ok(config)
}

/// Loads a matrix and validates every transform's arguments.
///
/// Any failure here aborts before a sandbox is started.
pub async fn load_matrix(path: &Path, magick_binary: &str) -> Result<HostilePathMatrix, CliError> {
    let matrix = HostilePathMatrix::load(path).await?;
    TransformRegistry::new(MagickPipeline::new(magick_binary))
        .validate_matrix(&matrix)
        .map_err(SurvivalError::from)?;
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_missing_config_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/survival.toml")), None)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_log_level_flag_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survival.toml");
        std::fs::write(&path, "[general]\nlog_level = \"warn\"\n").unwrap();

        let config = load_config(Some(&path), Some("debug")).await.unwrap();
        assert_eq!(config.general.log_level, "debug");

        let err = load_config(Some(&path), Some("loud")).await.unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[tokio::test]
    async fn test_bad_transform_args_fail_matrix_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.yaml");
        std::fs::write(
            &path,
            r#"
version: 1
scenarios:
  - id: bad-flag
    sandbox: remote-only
    transforms:
      - tool: simulate-proxy
        args: ["--teleport"]
    expected:
      remote_survives: true
      embed_survives: false
"#,
        )
        .unwrap();

        let err = load_matrix(&path, "magick").await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("bad-flag"));
    }
}
