//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::resolve::PipelinePolicy;
use crate::retry::RetryPolicy;

/// Harness settings layered from defaults, configuration files and the
/// environment.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "ECSPROBE",
    discovery(
        app_name = "ecsprobe",
        env_var = "ECSPROBE_CONFIG_PATH",
        config_file_name = "ecsprobe.toml",
        dotfile_name = ".ecsprobe.toml",
        project_file_name = "ecsprobe.toml"
    )
)]
pub struct HarnessConfig {
    /// Region every AWS call is scoped to. Defaults to `us-west-2`.
    #[ortho_config(default = "us-west-2".to_owned())]
    pub region: String,
    /// Path to the `aws` executable.
    #[ortho_config(default = "aws".to_owned())]
    pub aws_bin: String,
    /// Path to the `terraform` executable.
    #[ortho_config(default = "terraform".to_owned())]
    pub terraform_bin: String,
    /// Attempts made by each lookup step before giving up.
    #[ortho_config(default = 3)]
    pub lookup_attempts: u32,
    /// Seconds slept between lookup attempts.
    #[ortho_config(default = 30)]
    pub lookup_interval_secs: u64,
    /// Per-request timeout for reachability probes, in seconds.
    #[ortho_config(default = 10)]
    pub probe_timeout_secs: u64,
    /// Directory holding the Terraform module tree used by `verify`.
    #[ortho_config(default = ".".to_owned())]
    pub module_root: String,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn hint(&self) -> String {
        format!(
            "set {} or add {} to ecsprobe.toml",
            self.env_var, self.toml_key
        )
    }
}

impl HarnessConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::Invalid(format!(
                "{} must be greater than zero: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("ecsprobe")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages include guidance on how
    /// to provide values via environment variables or configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] when a count or timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.region,
            &FieldMetadata::new("AWS region", "ECSPROBE_REGION", "region"),
        )?;
        Self::require_field(
            &self.aws_bin,
            &FieldMetadata::new("AWS CLI binary", "ECSPROBE_AWS_BIN", "aws_bin"),
        )?;
        Self::require_field(
            &self.terraform_bin,
            &FieldMetadata::new(
                "Terraform binary",
                "ECSPROBE_TERRAFORM_BIN",
                "terraform_bin",
            ),
        )?;
        Self::require_field(
            &self.module_root,
            &FieldMetadata::new(
                "module root directory",
                "ECSPROBE_MODULE_ROOT",
                "module_root",
            ),
        )?;
        Self::require_positive(
            u64::from(self.lookup_attempts),
            &FieldMetadata::new(
                "lookup attempts",
                "ECSPROBE_LOOKUP_ATTEMPTS",
                "lookup_attempts",
            ),
        )?;
        Self::require_positive(
            self.probe_timeout_secs,
            &FieldMetadata::new(
                "probe timeout",
                "ECSPROBE_PROBE_TIMEOUT_SECS",
                "probe_timeout_secs",
            ),
        )?;
        Ok(())
    }

    /// Retry policy applied to every lookup step.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `lookup_attempts` is zero.
    pub fn lookup_policy(&self) -> Result<RetryPolicy, ConfigError> {
        RetryPolicy::new(
            self.lookup_attempts,
            Duration::from_secs(self.lookup_interval_secs),
        )
        .map_err(|err| ConfigError::Invalid(format!("lookup_attempts: {err}")))
    }

    /// Resolution pipeline policy using [`Self::lookup_policy`] for every step.
    ///
    /// # Errors
    ///
    /// See [`Self::lookup_policy`].
    pub fn pipeline_policy(&self) -> Result<PipelinePolicy, ConfigError> {
        self.lookup_policy().map(PipelinePolicy::uniform)
    }

    /// Per-request probe timeout.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Module root as a UTF-8 path.
    #[must_use]
    pub fn module_root_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(self.module_root.trim())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a field holds an out-of-range value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
