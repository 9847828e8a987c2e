//! Terraform CLI provisioner.
//!
//! The harness treats Terraform as an opaque apply/output/destroy engine.
//! [`TerraformCli`] shells out to the `terraform` binary through a
//! [`CommandRunner`] so argument rendering and failure handling can be
//! tested without touching real infrastructure.

mod module_copy;

use std::collections::BTreeMap;
use std::ffi::OsString;

use camino::Utf8PathBuf;
use thiserror::Error;
use tracing::info;

use crate::command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner, os_args};

pub use module_copy::{
    ModuleCopy, ModuleCopyError, TEMP_PREFIX, copy_module_into, copy_module_to_temp,
};

/// Default Terraform binary name.
pub const DEFAULT_TERRAFORM_BIN: &str = "terraform";

/// Value of a `-var` passed to Terraform.
#[derive(Clone, Debug, PartialEq)]
pub enum TfVar {
    /// Plain string, passed through verbatim.
    String(String),
    /// Boolean rendered as `true`/`false`.
    Bool(bool),
    /// Number rendered in its shortest decimal form.
    Number(f64),
    /// List of strings rendered as a JSON array, which is valid HCL.
    List(Vec<String>),
}

impl TfVar {
    /// Renders the value as it appears after `name=` on the command line.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::String(value) => value.clone(),
            Self::Bool(value) => value.to_string(),
            Self::Number(value) => value.to_string(),
            Self::List(values) => serde_json::Value::from(values.clone()).to_string(),
        }
    }
}

impl From<&str> for TfVar {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for TfVar {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for TfVar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<String>> for TfVar {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Inputs of a Terraform run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TerraformOptions {
    /// Module directory Terraform runs in (`-chdir`).
    pub dir: Utf8PathBuf,
    /// Variables passed with `-var`, rendered in key order.
    pub vars: BTreeMap<String, TfVar>,
    /// Environment overrides for the Terraform process.
    pub env: BTreeMap<String, String>,
}

impl TerraformOptions {
    /// Starts options for the module in `dir`.
    #[must_use]
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// Adds a variable.
    #[must_use]
    pub fn var(mut self, name: impl Into<String>, value: impl Into<TfVar>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Adds an environment override.
    #[must_use]
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    fn var_args(&self) -> Vec<OsString> {
        self.vars
            .iter()
            .flat_map(|(name, value)| {
                [
                    OsString::from("-var"),
                    OsString::from(format!("{name}={}", value.render())),
                ]
            })
            .collect()
    }

    fn env_pairs(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// Errors raised by the provisioner.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProvisionError {
    /// Raised when the provisioner is built with a blank binary.
    #[error("invalid provisioner configuration: missing {field}")]
    InvalidConfig {
        /// Name of the missing field.
        field: String,
    },
    /// Raised when Terraform exits with a non-zero status.
    #[error("terraform {action} in {dir} failed with status {status_text}: {stderr}")]
    CommandFailure {
        /// Terraform sub-command that failed (`init`, `apply`, …).
        action: String,
        /// Module directory.
        dir: Utf8PathBuf,
        /// Exit status reported by the OS.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Captured stderr.
        stderr: String,
    },
    /// Raised when a requested output is empty.
    #[error("terraform output '{name}' is empty")]
    EmptyOutput {
        /// Output name.
        name: String,
    },
    /// Raised when Terraform cannot be started.
    #[error(transparent)]
    Runner(#[from] CommandError),
}

/// Apply/output/destroy lifecycle of an infrastructure module.
pub trait Provisioner {
    /// Initialises the module and applies it.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when `init` or `apply` fails.
    fn init_and_apply(&self, options: &TerraformOptions) -> Result<(), ProvisionError>;

    /// Reads a single output value.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when the output is missing or empty.
    fn output(&self, options: &TerraformOptions, name: &str) -> Result<String, ProvisionError>;

    /// Destroys every resource the module created.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] when `destroy` fails.
    fn destroy(&self, options: &TerraformOptions) -> Result<(), ProvisionError>;
}

impl<P: Provisioner + ?Sized> Provisioner for &P {
    fn init_and_apply(&self, options: &TerraformOptions) -> Result<(), ProvisionError> {
        (**self).init_and_apply(options)
    }

    fn output(&self, options: &TerraformOptions, name: &str) -> Result<String, ProvisionError> {
        (**self).output(options, name)
    }

    fn destroy(&self, options: &TerraformOptions) -> Result<(), ProvisionError> {
        (**self).destroy(options)
    }
}

/// Provisioner backed by the `terraform` command-line tool.
#[derive(Clone, Debug)]
pub struct TerraformCli<R: CommandRunner> {
    terraform_bin: String,
    runner: R,
}

impl TerraformCli<ProcessCommandRunner> {
    /// Creates a provisioner wired to the real process runner.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::InvalidConfig`] when the binary is blank.
    pub fn with_process_runner(terraform_bin: impl Into<String>) -> Result<Self, ProvisionError> {
        Self::new(terraform_bin, ProcessCommandRunner)
    }
}

impl<R: CommandRunner> TerraformCli<R> {
    /// Creates a provisioner using `runner`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::InvalidConfig`] when the binary is blank.
    pub fn new(terraform_bin: impl Into<String>, runner: R) -> Result<Self, ProvisionError> {
        let trimmed_bin = terraform_bin.into().trim().to_owned();
        if trimmed_bin.is_empty() {
            return Err(ProvisionError::InvalidConfig {
                field: String::from("terraform_bin"),
            });
        }
        Ok(Self {
            terraform_bin: trimmed_bin,
            runner,
        })
    }

    fn run(
        &self,
        options: &TerraformOptions,
        action: &str,
        params: Vec<OsString>,
    ) -> Result<CommandOutput, ProvisionError> {
        let mut args = vec![
            OsString::from(format!("-chdir={}", options.dir)),
            OsString::from(action),
        ];
        args.extend(params);
        let output = self
            .runner
            .run_with_env(&self.terraform_bin, &args, &options.env_pairs())?;
        if output.is_success() {
            return Ok(output);
        }
        Err(ProvisionError::CommandFailure {
            action: action.to_owned(),
            dir: options.dir.clone(),
            status: output.code,
            status_text: output.status_text(),
            stderr: output.stderr.trim().to_owned(),
        })
    }
}

impl<R: CommandRunner> Provisioner for TerraformCli<R> {
    fn init_and_apply(&self, options: &TerraformOptions) -> Result<(), ProvisionError> {
        info!(dir = %options.dir, "running terraform init");
        self.run(options, "init", os_args(["-input=false", "-no-color"]))?;

        info!(dir = %options.dir, vars = options.vars.len(), "running terraform apply");
        let mut params = os_args(["-auto-approve", "-input=false", "-no-color"]);
        params.extend(options.var_args());
        self.run(options, "apply", params)?;
        Ok(())
    }

    fn output(&self, options: &TerraformOptions, name: &str) -> Result<String, ProvisionError> {
        let output = self.run(options, "output", os_args(["-raw", "-no-color", name]))?;
        let value = output.stdout.trim();
        if value.is_empty() {
            return Err(ProvisionError::EmptyOutput {
                name: name.to_owned(),
            });
        }
        Ok(value.to_owned())
    }

    fn destroy(&self, options: &TerraformOptions) -> Result<(), ProvisionError> {
        info!(dir = %options.dir, "running terraform destroy");
        let mut params = os_args(["-auto-approve", "-input=false", "-no-color"]);
        params.extend(options.var_args());
        self.run(options, "destroy", params)?;
        Ok(())
    }
}
