//! External command execution shared by the AWS and Terraform adapters.
//!
//! Both adapters shell out to a CLI (`aws`, `terraform`) and parse what it
//! prints. Going through [`CommandRunner`] keeps that seam fakeable so the
//! resolution logic can be exercised without a cloud account.

use std::ffi::OsString;
use std::process::Command;

use thiserror::Error;

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Human readable exit status, `unknown` when the process was killed.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.code
            .map_or_else(|| String::from("unknown"), |code| code.to_string())
    }
}

/// Environment overrides applied to a child process.
pub type EnvOverrides = [(String, String)];

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments and environment overrides,
    /// capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Spawn`] if the command cannot be started.
    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        env: &EnvOverrides,
    ) -> Result<CommandOutput, CommandError>;

    /// Runs `program` with the inherited environment.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        self.run_with_env(program, args, &[])
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        env: &EnvOverrides,
    ) -> Result<CommandOutput, CommandError> {
        (**self).run_with_env(program, args, env)
    }
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        env: &EnvOverrides,
    ) -> Result<CommandOutput, CommandError> {
        tracing::debug!(program, args = ?args, "spawning command");
        let output = Command::new(program)
            .args(args)
            .envs(env.iter().map(|(key, value)| (key.as_str(), value.as_str())))
            .output()
            .map_err(|err| CommandError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Errors surfaced while starting external commands.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CommandError {
    /// Raised when a command cannot be spawned.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
}

/// Converts string-like arguments into the owned form runners expect.
pub(crate) fn os_args<I, S>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    args.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some(0), true, "0")]
    #[case(Some(3), false, "3")]
    #[case(None, false, "unknown")]
    fn command_output_reports_status(
        #[case] code: Option<i32>,
        #[case] success: bool,
        #[case] text: &str,
    ) {
        let output = CommandOutput {
            code,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(output.is_success(), success);
        assert_eq!(output.status_text(), text);
    }

    #[rstest]
    fn process_runner_reports_spawn_failures() {
        let err = ProcessCommandRunner
            .run("ecsprobe-definitely-missing-binary", &[])
            .expect_err("missing binary should fail to spawn");
        assert!(matches!(err, CommandError::Spawn { ref program, .. } if program == "ecsprobe-definitely-missing-binary"));
    }

    #[cfg(unix)]
    #[rstest]
    fn process_runner_passes_environment_overrides() {
        let output = ProcessCommandRunner
            .run_with_env(
                "sh",
                &os_args(["-c", "printf %s \"$ECSPROBE_TEST_VALUE\""]),
                &[(String::from("ECSPROBE_TEST_VALUE"), String::from("us-west-2"))],
            )
            .expect("sh should run");
        assert!(output.is_success());
        assert_eq!(output.stdout, "us-west-2");
    }
}
