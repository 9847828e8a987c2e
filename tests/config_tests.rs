//! Unit tests for harness configuration validation and loading.

use std::time::Duration;

use ecsprobe::{HarnessConfig, RetryPolicy, config::ConfigError};
use rstest::*;

#[fixture]
fn valid_config() -> HarnessConfig {
    HarnessConfig {
        region: String::from("us-west-2"),
        aws_bin: String::from("aws"),
        terraform_bin: String::from("terraform"),
        lookup_attempts: 3,
        lookup_interval_secs: 30,
        probe_timeout_secs: 10,
        module_root: String::from("."),
    }
}

#[rstest]
fn config_validation_accepts_defaults(valid_config: HarnessConfig) {
    assert!(valid_config.validate().is_ok());
}

#[test]
fn config_validation_rejects_missing_region_with_actionable_error() {
    let cfg = HarnessConfig {
        region: String::from("   "),
        ..valid_config()
    };

    let error = cfg.validate().expect_err("region is required");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error, got {error:?}");
    };
    assert!(
        message.contains("ECSPROBE_REGION"),
        "error should mention env var: {message}"
    );
    assert!(
        message.contains("ecsprobe.toml"),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains("region"),
        "error should mention TOML key: {message}"
    );
}

/// Verifies that validation produces actionable errors mentioning both the
/// environment variable and configuration file for each checked field.
#[test]
fn config_validation_produces_actionable_errors_for_all_fields() {
    fn assert_actionable(
        mut cfg: HarnessConfig,
        mutate: impl FnOnce(&mut HarnessConfig),
        env_var: &str,
        toml_key: &str,
    ) {
        mutate(&mut cfg);
        let error = cfg.validate().expect_err("validation should fail");
        let message = error.to_string();
        assert!(
            message.contains(env_var),
            "error should mention env var {env_var}: {message}"
        );
        assert!(
            message.contains("ecsprobe.toml"),
            "error should mention config file: {message}"
        );
        assert!(
            message.contains(toml_key),
            "error should mention TOML key {toml_key}: {message}"
        );
    }

    assert_actionable(
        valid_config(),
        |cfg| cfg.aws_bin.clear(),
        "ECSPROBE_AWS_BIN",
        "aws_bin",
    );

    assert_actionable(
        valid_config(),
        |cfg| cfg.terraform_bin.clear(),
        "ECSPROBE_TERRAFORM_BIN",
        "terraform_bin",
    );

    assert_actionable(
        valid_config(),
        |cfg| cfg.module_root.clear(),
        "ECSPROBE_MODULE_ROOT",
        "module_root",
    );

    assert_actionable(
        valid_config(),
        |cfg| cfg.lookup_attempts = 0,
        "ECSPROBE_LOOKUP_ATTEMPTS",
        "lookup_attempts",
    );

    assert_actionable(
        valid_config(),
        |cfg| cfg.probe_timeout_secs = 0,
        "ECSPROBE_PROBE_TIMEOUT_SECS",
        "probe_timeout_secs",
    );
}

#[rstest]
#[case(|cfg: &mut HarnessConfig| cfg.lookup_attempts = 0)]
#[case(|cfg: &mut HarnessConfig| cfg.probe_timeout_secs = 0)]
fn zero_counts_are_invalid_rather_than_missing(
    valid_config: HarnessConfig,
    #[case] mutate: fn(&mut HarnessConfig),
) {
    let mut cfg = valid_config;
    mutate(&mut cfg);

    let error = cfg.validate().expect_err("zero should be rejected");
    assert!(
        matches!(error, ConfigError::Invalid(_)),
        "expected Invalid, got {error:?}"
    );
}

#[rstest]
fn lookup_policy_reflects_configured_budget(valid_config: HarnessConfig) {
    let cfg = HarnessConfig {
        lookup_attempts: 5,
        lookup_interval_secs: 0,
        ..valid_config
    };

    let policy = cfg.lookup_policy().expect("valid policy");
    assert_eq!(policy.max_attempts(), 5);
    assert_eq!(policy.interval(), Duration::ZERO);

    let pipeline = cfg.pipeline_policy().expect("valid pipeline policy");
    assert_eq!(pipeline.locate, policy);
    assert_eq!(pipeline.attachment, policy);
    assert_eq!(pipeline.address, policy);
}

#[rstest]
fn lookup_policy_rejects_zero_attempts(valid_config: HarnessConfig) {
    let cfg = HarnessConfig {
        lookup_attempts: 0,
        ..valid_config
    };

    let error = cfg.lookup_policy().expect_err("zero attempts");
    assert!(matches!(error, ConfigError::Invalid(_)));
}

#[rstest]
fn default_lookup_budget_matches_retry_default(valid_config: HarnessConfig) {
    assert_eq!(
        valid_config.lookup_policy().expect("valid policy"),
        RetryPolicy::LOOKUP
    );
    assert_eq!(valid_config.probe_timeout(), Duration::from_secs(10));
    assert_eq!(valid_config.module_root_path().as_str(), ".");
}

#[tokio::test]
async fn environment_overrides_defaults() {
    let _guard = ecsprobe::test_support::EnvGuard::set_vars(&[
        ("ECSPROBE_REGION", "eu-central-1"),
        ("ECSPROBE_TERRAFORM_BIN", "/opt/terraform/bin/terraform"),
    ])
    .await;

    let cfg = HarnessConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("config should load: {err}"));

    assert_eq!(cfg.region, "eu-central-1");
    assert_eq!(cfg.terraform_bin, "/opt/terraform/bin/terraform");
    assert_eq!(cfg.aws_bin, "aws");
    assert_eq!(cfg.lookup_attempts, 3);
}
