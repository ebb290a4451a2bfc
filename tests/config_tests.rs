//! Unit tests for configuration loading and validation.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use kiln::config::ConfigError;
use kiln::OciConfig;
use rstest::*;
use tempfile::TempDir;

#[fixture]
fn valid_config() -> OciConfig {
    OciConfig {
        auth_token: String::from("oci-token-example"),
        compartment_id: String::from("ocid1.compartment.oc1..example"),
        availability_domain: String::from("Uocm:PHX-AD-1"),
        subnet_id: String::from("ocid1.subnet.oc1..example"),
        shape: String::from("VM.Standard2.1"),
        base_image_id: String::from("ocid1.image.oc1..base"),
        region: String::from("us-phoenix-1"),
        api_endpoint: None,
        image_name: None,
        use_private_ip: None,
        user_data: None,
        user_data_file: None,
        max_wait_polls: None,
    }
}

#[test]
fn validation_rejects_missing_token_with_actionable_error() {
    let cfg = OciConfig {
        auth_token: String::new(),
        ..valid_config()
    };

    let error = cfg.validate().expect_err("token is required");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error");
    };
    assert!(
        message.contains("OCI_AUTH_TOKEN"),
        "error should mention env var: {message}"
    );
    assert!(
        message.contains("kiln.toml"),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains("auth_token"),
        "error should mention TOML key: {message}"
    );
}

/// Verifies that validation produces actionable errors mentioning both the
/// environment variable and configuration file for each required field.
#[test]
fn validation_produces_actionable_errors_for_all_fields() {
    fn assert_actionable(
        mut cfg: OciConfig,
        mutate: impl FnOnce(&mut OciConfig),
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
            message.contains("kiln.toml"),
            "error should mention config file: {message}"
        );
        assert!(
            message.contains(toml_key),
            "error should mention TOML key {toml_key}: {message}"
        );
    }

    assert_actionable(
        valid_config(),
        |cfg| cfg.compartment_id.clear(),
        "OCI_COMPARTMENT_ID",
        "compartment_id",
    );

    assert_actionable(
        valid_config(),
        |cfg| cfg.availability_domain.clear(),
        "OCI_AVAILABILITY_DOMAIN",
        "availability_domain",
    );

    assert_actionable(
        valid_config(),
        |cfg| cfg.subnet_id.clear(),
        "OCI_SUBNET_ID",
        "subnet_id",
    );

    assert_actionable(valid_config(), |cfg| cfg.shape.clear(), "OCI_SHAPE", "shape");

    assert_actionable(
        valid_config(),
        |cfg| cfg.base_image_id.clear(),
        "OCI_BASE_IMAGE_ID",
        "base_image_id",
    );

    assert_actionable(
        valid_config(),
        |cfg| cfg.region.clear(),
        "OCI_REGION",
        "region",
    );
}

#[test]
fn valid_config_passes_validation() {
    valid_config()
        .validate()
        .unwrap_or_else(|err| panic!("valid config should validate: {err}"));
}

#[test]
fn rejects_inline_and_file_user_data_together() {
    let cfg = OciConfig {
        user_data: Some(String::from("#!/bin/sh\necho hello\n")),
        user_data_file: Some(String::from("/tmp/user-data.sh")),
        ..valid_config()
    };

    let err = cfg.validate().expect_err("expected conflict to error");
    assert!(matches!(err, ConfigError::UserDataConflict));
}

#[test]
fn rejects_empty_inline_user_data() {
    let cfg = OciConfig {
        user_data: Some(String::from("   ")),
        ..valid_config()
    };

    let err = cfg
        .resolved_user_data()
        .expect_err("expected empty inline to error");
    assert!(
        err.to_string().contains("must not be empty"),
        "unexpected error: {err}"
    );
}

#[test]
fn inline_user_data_is_base64_encoded() {
    let payload = "#!/bin/sh\necho hello\n";
    let cfg = OciConfig {
        user_data: Some(payload.to_owned()),
        ..valid_config()
    };

    let resolved = cfg
        .resolved_user_data()
        .unwrap_or_else(|err| panic!("resolve: {err}"));
    assert_eq!(resolved, Some(BASE64.encode(payload.as_bytes())));
}

#[test]
fn user_data_file_is_read_and_encoded() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let path = tmp.path().join("user-data.sh");
    std::fs::write(&path, "#!/bin/sh\nuptime\n").unwrap_or_else(|err| panic!("write: {err}"));
    let path_str = path
        .to_str()
        .unwrap_or_else(|| panic!("temp path should be utf8: {}", path.display()))
        .to_owned();

    let cfg = OciConfig {
        user_data_file: Some(path_str),
        ..valid_config()
    };

    let resolved = cfg
        .resolved_user_data()
        .unwrap_or_else(|err| panic!("resolve: {err}"));
    assert_eq!(resolved, Some(BASE64.encode(b"#!/bin/sh\nuptime\n")));
}

#[test]
fn missing_user_data_file_errors_with_its_path() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let missing = tmp.path().join("does-not-exist.sh");
    let missing_str = missing
        .to_str()
        .unwrap_or_else(|| panic!("temp path should be utf8: {}", missing.display()))
        .to_owned();

    let cfg = OciConfig {
        user_data_file: Some(missing_str.clone()),
        ..valid_config()
    };

    let err = cfg
        .resolved_user_data()
        .expect_err("expected missing file to error");
    let ConfigError::UserDataFileRead { path, .. } = err else {
        panic!("expected UserDataFileRead error");
    };
    assert_eq!(path, missing_str);
}

#[test]
fn absent_user_data_resolves_to_none() {
    let resolved = valid_config()
        .resolved_user_data()
        .unwrap_or_else(|err| panic!("resolve: {err}"));
    assert_eq!(resolved, None);
}
