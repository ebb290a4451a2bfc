//! Configuration loading via `ortho-config`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Cloud and image settings derived from environment variables,
/// configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "OCI")]
pub struct OciConfig {
    /// Bearer token used to authenticate API requests. Required.
    pub auth_token: String,
    /// Compartment that owns the build instance and the produced image.
    pub compartment_id: String,
    /// Availability domain the instance is launched into.
    pub availability_domain: String,
    /// Subnet the instance's primary VNIC attaches to.
    pub subnet_id: String,
    /// Shape (instance type) for the build instance.
    pub shape: String,
    /// Identifier of the base image the instance boots from.
    pub base_image_id: String,
    /// Region used to derive the API endpoint. Defaults to `us-phoenix-1`.
    #[ortho_config(default = "us-phoenix-1".to_owned())]
    pub region: String,
    /// Full API endpoint override; takes precedence over `region`.
    pub api_endpoint: Option<String>,
    /// Display name for the produced image. A `kiln-<uuid>` name is
    /// generated when unset.
    pub image_name: Option<String>,
    /// Report the instance's private address instead of its public one.
    /// Defaults to the public address.
    pub use_private_ip: Option<bool>,
    /// Inline user data passed to the instance at launch.
    pub user_data: Option<String>,
    /// Path to a file whose contents are used as launch user data.
    pub user_data_file: Option<String>,
    /// Optional bound on state polls before a lifecycle wait gives up.
    /// Unset or zero polls forever, preserving the provider's convergence
    /// contract; set this only when no external watchdog bounds the build.
    pub max_wait_polls: Option<u32>,
}

/// Metadata for a configuration field, used to generate actionable error
/// messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
    section: &'static str,
}

impl FieldMetadata {
    const fn new(
        description: &'static str,
        env_var: &'static str,
        toml_key: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            description,
            env_var,
            toml_key,
            section,
        }
    }
}

impl OciConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to [{}] in kiln.toml",
                metadata.description, metadata.env_var, metadata.toml_key, metadata.section
            )));
        }
        Ok(())
    }

    /// Loads configuration using the `ortho-config` derive. Values merge
    /// defaults, configuration files, environment variables, and CLI flags
    /// in that order of precedence.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the loader fails to merge
    /// sources.
    pub fn load_from_sources() -> Result<Self, ConfigError> {
        Self::load().map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Loads configuration without attempting to parse CLI arguments.
    /// Values still merge defaults, configuration files, and environment
    /// variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("kiln")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Base URL of the compute API, derived from the region unless an
    /// explicit endpoint override is configured.
    #[must_use]
    pub fn endpoint(&self) -> String {
        self.api_endpoint
            .clone()
            .unwrap_or_else(|| format!("https://iaas.{}.oraclecloud.com/20160918", self.region))
    }

    /// Resolves the launch user data, reading the configured file when set,
    /// and returns it base64-encoded as the launch API expects.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UserDataConflict`] when both sources are set,
    /// [`ConfigError::UserData`] when the resolved payload is empty, and
    /// [`ConfigError::UserDataFileRead`] when the file cannot be read.
    pub fn resolved_user_data(&self) -> Result<Option<String>, ConfigError> {
        match (&self.user_data, &self.user_data_file) {
            (Some(_), Some(_)) => Err(ConfigError::UserDataConflict),
            (Some(inline), None) => {
                if inline.trim().is_empty() {
                    return Err(ConfigError::UserData(String::from(
                        "inline user data must not be empty",
                    )));
                }
                Ok(Some(BASE64.encode(inline.as_bytes())))
            }
            (None, Some(path)) => {
                let contents = read_user_data_file(Utf8Path::new(path))?;
                if contents.trim().is_empty() {
                    return Err(ConfigError::UserData(format!(
                        "user data file {path} must not be empty"
                    )));
                }
                Ok(Some(BASE64.encode(contents.as_bytes())))
            }
            (None, None) => Ok(None),
        }
    }

    /// Performs semantic validation on required fields. Error messages
    /// include guidance on how to provide missing values via environment
    /// variables or configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and propagates user-data resolution failures.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.auth_token,
            &FieldMetadata::new("API auth token", "OCI_AUTH_TOKEN", "auth_token", "oci"),
        )?;
        Self::require_field(
            &self.compartment_id,
            &FieldMetadata::new(
                "compartment ID",
                "OCI_COMPARTMENT_ID",
                "compartment_id",
                "oci",
            ),
        )?;
        Self::require_field(
            &self.availability_domain,
            &FieldMetadata::new(
                "availability domain",
                "OCI_AVAILABILITY_DOMAIN",
                "availability_domain",
                "oci",
            ),
        )?;
        Self::require_field(
            &self.subnet_id,
            &FieldMetadata::new("subnet ID", "OCI_SUBNET_ID", "subnet_id", "oci"),
        )?;
        Self::require_field(
            &self.shape,
            &FieldMetadata::new("instance shape", "OCI_SHAPE", "shape", "oci"),
        )?;
        Self::require_field(
            &self.base_image_id,
            &FieldMetadata::new("base image ID", "OCI_BASE_IMAGE_ID", "base_image_id", "oci"),
        )?;
        Self::require_field(
            &self.region,
            &FieldMetadata::new("region", "OCI_REGION", "region", "oci"),
        )?;
        self.resolved_user_data()?;
        Ok(())
    }
}

fn read_user_data_file(path: &Utf8Path) -> Result<String, ConfigError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_str().is_empty() => dir,
        _ => Utf8Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| ConfigError::UserDataFileRead {
            path: path.to_string(),
            message: String::from("path has no file name"),
        })?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| {
        ConfigError::UserDataFileRead {
            path: path.to_string(),
            message: err.to_string(),
        }
    })?;
    dir.read_to_string(file_name)
        .map_err(|err| ConfigError::UserDataFileRead {
            path: path.to_string(),
            message: err.to_string(),
        })
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
    /// Raised when inline user data and a user data file are both set.
    #[error(
        "user_data and user_data_file are mutually exclusive: set OCI_USER_DATA or \
         OCI_USER_DATA_FILE, not both"
    )]
    UserDataConflict,
    /// Raised when the configured user data is unusable.
    #[error("invalid user data: {0}")]
    UserData(String),
    /// Raised when the user data file cannot be read.
    #[error("failed to read user data file {path}: {message}")]
    UserDataFileRead {
        /// Path the loader attempted to read.
        path: String,
        /// Underlying I/O error message.
        message: String,
    },
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
