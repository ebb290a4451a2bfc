//! OCI-compatible cloud adapter implementing the driver interface.
//!
//! Wire-level request construction lives here; the pipeline only ever sees
//! the [`Driver`] trait. Lifecycle waits are delegated to the polling
//! waiter bound to per-resource state accessors.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{ConfigError, OciConfig};
use crate::driver::{Driver, DriverFuture, ImageHandle};
use crate::waiter::{self, WaitError, WaitPolicy};

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// States an image passes through while the platform assembles it.
const IMAGE_WAIT_STATES: &[&str] = &["PROVISIONING"];
/// Terminal state of a finished image.
const IMAGE_AVAILABLE: &str = "AVAILABLE";

/// Errors raised by the OCI driver.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum OciDriverError {
    /// Raised when the high-level configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when a request cannot be sent or its response read.
    #[error("transport error: {0}")]
    Transport(String),
    /// Raised when the API rejects a request.
    #[error("api error (status {status}): {message}")]
    Api {
        /// HTTP status code returned by the API.
        status: u16,
        /// Error message extracted from the response body.
        message: String,
    },
    /// Raised when an instance has no VNIC attachment to resolve an address
    /// from.
    #[error("instance {instance_id} has no VNIC attachments")]
    MissingVnic {
        /// Instance the lookup ran against.
        instance_id: String,
    },
    /// Raised when the VNIC lacks an address of the requested kind.
    #[error("instance {instance_id} has no {kind} address")]
    MissingAddress {
        /// Instance the lookup ran against.
        instance_id: String,
        /// Address kind that was requested (`public` or `private`).
        kind: &'static str,
    },
    /// Raised when a lifecycle wait ends without reaching the terminal
    /// state.
    #[error("{0}")]
    Wait(String),
}

impl From<reqwest::Error> for OciDriverError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

impl From<ConfigError> for OciDriverError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<WaitError<OciDriverError>> for OciDriverError {
    fn from(value: WaitError<OciDriverError>) -> Self {
        match value {
            // Accessor failures keep their original shape.
            WaitError::Transport { source, .. } => source,
            other => Self::Wait(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInstance {
    id: String,
    lifecycle_state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiImage {
    id: String,
    display_name: String,
    lifecycle_state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VnicAttachment {
    vnic_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiVnic {
    public_ip: Option<String>,
    private_ip: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LaunchInstanceBody<'a> {
    availability_domain: &'a str,
    compartment_id: &'a str,
    shape: &'a str,
    image_id: &'a str,
    subnet_id: &'a str,
    display_name: String,
    metadata: LaunchMetadata<'a>,
}

// Metadata keys are verbatim instance-metadata names, not camelCase fields.
#[derive(Debug, Serialize)]
struct LaunchMetadata<'a> {
    ssh_authorized_keys: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_data: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateImageBody<'a> {
    compartment_id: &'a str,
    instance_id: &'a str,
    display_name: &'a str,
}

/// Driver that provisions instances and images through an OCI-compatible
/// REST API.
#[derive(Clone, Debug)]
pub struct OciDriver {
    http: reqwest::Client,
    config: OciConfig,
    endpoint: String,
    image_name: String,
    user_data: Option<String>,
    wait_policy: WaitPolicy,
}

impl OciDriver {
    /// Constructs a driver from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OciDriverError::Config`] when validation fails or the HTTP
    /// client cannot be built.
    pub fn new(config: OciConfig) -> Result<Self, OciDriverError> {
        config.validate()?;
        let user_data = config.resolved_user_data()?;
        let http = reqwest::Client::builder()
            .build()
            .map_err(|err| OciDriverError::Config(err.to_string()))?;
        let endpoint = config.endpoint();
        let image_name = config
            .image_name
            .clone()
            .unwrap_or_else(|| format!("kiln-{}", Uuid::new_v4().simple()));
        let wait_policy = match config.max_wait_polls {
            Some(polls) if polls > 0 => WaitPolicy::new(POLL_INTERVAL).with_max_retries(polls),
            _ => WaitPolicy::new(POLL_INTERVAL),
        };
        Ok(Self {
            http,
            config,
            endpoint,
            image_name,
            user_data,
            wait_policy,
        })
    }

    /// Overrides the poll cadence and retry budget; primarily used by tests
    /// to keep wait scenarios fast.
    #[must_use]
    pub const fn with_wait_policy(mut self, policy: WaitPolicy) -> Self {
        self.wait_policy = policy;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint)
    }

    async fn get_json<T>(&self, path: &str) -> Result<T, OciDriverError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.config.auth_token)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, OciDriverError>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize,
    {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.config.auth_token)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn delete(&self, path: &str) -> Result<(), OciDriverError> {
        let response = self
            .http
            .delete(self.url(path))
            .bearer_auth(&self.config.auth_token)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(Self::api_error(
            status,
            response.text().await.unwrap_or_default(),
        ))
    }

    async fn decode<T>(response: reqwest::Response) -> Result<T, OciDriverError>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(
                status,
                response.text().await.unwrap_or_default(),
            ));
        }
        response.json::<T>().await.map_err(OciDriverError::from)
    }

    fn api_error(status: reqwest::StatusCode, body: String) -> OciDriverError {
        let message =
            serde_json::from_str::<ApiErrorBody>(&body).map_or(body, |parsed| parsed.message);
        OciDriverError::Api {
            status: status.as_u16(),
            message,
        }
    }

    async fn instance_state(&self, instance_id: &str) -> Result<String, OciDriverError> {
        let instance: ApiInstance = self.get_json(&format!("instances/{instance_id}")).await?;
        Ok(instance.lifecycle_state)
    }

    async fn image_state(&self, image_id: &str) -> Result<String, OciDriverError> {
        let image: ApiImage = self.get_json(&format!("images/{image_id}")).await?;
        Ok(image.lifecycle_state)
    }
}

impl Driver for OciDriver {
    type Error = OciDriverError;

    fn create_instance<'a>(
        &'a self,
        public_key: &'a str,
    ) -> DriverFuture<'a, String, Self::Error> {
        Box::pin(async move {
            let body = LaunchInstanceBody {
                availability_domain: &self.config.availability_domain,
                compartment_id: &self.config.compartment_id,
                shape: &self.config.shape,
                image_id: &self.config.base_image_id,
                subnet_id: &self.config.subnet_id,
                display_name: format!("kiln-{}", Uuid::new_v4().simple()),
                metadata: LaunchMetadata {
                    ssh_authorized_keys: public_key,
                    user_data: self.user_data.as_deref(),
                },
            };
            let instance: ApiInstance = self.post_json("instances", &body).await?;
            Ok(instance.id)
        })
    }

    fn terminate_instance<'a>(&'a self, instance_id: &'a str) -> DriverFuture<'a, (), Self::Error> {
        Box::pin(async move { self.delete(&format!("instances/{instance_id}")).await })
    }

    fn get_instance_ip<'a>(&'a self, instance_id: &'a str) -> DriverFuture<'a, String, Self::Error> {
        Box::pin(async move {
            let attachments: Vec<VnicAttachment> = self
                .get_json(&format!("instances/{instance_id}/vnics"))
                .await?;
            let attachment = attachments.first().ok_or_else(|| {
                OciDriverError::MissingVnic {
                    instance_id: instance_id.to_owned(),
                }
            })?;
            let vnic: ApiVnic = self
                .get_json(&format!("vnics/{}", attachment.vnic_id))
                .await?;
            let (address, kind) = if self.config.use_private_ip.unwrap_or(false) {
                (vnic.private_ip, "private")
            } else {
                (vnic.public_ip, "public")
            };
            address.ok_or_else(|| OciDriverError::MissingAddress {
                instance_id: instance_id.to_owned(),
                kind,
            })
        })
    }

    fn create_image<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> DriverFuture<'a, ImageHandle, Self::Error> {
        Box::pin(async move {
            let body = CreateImageBody {
                compartment_id: &self.config.compartment_id,
                instance_id,
                display_name: &self.image_name,
            };
            let image: ApiImage = self.post_json("images", &body).await?;
            Ok(ImageHandle {
                id: image.id,
                name: image.display_name,
            })
        })
    }

    fn delete_image<'a>(&'a self, image_id: &'a str) -> DriverFuture<'a, (), Self::Error> {
        Box::pin(async move { self.delete(&format!("images/{image_id}")).await })
    }

    fn wait_for_instance_state<'a>(
        &'a self,
        instance_id: &'a str,
        wait_states: &'a [&'a str],
        terminal_state: &'a str,
    ) -> DriverFuture<'a, (), Self::Error> {
        Box::pin(async move {
            waiter::wait_for_state(
                || self.instance_state(instance_id),
                instance_id,
                wait_states,
                terminal_state,
                self.wait_policy,
            )
            .await
            .map_err(OciDriverError::from)
        })
    }

    fn wait_for_image_creation<'a>(&'a self, image_id: &'a str) -> DriverFuture<'a, (), Self::Error> {
        Box::pin(async move {
            waiter::wait_for_state(
                || self.image_state(image_id),
                image_id,
                IMAGE_WAIT_STATES,
                IMAGE_AVAILABLE,
                self.wait_policy,
            )
            .await
            .map_err(OciDriverError::from)
        })
    }
}
