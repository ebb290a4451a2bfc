//! Driver abstraction between the baking pipeline and the cloud API client.

use std::future::Future;
use std::pin::Pin;

/// Handle identifying a custom image produced by the cloud.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageHandle {
    /// Provider-specific identifier for the image.
    pub id: String,
    /// Display name the image was created under.
    pub name: String,
}

/// Future returned by driver operations.
pub type DriverFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Cloud operations required by the baking pipeline.
///
/// The pipeline steps consume this interface exclusively; the driver never
/// learns about steps or the shared context. Every operation blocks the
/// single pipeline task until the remote call (and, for the `wait_for_*`
/// operations, the underlying state polling) completes.
pub trait Driver: Send + Sync {
    /// Provider-specific error type returned by the driver.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Launches a new compute instance with the given public key authorised
    /// for SSH and returns the instance identifier.
    fn create_instance<'a>(&'a self, public_key: &'a str)
    -> DriverFuture<'a, String, Self::Error>;

    /// Requests termination of the given instance.
    fn terminate_instance<'a>(&'a self, instance_id: &'a str)
    -> DriverFuture<'a, (), Self::Error>;

    /// Resolves the address provisioning should use to reach the instance.
    fn get_instance_ip<'a>(&'a self, instance_id: &'a str)
    -> DriverFuture<'a, String, Self::Error>;

    /// Snapshots the instance into a new custom image.
    fn create_image<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> DriverFuture<'a, ImageHandle, Self::Error>;

    /// Deletes a custom image.
    fn delete_image<'a>(&'a self, image_id: &'a str) -> DriverFuture<'a, (), Self::Error>;

    /// Blocks until the instance leaves every state in `wait_states` and
    /// reaches `terminal_state`. Any other observed state is a failure.
    fn wait_for_instance_state<'a>(
        &'a self,
        instance_id: &'a str,
        wait_states: &'a [&'a str],
        terminal_state: &'a str,
    ) -> DriverFuture<'a, (), Self::Error>;

    /// Blocks until the image under construction becomes available.
    fn wait_for_image_creation<'a>(
        &'a self,
        image_id: &'a str,
    ) -> DriverFuture<'a, (), Self::Error>;
}
