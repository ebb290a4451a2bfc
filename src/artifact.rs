//! The externally reported output of a successful build.

use std::fmt;

use crate::driver::{Driver, ImageHandle};

/// Handle to the produced machine image plus its destroy capability.
///
/// Once the pipeline has completed, [`Artifact::destroy`] is the only
/// externally visible cleanup hook for the image; nothing inside the
/// pipeline deletes an image it finished creating.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Artifact {
    image: ImageHandle,
}

impl Artifact {
    /// Wraps the image produced by a completed build.
    #[must_use]
    pub const fn new(image: ImageHandle) -> Self {
        Self { image }
    }

    /// Stable identifier of the produced image.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.image.id
    }

    /// The underlying image handle.
    #[must_use]
    pub const fn image(&self) -> &ImageHandle {
        &self.image
    }

    /// Deletes the image through the driver.
    ///
    /// # Errors
    ///
    /// Returns the driver's error when the deletion request fails.
    pub async fn destroy<D: Driver>(&self, driver: &D) -> Result<(), D::Error> {
        driver.delete_image(&self.image.id).await
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "machine image {} ({})", self.image.name, self.image.id)
    }
}
