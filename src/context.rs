//! Mutable state shared by the pipeline steps in one build run.

use thiserror::Error;

use crate::driver::ImageHandle;
use crate::keypair::SshKeyPair;
use crate::step::BuildError;

/// Errors raised by context accessors.
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
pub enum ContextError {
    /// Raised when a value is read before the step responsible for
    /// producing it has run.
    #[error("missing context value: {0}")]
    Missing(&'static str),
}

/// State bag threaded through every step of a build run.
///
/// Each field is written by exactly one step and read by zero or more later
/// steps; the fallible accessors enforce that ordering at runtime. Cleanup
/// code uses the `_opt` accessors because it must tolerate a step that
/// never reached the point of creating its resource.
///
/// A context belongs to exactly one run. The pipeline is single-threaded by
/// contract, so no locking is provided; concurrent builds each get their own
/// context.
#[derive(Debug)]
pub struct BuildContext<E>
where
    E: std::error::Error + 'static,
{
    key_pair: Option<SshKeyPair>,
    instance_id: Option<String>,
    instance_ip: Option<String>,
    image: Option<ImageHandle>,
    error: Option<BuildError<E>>,
    cleanup_notes: Vec<String>,
}

impl<E> Default for BuildContext<E>
where
    E: std::error::Error + 'static,
{
    fn default() -> Self {
        Self {
            key_pair: None,
            instance_id: None,
            instance_ip: None,
            image: None,
            error: None,
            cleanup_notes: Vec::new(),
        }
    }
}

impl<E> BuildContext<E>
where
    E: std::error::Error + 'static,
{
    /// Creates an empty context for a fresh run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the generated SSH key pair.
    pub fn set_key_pair(&mut self, key_pair: SshKeyPair) {
        self.key_pair = Some(key_pair);
    }

    /// Returns the SSH key pair.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Missing`] when the key step has not run yet.
    pub fn key_pair(&self) -> Result<&SshKeyPair, ContextError> {
        self.key_pair.as_ref().ok_or(ContextError::Missing("key_pair"))
    }

    /// Stores the identifier of the launched instance.
    pub fn set_instance_id(&mut self, instance_id: String) {
        self.instance_id = Some(instance_id);
    }

    /// Returns the instance identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Missing`] when the instance step has not run
    /// yet.
    pub fn instance_id(&self) -> Result<&str, ContextError> {
        self.instance_id
            .as_deref()
            .ok_or(ContextError::Missing("instance_id"))
    }

    /// Returns the instance identifier if one was ever stored.
    #[must_use]
    pub fn instance_id_opt(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    /// Stores the address the instance is reachable at.
    pub fn set_instance_ip(&mut self, instance_ip: String) {
        self.instance_ip = Some(instance_ip);
    }

    /// Returns the instance address.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Missing`] when the info step has not run yet.
    pub fn instance_ip(&self) -> Result<&str, ContextError> {
        self.instance_ip
            .as_deref()
            .ok_or(ContextError::Missing("instance_ip"))
    }

    /// Returns the instance address if one was ever stored.
    #[must_use]
    pub fn instance_ip_opt(&self) -> Option<&str> {
        self.instance_ip.as_deref()
    }

    /// Stores the handle of the produced image.
    pub fn set_image(&mut self, image: ImageHandle) {
        self.image = Some(image);
    }

    /// Returns the produced image handle.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Missing`] when the image step has not run yet.
    pub fn image(&self) -> Result<&ImageHandle, ContextError> {
        self.image.as_ref().ok_or(ContextError::Missing("image"))
    }

    /// Returns the produced image handle if one was ever stored.
    #[must_use]
    pub fn image_opt(&self) -> Option<&ImageHandle> {
        self.image.as_ref()
    }

    /// Records the terminal build error. The presence of an error is the
    /// halting step's signal to the caller; a later write overwrites an
    /// earlier one, matching unconditional store semantics.
    pub fn record_error(&mut self, error: BuildError<E>) {
        self.error = Some(error);
    }

    /// Returns the recorded terminal error, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&BuildError<E>> {
        self.error.as_ref()
    }

    /// Removes and returns the recorded terminal error.
    pub fn take_error(&mut self) -> Option<BuildError<E>> {
        self.error.take()
    }

    /// Appends an advisory note from a cleanup action. Cleanup failures are
    /// recorded here instead of replacing the terminal error, so the caller
    /// sees the original failure first and the secondary damage after it.
    pub fn push_cleanup_note(&mut self, note: impl Into<String>) {
        self.cleanup_notes.push(note.into());
    }

    /// Advisory notes recorded by cleanup actions, in the order they
    /// occurred.
    #[must_use]
    pub fn cleanup_notes(&self) -> &[String] {
        self.cleanup_notes.as_slice()
    }

    /// Removes and returns the advisory cleanup notes.
    pub fn take_cleanup_notes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.cleanup_notes)
    }
}
