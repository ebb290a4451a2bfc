//! Step abstraction: a forward provisioning action paired with a
//! compensating rollback.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::context::{BuildContext, ContextError};
use crate::driver::Driver;
use crate::keypair::KeyPairError;

/// Signal returned by [`Step::run`] telling the runner whether to proceed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepAction {
    /// The step succeeded and the pipeline may continue.
    Continue,
    /// The step failed; the pipeline must stop and unwind.
    Halt,
}

/// Future returned by step actions.
pub type StepFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Terminal failures recorded in the build context.
///
/// Steps never raise errors across the run/cleanup boundary; a failing step
/// records one of these values in the context and returns
/// [`StepAction::Halt`]. The halt signal plus the recorded value are the only
/// two failure channels the runner and the caller inspect.
#[derive(Debug, Error)]
pub enum BuildError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when a step reads state an earlier step should have produced.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// Raised when local SSH key generation fails.
    #[error("failed to generate ssh key pair: {0}")]
    KeyPair(#[from] KeyPairError),
    /// Raised when the instance cannot be created.
    #[error("failed to create instance: {0}")]
    Provision(#[source] E),
    /// Raised when the instance never reaches the running state.
    #[error("instance did not reach the running state: {0}")]
    InstanceConverge(#[source] E),
    /// Raised when the instance address cannot be resolved.
    #[error("failed to resolve instance address: {0}")]
    InstanceInfo(#[source] E),
    /// Raised when the image cannot be created.
    #[error("failed to create image: {0}")]
    ImageCreate(#[source] E),
    /// Raised when the image never becomes available.
    #[error("image did not become available: {0}")]
    ImageConverge(#[source] E),
    /// Raised when a step halts without recording a more specific error.
    #[error("build halted without a recorded error")]
    Halted,
    /// Raised when tearing down the instance after a successful build fails.
    #[error("instance teardown failed after a successful build: {0}")]
    Teardown(#[source] E),
}

/// A unit of provisioning work with a forward action and a rollback.
///
/// `run` must establish its side effects (new context entries) before
/// returning [`StepAction::Continue`]. `cleanup` must be idempotent and
/// defensive: it may be invoked when `run` halted partway through or never
/// executed, so it checks optional context state before undoing anything and
/// records its own failures as advisory notes rather than aborting the
/// unwind of earlier steps.
pub trait Step<D: Driver>: Send + Sync {
    /// Name used in cleanup notes and diagnostics.
    fn name(&self) -> &'static str;

    /// Performs the forward action.
    fn run<'a>(
        &'a self,
        ctx: &'a mut BuildContext<D::Error>,
        driver: &'a D,
    ) -> StepFuture<'a, StepAction>;

    /// Rolls back whatever `run` managed to create. Steps that acquire no
    /// remote resource keep the default no-op.
    fn cleanup<'a>(
        &'a self,
        _ctx: &'a mut BuildContext<D::Error>,
        _driver: &'a D,
    ) -> StepFuture<'a, ()> {
        Box::pin(async {})
    }
}
