//! Orchestrates an end-to-end image bake and reports the resulting
//! artifact.

use std::fmt;

use crate::artifact::Artifact;
use crate::context::BuildContext;
use crate::driver::Driver;
use crate::pipeline::{RunOutcome, StepRunner};
use crate::step::{BuildError, Step};
use crate::steps::{
    CreateImageStep, CreateInstanceStep, INSTANCE_TERMINATED, INSTANCE_TERMINATING_STATES,
    InstanceInfoStep, KeyPairStep,
};

/// Terminal failure of a build, with any advisory notes from cleanup.
///
/// The primary error is whatever the halting step recorded; cleanup
/// problems never replace it and are carried as secondary messages.
#[derive(Debug)]
pub struct BuildFailure<E>
where
    E: std::error::Error + 'static,
{
    /// The error recorded by the halting step, or a teardown failure.
    pub error: BuildError<E>,
    /// Secondary messages from best-effort cleanup actions.
    pub cleanup_notes: Vec<String>,
}

impl<E> fmt::Display for BuildFailure<E>
where
    E: std::error::Error + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        for note in &self.cleanup_notes {
            write!(f, " (cleanup: {note})")?;
        }
        Ok(())
    }
}

impl<E> std::error::Error for BuildFailure<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Drives the baking pipeline against a driver and extracts the artifact.
pub struct BuildOrchestrator<D: Driver> {
    driver: D,
    runner: StepRunner<D>,
}

impl<D: Driver> BuildOrchestrator<D> {
    /// Creates an orchestrator running the standard four-step pipeline.
    #[must_use]
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            runner: StepRunner::new(default_steps()),
        }
    }

    /// Replaces the pipeline; used by tests to run reduced step lists.
    #[must_use]
    pub fn with_steps(mut self, steps: Vec<Box<dyn Step<D>>>) -> Self {
        self.runner = StepRunner::new(steps);
        self
    }

    /// The driver this orchestrator provisions through.
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Runs the pipeline and, on success, tears the build instance down.
    ///
    /// Success-path teardown is deliberately not part of the pipeline's own
    /// cleanup pass: the pipeline only unwinds on halt, while a completed
    /// build terminates its instance as an explicit final action. When that
    /// teardown fails the image still exists, and the failure carries a
    /// note naming it so the caller can keep or delete it.
    ///
    /// # Errors
    ///
    /// Returns [`BuildFailure`] when any step halts or teardown fails; the
    /// primary error is the halting step's recorded value.
    pub async fn execute(&self) -> Result<Artifact, BuildFailure<D::Error>> {
        let mut ctx = BuildContext::new();
        let outcome = self.runner.run(&mut ctx, &self.driver).await;

        if outcome == RunOutcome::Halted {
            let error = ctx.take_error().unwrap_or(BuildError::Halted);
            return Err(BuildFailure {
                error,
                cleanup_notes: ctx.take_cleanup_notes(),
            });
        }

        let image = match ctx.image() {
            Ok(image) => image.clone(),
            Err(err) => {
                return Err(BuildFailure {
                    error: BuildError::Context(err),
                    cleanup_notes: ctx.take_cleanup_notes(),
                });
            }
        };
        let instance_id = match ctx.instance_id() {
            Ok(id) => id.to_owned(),
            Err(err) => {
                return Err(BuildFailure {
                    error: BuildError::Context(err),
                    cleanup_notes: ctx.take_cleanup_notes(),
                });
            }
        };

        if let Err(err) = self.driver.terminate_instance(&instance_id).await {
            return Err(BuildFailure {
                error: BuildError::Teardown(err),
                cleanup_notes: vec![format!(
                    "image {} was created and is unaffected; instance {instance_id} must be \
                     cleaned up manually",
                    image.id
                )],
            });
        }
        if let Err(err) = self
            .driver
            .wait_for_instance_state(
                &instance_id,
                INSTANCE_TERMINATING_STATES,
                INSTANCE_TERMINATED,
            )
            .await
        {
            return Err(BuildFailure {
                error: BuildError::Teardown(err),
                cleanup_notes: vec![format!(
                    "image {} was created and is unaffected; instance {instance_id} may still \
                     exist",
                    image.id
                )],
            });
        }

        Ok(Artifact::new(image))
    }
}

/// The standard pipeline, in execution order.
fn default_steps<D: Driver>() -> Vec<Box<dyn Step<D>>> {
    vec![
        Box::new(KeyPairStep),
        Box::new(CreateInstanceStep),
        Box::new(InstanceInfoStep),
        Box::new(CreateImageStep),
    ]
}
