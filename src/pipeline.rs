//! Fixed executor that runs steps in order and unwinds on the first halt.

use crate::context::BuildContext;
use crate::driver::Driver;
use crate::step::{Step, StepAction};

/// How a pipeline run ended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunOutcome {
    /// Every step returned [`StepAction::Continue`].
    Completed,
    /// A step halted; cleanup ran for every step that had started, in
    /// reverse order.
    Halted,
}

/// Executes an ordered list of steps with halt-and-rollback semantics.
///
/// The runner performs no domain logic: it is a fixed fold over the step
/// list. Reverse-order cleanup mirrors resource-acquisition order because
/// the steps acquire external resources (cloud instances, images) with no
/// automatic destructor. A halted run is terminal; there is no partial
/// retry, and the caller inspects the context's recorded error for the
/// final verdict.
pub struct StepRunner<D: Driver> {
    steps: Vec<Box<dyn Step<D>>>,
}

impl<D: Driver> StepRunner<D> {
    /// Creates a runner over the given steps.
    #[must_use]
    pub fn new(steps: Vec<Box<dyn Step<D>>>) -> Self {
        Self { steps }
    }

    /// Number of steps in the pipeline.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs the steps in declared order.
    ///
    /// On the first [`StepAction::Halt`] the forward pass stops and
    /// `cleanup` is invoked for every step that ran — including the halting
    /// one — in reverse order. A run that completes does not trigger the
    /// cleanup pass: success-path teardown of the build instance is an
    /// explicit action owned by the caller, not a rollback.
    pub async fn run(&self, ctx: &mut BuildContext<D::Error>, driver: &D) -> RunOutcome {
        let mut ran: Vec<&dyn Step<D>> = Vec::with_capacity(self.steps.len());
        let mut halted = false;

        for step in &self.steps {
            let action = step.run(ctx, driver).await;
            ran.push(step.as_ref());
            if action == StepAction::Halt {
                halted = true;
                break;
            }
        }

        if !halted {
            return RunOutcome::Completed;
        }

        for step in ran.iter().rev() {
            step.cleanup(ctx, driver).await;
        }
        RunOutcome::Halted
    }
}
