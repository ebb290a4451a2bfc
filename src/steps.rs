//! Concrete provisioning steps for the image-baking pipeline.
//!
//! The steps communicate exclusively through the shared [`BuildContext`]:
//! each one stores what it created before returning
//! [`StepAction::Continue`], and later steps read those entries back. Only
//! the instance step owns a remote resource that must be rolled back on
//! halt; the produced image is deliberately left alone because its deletion
//! belongs to the artifact returned to the caller.

use crate::context::BuildContext;
use crate::driver::Driver;
use crate::keypair::SshKeyPair;
use crate::step::{BuildError, Step, StepAction, StepFuture};

/// Lifecycle states an instance passes through while it boots.
pub const INSTANCE_WAIT_STATES: &[&str] = &["PROVISIONING", "STARTING"];
/// Terminal state of a successfully booted instance.
pub const INSTANCE_RUNNING: &str = "RUNNING";
/// Lifecycle states an instance passes through while it shuts down.
pub const INSTANCE_TERMINATING_STATES: &[&str] = &["TERMINATING"];
/// Terminal state of a fully terminated instance.
pub const INSTANCE_TERMINATED: &str = "TERMINATED";

/// Generates the temporary SSH key pair injected into the new instance.
///
/// Runs entirely locally; there is no remote resource to roll back.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyPairStep;

impl<D: Driver> Step<D> for KeyPairStep {
    fn name(&self) -> &'static str {
        "generate-ssh-key"
    }

    fn run<'a>(
        &'a self,
        ctx: &'a mut BuildContext<D::Error>,
        _driver: &'a D,
    ) -> StepFuture<'a, StepAction> {
        Box::pin(async move {
            match SshKeyPair::generate() {
                Ok(pair) => {
                    ctx.set_key_pair(pair);
                    StepAction::Continue
                }
                Err(err) => {
                    ctx.record_error(BuildError::KeyPair(err));
                    StepAction::Halt
                }
            }
        })
    }
}

/// Launches the compute instance and waits for it to reach the running
/// state.
#[derive(Clone, Copy, Debug, Default)]
pub struct CreateInstanceStep;

impl<D: Driver> Step<D> for CreateInstanceStep {
    fn name(&self) -> &'static str {
        "create-instance"
    }

    fn run<'a>(
        &'a self,
        ctx: &'a mut BuildContext<D::Error>,
        driver: &'a D,
    ) -> StepFuture<'a, StepAction> {
        Box::pin(async move {
            let public_key = match ctx.key_pair() {
                Ok(pair) => pair.public_key.clone(),
                Err(err) => {
                    ctx.record_error(BuildError::Context(err));
                    return StepAction::Halt;
                }
            };

            let instance_id = match driver.create_instance(&public_key).await {
                Ok(id) => id,
                Err(err) => {
                    ctx.record_error(BuildError::Provision(err));
                    return StepAction::Halt;
                }
            };
            // Stored before the wait so cleanup can find the instance even
            // when it never converges.
            ctx.set_instance_id(instance_id.clone());

            if let Err(err) = driver
                .wait_for_instance_state(&instance_id, INSTANCE_WAIT_STATES, INSTANCE_RUNNING)
                .await
            {
                ctx.record_error(BuildError::InstanceConverge(err));
                return StepAction::Halt;
            }
            StepAction::Continue
        })
    }

    fn cleanup<'a>(
        &'a self,
        ctx: &'a mut BuildContext<D::Error>,
        driver: &'a D,
    ) -> StepFuture<'a, ()> {
        Box::pin(async move {
            // Run may have halted before an instance existed.
            let Some(instance_id) = ctx.instance_id_opt().map(str::to_owned) else {
                return;
            };

            if let Err(err) = driver.terminate_instance(&instance_id).await {
                ctx.push_cleanup_note(format!(
                    "failed to terminate instance {instance_id}; clean it up manually: {err}"
                ));
                return;
            }

            if let Err(err) = driver
                .wait_for_instance_state(
                    &instance_id,
                    INSTANCE_TERMINATING_STATES,
                    INSTANCE_TERMINATED,
                )
                .await
            {
                ctx.push_cleanup_note(format!(
                    "instance {instance_id} may not have terminated cleanly: {err}"
                ));
            }
        })
    }
}

/// Resolves the address the instance is reachable at.
///
/// Purely informational: no remote side effect, so no cleanup.
#[derive(Clone, Copy, Debug, Default)]
pub struct InstanceInfoStep;

impl<D: Driver> Step<D> for InstanceInfoStep {
    fn name(&self) -> &'static str {
        "instance-info"
    }

    fn run<'a>(
        &'a self,
        ctx: &'a mut BuildContext<D::Error>,
        driver: &'a D,
    ) -> StepFuture<'a, StepAction> {
        Box::pin(async move {
            let instance_id = match ctx.instance_id() {
                Ok(id) => id.to_owned(),
                Err(err) => {
                    ctx.record_error(BuildError::Context(err));
                    return StepAction::Halt;
                }
            };

            match driver.get_instance_ip(&instance_id).await {
                Ok(address) => {
                    ctx.set_instance_ip(address);
                    StepAction::Continue
                }
                Err(err) => {
                    ctx.record_error(BuildError::InstanceInfo(err));
                    StepAction::Halt
                }
            }
        })
    }
}

/// Snapshots the instance into a custom image and waits until the platform
/// finishes assembling it.
///
/// No cleanup: a halt in a later step must not delete an image the caller
/// may still want, and the artifact's own destroy operation covers deletion
/// after a successful run.
#[derive(Clone, Copy, Debug, Default)]
pub struct CreateImageStep;

impl<D: Driver> Step<D> for CreateImageStep {
    fn name(&self) -> &'static str {
        "create-image"
    }

    fn run<'a>(
        &'a self,
        ctx: &'a mut BuildContext<D::Error>,
        driver: &'a D,
    ) -> StepFuture<'a, StepAction> {
        Box::pin(async move {
            let instance_id = match ctx.instance_id() {
                Ok(id) => id.to_owned(),
                Err(err) => {
                    ctx.record_error(BuildError::Context(err));
                    return StepAction::Halt;
                }
            };

            let image = match driver.create_image(&instance_id).await {
                Ok(image) => image,
                Err(err) => {
                    ctx.record_error(BuildError::ImageCreate(err));
                    return StepAction::Halt;
                }
            };

            if let Err(err) = driver.wait_for_image_creation(&image.id).await {
                ctx.record_error(BuildError::ImageConverge(err));
                return StepAction::Halt;
            }

            ctx.set_image(image);
            StepAction::Continue
        })
    }
}
