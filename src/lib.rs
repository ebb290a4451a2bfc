//! Core library for the Kiln image-baking tool.
//!
//! Kiln bakes a custom machine image by driving a temporary cloud instance
//! through a fixed provisioning pipeline: generate a throwaway SSH key
//! pair, launch an instance with the public key injected, wait until it is
//! running, resolve its address, snapshot it into an image, and tear the
//! instance down. The crate exposes the pipeline core (steps, runner,
//! shared context), the polling waiter the lifecycle waits are built on,
//! the driver abstraction, and an adapter for an OCI-compatible cloud.

pub mod artifact;
pub mod builder;
pub mod cli;
pub mod config;
pub mod context;
pub mod driver;
pub mod keypair;
pub mod oci;
pub mod pipeline;
pub mod step;
pub mod steps;
pub mod test_support;
pub mod waiter;

pub use artifact::Artifact;
pub use builder::{BuildFailure, BuildOrchestrator};
pub use config::{ConfigError, OciConfig};
pub use context::{BuildContext, ContextError};
pub use driver::{Driver, DriverFuture, ImageHandle};
pub use keypair::{KeyPairError, SshKeyPair};
pub use oci::{OciDriver, OciDriverError};
pub use pipeline::{RunOutcome, StepRunner};
pub use step::{BuildError, Step, StepAction, StepFuture};
pub use steps::{CreateImageStep, CreateInstanceStep, InstanceInfoStep, KeyPairStep};
pub use waiter::{WaitError, WaitPolicy, wait_for_state};
