//! Test support utilities shared across unit and integration tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::driver::{Driver, DriverFuture, ImageHandle};

/// Error type produced by [`ScriptedDriver`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{0}")]
pub struct ScriptedDriverError(
    /// Message describing the scripted failure.
    pub String,
);

type Script<T> = Mutex<VecDeque<Result<T, ScriptedDriverError>>>;

/// Scripted driver double that returns pre-seeded responses in FIFO order.
///
/// Every call is recorded so tests can assert on the exact sequence of
/// driver operations. An unscripted call fails rather than guessing, which
/// keeps scenarios deterministic: a test that triggers an operation it did
/// not plan for sees the failure immediately.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    calls: Mutex<Vec<String>>,
    create_instance: Script<String>,
    terminate_instance: Script<()>,
    instance_ips: Script<String>,
    create_image: Script<ImageHandle>,
    delete_image: Script<()>,
    instance_waits: Script<()>,
    image_waits: Script<()>,
}

impl ScriptedDriver {
    /// Creates a driver with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded calls in invocation order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Number of recorded calls whose rendering starts with `prefix`.
    #[must_use]
    pub fn calls_matching(&self, prefix: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// Queues a response for [`Driver::create_instance`].
    pub fn script_create_instance(&self, response: Result<&str, &str>) {
        push(&self.create_instance, response.map(str::to_owned));
    }

    /// Queues a response for [`Driver::terminate_instance`].
    pub fn script_terminate_instance(&self, response: Result<(), &str>) {
        push(&self.terminate_instance, response);
    }

    /// Queues a response for [`Driver::get_instance_ip`].
    pub fn script_instance_ip(&self, response: Result<&str, &str>) {
        push(&self.instance_ips, response.map(str::to_owned));
    }

    /// Queues a response for [`Driver::create_image`].
    pub fn script_create_image(&self, response: Result<ImageHandle, &str>) {
        push(&self.create_image, response);
    }

    /// Queues a response for [`Driver::delete_image`].
    pub fn script_delete_image(&self, response: Result<(), &str>) {
        push(&self.delete_image, response);
    }

    /// Queues a response for [`Driver::wait_for_instance_state`].
    pub fn script_instance_wait(&self, response: Result<(), &str>) {
        push(&self.instance_waits, response);
    }

    /// Queues a response for [`Driver::wait_for_image_creation`].
    pub fn script_image_wait(&self, response: Result<(), &str>) {
        push(&self.image_waits, response);
    }

    fn record(&self, call: String) {
        lock(&self.calls).push(call);
    }

    fn next<T>(script: &Script<T>, method: &str) -> Result<T, ScriptedDriverError> {
        lock(script).pop_front().unwrap_or_else(|| {
            Err(ScriptedDriverError(format!(
                "no scripted response for {method}"
            )))
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn push<T>(script: &Script<T>, response: Result<T, &str>) {
    lock(script).push_back(response.map_err(|message| ScriptedDriverError(message.to_owned())));
}

impl Driver for ScriptedDriver {
    type Error = ScriptedDriverError;

    fn create_instance<'a>(&'a self, public_key: &'a str) -> DriverFuture<'a, String, Self::Error> {
        self.record(format!("create_instance {public_key}"));
        Box::pin(std::future::ready(Self::next(
            &self.create_instance,
            "create_instance",
        )))
    }

    fn terminate_instance<'a>(&'a self, instance_id: &'a str) -> DriverFuture<'a, (), Self::Error> {
        self.record(format!("terminate_instance {instance_id}"));
        Box::pin(std::future::ready(Self::next(
            &self.terminate_instance,
            "terminate_instance",
        )))
    }

    fn get_instance_ip<'a>(&'a self, instance_id: &'a str) -> DriverFuture<'a, String, Self::Error> {
        self.record(format!("get_instance_ip {instance_id}"));
        Box::pin(std::future::ready(Self::next(
            &self.instance_ips,
            "get_instance_ip",
        )))
    }

    fn create_image<'a>(
        &'a self,
        instance_id: &'a str,
    ) -> DriverFuture<'a, ImageHandle, Self::Error> {
        self.record(format!("create_image {instance_id}"));
        Box::pin(std::future::ready(Self::next(
            &self.create_image,
            "create_image",
        )))
    }

    fn delete_image<'a>(&'a self, image_id: &'a str) -> DriverFuture<'a, (), Self::Error> {
        self.record(format!("delete_image {image_id}"));
        Box::pin(std::future::ready(Self::next(
            &self.delete_image,
            "delete_image",
        )))
    }

    fn wait_for_instance_state<'a>(
        &'a self,
        instance_id: &'a str,
        wait_states: &'a [&'a str],
        terminal_state: &'a str,
    ) -> DriverFuture<'a, (), Self::Error> {
        self.record(format!(
            "wait_for_instance_state {instance_id} {wait_states:?} -> {terminal_state}"
        ));
        Box::pin(std::future::ready(Self::next(
            &self.instance_waits,
            "wait_for_instance_state",
        )))
    }

    fn wait_for_image_creation<'a>(&'a self, image_id: &'a str) -> DriverFuture<'a, (), Self::Error> {
        self.record(format!("wait_for_image_creation {image_id}"));
        Box::pin(std::future::ready(Self::next(
            &self.image_waits,
            "wait_for_image_creation",
        )))
    }
}
