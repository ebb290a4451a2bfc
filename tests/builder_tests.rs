//! Tests for the build orchestrator and the artifact it reports.

#[path = "common/test_constants.rs"]
mod test_constants;

use kiln::driver::ImageHandle;
use kiln::step::BuildError;
use kiln::test_support::ScriptedDriver;
use kiln::{Artifact, BuildOrchestrator};

use test_constants::{TEST_IMAGE_ID, TEST_INSTANCE_ID, TEST_INSTANCE_IP};

fn test_image() -> ImageHandle {
    ImageHandle {
        id: TEST_IMAGE_ID.to_owned(),
        name: String::from("nightly"),
    }
}

fn scripted_happy_path() -> ScriptedDriver {
    let driver = ScriptedDriver::new();
    driver.script_create_instance(Ok(TEST_INSTANCE_ID));
    driver.script_instance_wait(Ok(()));
    driver.script_instance_ip(Ok(TEST_INSTANCE_IP));
    driver.script_create_image(Ok(test_image()));
    driver.script_image_wait(Ok(()));
    driver
}

/// A completed build reports the artifact and terminates the instance as an
/// explicit final action (terminate plus the terminated wait).
#[tokio::test]
async fn execute_returns_artifact_and_tears_down() {
    let driver = scripted_happy_path();
    driver.script_terminate_instance(Ok(()));
    driver.script_instance_wait(Ok(()));

    let orchestrator = BuildOrchestrator::new(driver);
    let artifact = orchestrator
        .execute()
        .await
        .unwrap_or_else(|err| panic!("build: {err}"));

    assert_eq!(artifact.id(), TEST_IMAGE_ID);
    assert_eq!(
        artifact.to_string(),
        format!("machine image nightly ({TEST_IMAGE_ID})")
    );
    assert_eq!(orchestrator.driver().calls_matching("terminate_instance"), 1);
}

/// A halting step surfaces its recorded error as the primary failure.
#[tokio::test]
async fn halting_step_error_is_the_primary_failure() {
    let driver = ScriptedDriver::new();
    driver.script_create_instance(Err("quota exceeded"));

    let orchestrator = BuildOrchestrator::new(driver);
    let failure = orchestrator
        .execute()
        .await
        .expect_err("provisioning failure must surface");

    assert!(
        matches!(failure.error, BuildError::Provision(_)),
        "unexpected error: {:?}",
        failure.error
    );
    assert!(
        failure.to_string().contains("failed to create instance"),
        "rendered: {failure}"
    );
    assert_eq!(orchestrator.driver().calls_matching("terminate_instance"), 0);
}

/// Teardown failure after a successful bake surfaces as an error that still
/// names the surviving image.
#[tokio::test]
async fn teardown_failure_names_the_surviving_image() {
    let driver = scripted_happy_path();
    driver.script_terminate_instance(Err("api unavailable"));

    let orchestrator = BuildOrchestrator::new(driver);
    let failure = orchestrator
        .execute()
        .await
        .expect_err("teardown failure must surface");

    assert!(
        matches!(failure.error, BuildError::Teardown(_)),
        "unexpected error: {:?}",
        failure.error
    );
    assert!(
        failure
            .cleanup_notes
            .first()
            .is_some_and(|note| note.contains(TEST_IMAGE_ID)),
        "notes: {:?}",
        failure.cleanup_notes
    );
}

/// Destroying the artifact deletes the image through the driver.
#[tokio::test]
async fn artifact_destroy_deletes_the_image() {
    let driver = ScriptedDriver::new();
    driver.script_delete_image(Ok(()));

    let artifact = Artifact::new(test_image());
    artifact
        .destroy(&driver)
        .await
        .unwrap_or_else(|err| panic!("destroy: {err}"));

    assert_eq!(driver.calls_matching("delete_image"), 1);
    assert!(
        driver
            .calls()
            .first()
            .is_some_and(|call| call.contains(TEST_IMAGE_ID)),
        "calls: {:?}",
        driver.calls()
    );
}
