//! Shared constants for integration tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file
//! in `tests/`). Placing shared constants under `tests/common/` avoids
//! creating an additional integration test binary while still allowing reuse
//! via:
//!
//! ```rust
//! #[path = "common/test_constants.rs"]
//! mod test_constants;
//! ```

/// Instance identifier returned by scripted create-instance responses.
pub const TEST_INSTANCE_ID: &str = "i-1";
/// Image identifier returned by scripted create-image responses.
pub const TEST_IMAGE_ID: &str = "img-1";
/// Address returned by scripted instance-info responses.
pub const TEST_INSTANCE_IP: &str = "10.0.0.5";
