//! Test helpers: fixtures that compose valid pipelines and assertions over
//! the result.

mod assertions;
mod fixtures;

pub use assertions::{assert_run_order_ascending, assert_stage_order, assert_validation_code};
pub use fixtures::{TestPipelineFixture, FIXTURE_IMAGE};
