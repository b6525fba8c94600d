//! Assertions over composed pipelines.

use crate::errors::PipelineValidationError;
use crate::pipeline::Pipeline;

/// Asserts the pipeline's stages, in execution order.
pub fn assert_stage_order(pipeline: &Pipeline, expected: &[&str]) {
    assert_eq!(
        pipeline.stage_names(),
        expected,
        "Unexpected stage order in pipeline '{}'",
        pipeline.name()
    );
}

/// Asserts that the named actions exist in `stage` with strictly ascending
/// run-orders, in the order given.
pub fn assert_run_order_ascending(pipeline: &Pipeline, stage: &str, actions: &[&str]) {
    let stage_ref = pipeline
        .stage(stage)
        .unwrap_or_else(|| panic!("Expected stage '{stage}' in pipeline '{}'", pipeline.name()));

    let orders: Vec<u32> = actions
        .iter()
        .map(|name| {
            stage_ref
                .action(name)
                .unwrap_or_else(|| panic!("Expected action '{name}' in stage '{stage}'"))
                .run_order
        })
        .collect();

    assert!(
        orders.windows(2).all(|pair| pair[0] < pair[1]),
        "Expected strictly ascending run-orders for {actions:?} in stage '{stage}', got {orders:?}"
    );
}

/// Asserts that `result` failed with the given contract code.
pub fn assert_validation_code<T: std::fmt::Debug>(
    result: &Result<T, PipelineValidationError>,
    code: &str,
) {
    match result {
        Ok(value) => panic!("Expected validation error {code}, got Ok({value:?})"),
        Err(err) => assert_eq!(
            err.code(),
            Some(code),
            "Expected code {code}, got error: {err}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DUPLICATE_STAGE;
    use crate::testing::TestPipelineFixture;

    #[test]
    fn test_stage_order_passes() {
        let pipeline = TestPipelineFixture::default().standard().unwrap();
        assert_stage_order(&pipeline, &["Source", "Build", "Test"]);
        assert_run_order_ascending(&pipeline, "Test", &["CreateTestResources", "DeleteTestResources"]);
    }

    #[test]
    #[should_panic(expected = "Unexpected stage order")]
    fn test_stage_order_fails() {
        let pipeline = TestPipelineFixture::default().standard().unwrap();
        assert_stage_order(&pipeline, &["Build", "Source", "Test"]);
    }

    #[test]
    #[should_panic(expected = "strictly ascending")]
    fn test_run_order_fails() {
        let pipeline = TestPipelineFixture::default().standard().unwrap();
        assert_run_order_ascending(&pipeline, "Test", &["DeleteTestResources", "RunTests"]);
    }

    #[test]
    fn test_validation_code() {
        let fixture = TestPipelineFixture::default();
        let result = fixture
            .with_source()
            .unwrap()
            .stage("Source", vec![fixture.approval("Again", 1)]);
        assert_validation_code(&result, DUPLICATE_STAGE);
    }
}
