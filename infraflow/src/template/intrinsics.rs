//! Intrinsic-function helpers for template values.

use serde_json::{json, Value};

/// `{"Ref": id}`
#[must_use]
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [id, attribute]}`
#[must_use]
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::Join": ["", parts]}`
#[must_use]
pub fn concat(parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": ["", parts] })
}

/// The `index`-th availability zone of the stack's region.
#[must_use]
pub fn availability_zone(index: usize) -> Value {
    json!({ "Fn::Select": [index, { "Fn::GetAZs": "" }] })
}

/// The partition pseudo-parameter.
#[must_use]
pub fn partition() -> Value {
    reference("AWS::Partition")
}

/// `arn:<partition>:<service>:<region>:<account>:<resource>` where the
/// resource part may itself be an intrinsic.
#[must_use]
pub fn arn(service: &str, region: &str, account: &str, resource: Value) -> Value {
    concat(vec![
        json!("arn:"),
        partition(),
        json!(format!(":{service}:{region}:{account}:")),
        resource,
    ])
}
