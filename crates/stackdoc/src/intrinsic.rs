//! Constructors for intrinsic function values (`Ref`, `Fn::GetAtt`, `Fn::Join`, ...).
use serde_json::{Value, json};

pub const ACCOUNT_ID: &str = "AWS::AccountId";
pub const PARTITION: &str = "AWS::Partition";
pub const REGION: &str = "AWS::Region";
pub const STACK_ID: &str = "AWS::StackId";
pub const STACK_NAME: &str = "AWS::StackName";
pub const URL_SUFFIX: &str = "AWS::URLSuffix";

pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

pub fn join(separator: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [separator, parts] })
}

pub fn sub(text: &str) -> Value {
    json!({ "Fn::Sub": text })
}

pub fn base64(value: Value) -> Value {
    json!({ "Fn::Base64": value })
}

/// Returns true when the value is a single-key object naming an intrinsic function.
pub fn is_intrinsic(value: &Value) -> bool {
    match value.as_object() {
        Some(object) if object.len() == 1 => object
            .keys()
            .next()
            .is_some_and(|key| key == "Ref" || key.starts_with("Fn::")),
        _ => false,
    }
}

/// Pseudo parameters that resolve to the same value in a parent document and in its nested
/// documents. `AWS::StackId` and `AWS::StackName` differ between the two.
pub fn is_global_pseudo_parameter(name: &str) -> bool {
    matches!(name, ACCOUNT_ID | PARTITION | REGION | URL_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_intrinsics() {
        assert!(is_intrinsic(&reference("HeadNode")));
        assert!(is_intrinsic(&get_att("HeadNode", "PrivateIp")));
        assert!(is_intrinsic(&join(",", vec![])));
        assert!(!is_intrinsic(&json!({"Ref": "A", "Other": 1})));
        assert!(!is_intrinsic(&json!({"Key": "Value"})));
        assert!(!is_intrinsic(&json!("Ref")));
    }
}
