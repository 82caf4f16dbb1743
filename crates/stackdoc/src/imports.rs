use serde_json::Value;

use crate::intrinsic::{is_global_pseudo_parameter, is_intrinsic, reference};
use crate::ids::sanitize_logical_id;
use crate::template::{Parameter, Template};
use crate::Map;

/// Values of a parent document that a nested document needs.
///
/// A nested document cannot reference resources of its parent directly. Every `Ref`/`Fn::GetAtt`
/// that points into the parent is replaced by a reference to a parameter of the nested document,
/// and the parent passes the original value through the nested stack resource's `Parameters`.
#[derive(Clone, Debug, Default)]
pub struct StackImports {
    parameters: Map<String, Value>,
}

impl StackImports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrites a value built for the parent document so that it is valid in the nested one.
    pub fn import(&mut self, value: &Value) -> Value {
        match value {
            Value::Object(object) => match object.iter().next() {
                Some((name, args)) if is_intrinsic(value) => {
                    self.import_intrinsic(name, args, value)
                }
                _ => Value::Object(
                    object
                        .iter()
                        .map(|(key, item)| (key.clone(), self.import(item)))
                        .collect(),
                ),
            },
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.import(item)).collect())
            }
            value => value.clone(),
        }
    }

    fn import_intrinsic(&mut self, name: &str, args: &Value, value: &Value) -> Value {
        match (name, args) {
            ("Ref", Value::String(target)) if is_global_pseudo_parameter(target) => value.clone(),
            ("Ref", Value::String(target)) => {
                let parameter = format!("{}Ref", sanitize_logical_id(target));
                self.register(parameter, value)
            }
            ("Fn::GetAtt", Value::Array(parts)) => {
                let parameter: String = parts
                    .iter()
                    .filter_map(Value::as_str)
                    .map(sanitize_logical_id)
                    .collect();
                self.register(parameter, value)
            }
            (name, args) => {
                let mut object = serde_json::Map::new();
                object.insert(name.to_string(), self.import(args));
                Value::Object(object)
            }
        }
    }

    fn register(&mut self, mut parameter: String, value: &Value) -> Value {
        if let Some(existing) = self.parameters.get(&parameter) {
            if existing != value {
                let digest = crate::ids::digest_hex(value.to_string().as_bytes());
                parameter = format!("{parameter}{}", &digest[..8]);
            }
        }
        self.parameters.insert(parameter.clone(), value.clone());
        reference(&parameter)
    }

    /// Parameter name to the value the parent document has to pass.
    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Declares all imported parameters in the nested document.
    pub fn declare_in(&self, template: &mut Template) {
        for name in self.parameters.keys() {
            template.add_parameter(name.clone(), Parameter::string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intrinsic::{get_att, join};
    use serde_json::json;

    #[test]
    fn parent_references_become_parameters() {
        let mut imports = StackImports::new();
        let value = join(
            "",
            vec![
                json!("table="),
                reference("DynamoDBTable"),
                json!(" ip="),
                get_att("HeadNode", "PrivateIp"),
                json!(" region="),
                reference("AWS::Region"),
            ],
        );

        assert_eq!(
            imports.import(&value),
            join(
                "",
                vec![
                    json!("table="),
                    reference("DynamoDBTableRef"),
                    json!(" ip="),
                    reference("HeadNodePrivateIp"),
                    json!(" region="),
                    reference("AWS::Region"),
                ],
            )
        );
        assert_eq!(
            imports.parameters().keys().collect::<Vec<_>>(),
            vec!["DynamoDBTableRef", "HeadNodePrivateIp"]
        );
    }

    #[test]
    fn stack_id_is_imported() {
        let mut imports = StackImports::new();
        assert_eq!(
            imports.import(&reference("AWS::StackId")),
            reference("AWSStackIdRef")
        );
        assert_eq!(
            imports.parameters().get("AWSStackIdRef"),
            Some(&reference("AWS::StackId"))
        );
    }

    #[test]
    fn repeated_import_reuses_parameter() {
        let mut imports = StackImports::new();
        imports.import(&reference("ComputeSecurityGroup"));
        imports.import(&json!([reference("ComputeSecurityGroup")]));
        assert_eq!(imports.len(), 1);
    }

    #[test]
    fn declare_parameters() {
        let mut imports = StackImports::new();
        imports.import(&reference("Table"));
        let mut template = Template::new("nested");
        imports.declare_in(&mut template);
        assert_eq!(template.parameters.get("TableRef"), Some(&Parameter::string()));
    }
}
