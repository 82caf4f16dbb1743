use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Map};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// A single infrastructure document.
///
/// All sections are ordered maps, two templates built from the same input therefore render to the
/// same text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Parameter>,
    pub resources: Map<String, Resource>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub outputs: Map<String, Output>,
}

impl Template {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: Some(description.into()),
            parameters: Default::default(),
            resources: Default::default(),
            outputs: Default::default(),
        }
    }

    pub fn add_resource(
        &mut self,
        logical_id: impl Into<String>,
        resource: Resource,
    ) -> crate::Result<()> {
        let logical_id = logical_id.into();
        if self.resources.contains_key(&logical_id) {
            return Err(Error::DuplicateResource(logical_id));
        }
        self.resources.insert(logical_id, resource);
        Ok(())
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn resource_mut(&mut self, logical_id: &str) -> Option<&mut Resource> {
        self.resources.get_mut(logical_id)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Declares a parameter. Declaring the same parameter twice keeps the latest declaration.
    pub fn add_parameter(&mut self, name: impl Into<String>, parameter: Parameter) {
        self.parameters.insert(name.into(), parameter);
    }

    pub fn add_output(&mut self, name: impl Into<String>, output: Output) -> crate::Result<()> {
        let name = name.into();
        if self.outputs.contains_key(&name) {
            return Err(Error::DuplicateOutput(name));
        }
        self.outputs.insert(name, output);
        Ok(())
    }

    /// Iterates resources of the given type, e.g. `AWS::EC2::LaunchTemplate`.
    pub fn resources_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = (&'a String, &'a Resource)> + 'a {
        self.resources
            .iter()
            .filter(move |(_, resource)| resource.resource_type == resource_type)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub properties: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_replace_policy: Option<String>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, properties: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties,
            metadata: None,
            depends_on: vec![],
            deletion_policy: None,
            update_replace_policy: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    /// Keeps the physical resource when the stack is deleted or the resource is replaced.
    pub fn retained(mut self) -> Self {
        self.deletion_policy = Some("Retain".to_string());
        self.update_replace_policy = Some("Retain".to_string());
        self
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub parameter_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Parameter {
    pub fn string() -> Self {
        Self {
            parameter_type: "String".to_string(),
            default: None,
            description: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Output {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn duplicate_resource_is_rejected() {
        let mut template = Template::new("test");
        template
            .add_resource("Bucket", Resource::new("AWS::S3::Bucket", json!({})))
            .unwrap();
        let err = template
            .add_resource("Bucket", Resource::new("AWS::S3::Bucket", json!({})))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateResource(id) if id == "Bucket"));
        assert_eq!(template.resource_count(), 1);
    }

    #[test]
    fn empty_sections_are_not_rendered() {
        let mut template = Template::new("test");
        template
            .add_resource(
                "Queue",
                Resource::new("AWS::SQS::Queue", Value::Null).depends_on("Other"),
            )
            .unwrap();
        let value = serde_json::to_value(&template).unwrap();
        assert_eq!(
            value,
            json!({
                "AWSTemplateFormatVersion": "2010-09-09",
                "Description": "test",
                "Resources": {
                    "Queue": {"Type": "AWS::SQS::Queue", "DependsOn": ["Other"]}
                }
            })
        );
    }

    #[test]
    fn resources_of_type() {
        let mut template = Template::new("test");
        template
            .add_resource("A", Resource::new("AWS::EC2::Volume", json!({})))
            .unwrap();
        template
            .add_resource("B", Resource::new("AWS::EC2::Instance", json!({})))
            .unwrap();
        template
            .add_resource("C", Resource::new("AWS::EC2::Volume", json!({})))
            .unwrap();
        let ids: Vec<_> = template
            .resources_of_type("AWS::EC2::Volume")
            .map(|(id, _)| id.as_str())
            .collect();
        assert_eq!(ids, vec!["A", "C"]);
    }
}
