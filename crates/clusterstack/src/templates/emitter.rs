//! Serialization of the generated documents and the checks of their ceilings.

use stackdoc::{FileFormat, Template, format_content};

use crate::Error;
use crate::aws::bucket::TEMPLATES_DIR;
use crate::aws::store::StagedAsset;
use crate::common::error::DocumentLimit;
use crate::limits::ResourceLimits;
use crate::templates::compute_fleet::NestedTemplate;

pub const ROOT_TEMPLATE_NAME: &str = "cluster-template.yaml";
const ROOT_FORMAT: FileFormat = FileFormat::Yaml;
const NESTED_FORMAT: FileFormat = FileFormat::MinifiedJson;

/// A serialized nested document.
#[derive(Debug, Clone)]
pub struct AssetMetadata {
    /// Logical id of the resource of the root document creating the nested stack.
    pub id: String,
    pub file_name: String,
    pub template: Template,
    pub content: String,
}

/// Result of a build: the root document and every nested document, serialized.
#[derive(Debug, Clone)]
pub struct EmittedStack {
    pub root: Template,
    pub root_content: String,
    /// In partition order.
    pub assets: Vec<AssetMetadata>,
}

impl EmittedStack {
    /// Nested documents named by their key under the artifact directory.
    pub fn staged_assets(&self) -> Vec<StagedAsset> {
        self.assets
            .iter()
            .map(|asset| StagedAsset {
                content: asset.content.clone(),
                name: format!("{TEMPLATES_DIR}/{}", asset.file_name),
            })
            .collect()
    }

    pub fn find_asset_with_resource(&self, logical_id: &str) -> Option<&AssetMetadata> {
        self.assets
            .iter()
            .find(|asset| asset.template.resource(logical_id).is_some())
    }
}

/// Document ceilings are exclusive: a document must stay strictly below each of them.
fn check(document: &str, kind: DocumentLimit, actual: usize, limit: usize) -> crate::Result<()> {
    if actual >= limit {
        return Err(Error::DocumentLimitExceeded {
            document: document.to_string(),
            kind,
            actual,
            limit,
        });
    }
    Ok(())
}

fn check_document(
    document: &str,
    template: &Template,
    content: &str,
    limits: &ResourceLimits,
) -> crate::Result<()> {
    check(
        document,
        DocumentLimit::Size,
        content.len(),
        limits.max_template_bytes,
    )?;
    check(
        document,
        DocumentLimit::Resources,
        template.resource_count(),
        limits.max_resources_per_template,
    )?;
    check(
        document,
        DocumentLimit::Outputs,
        template.outputs.len(),
        limits.max_outputs_per_template,
    )?;
    log::debug!(
        "Document {document}: {} bytes, {} resources, {} parameters, {} outputs",
        content.len(),
        template.resource_count(),
        template.parameters.len(),
        template.outputs.len()
    );
    Ok(())
}

/// Serializes all documents, failing when any of them exceeds a ceiling.
pub fn emit(
    root: Template,
    nested: Vec<NestedTemplate>,
    limits: &ResourceLimits,
) -> crate::Result<EmittedStack> {
    let assets = nested
        .into_iter()
        .map(|nested| {
            let content = format_content(&nested.template, NESTED_FORMAT)?;
            check(
                &nested.file_name,
                DocumentLimit::Parameters,
                nested.template.parameters.len(),
                limits.max_parameters_per_nested_stack,
            )?;
            check_document(&nested.file_name, &nested.template, &content, limits)?;
            Ok(AssetMetadata {
                id: nested.logical_id,
                file_name: nested.file_name,
                template: nested.template,
                content,
            })
        })
        .collect::<crate::Result<Vec<_>>>()?;

    let root_content = format_content(&root, ROOT_FORMAT)?;
    check_document(ROOT_TEMPLATE_NAME, &root, &root_content, limits)?;
    log::info!(
        "Generated {ROOT_TEMPLATE_NAME} with {} nested document(s)",
        assets.len()
    );
    Ok(EmittedStack {
        root,
        root_content,
        assets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stackdoc::Resource;

    fn nested(resources: usize) -> NestedTemplate {
        let mut template = Template::new("nested");
        for index in 0..resources {
            template
                .add_resource(
                    format!("Group{index}"),
                    Resource::new("AWS::EC2::PlacementGroup", json!({"Strategy": "cluster"})),
                )
                .unwrap();
        }
        NestedTemplate {
            logical_id: "ComputeFleetQueueGroupANestedStack".to_string(),
            file_name: "ComputeFleetQueueGroupANestedStack.json".to_string(),
            template,
        }
    }

    #[test]
    fn emits_nested_documents() {
        let emitted = emit(
            Template::new("root"),
            vec![nested(2)],
            &ResourceLimits::default(),
        )
        .unwrap();
        assert_eq!(emitted.assets.len(), 1);
        assert!(emitted.find_asset_with_resource("Group1").is_some());
        assert!(emitted.find_asset_with_resource("Group2").is_none());
        let staged = emitted.staged_assets();
        assert_eq!(
            staged[0].name,
            "templates/ComputeFleetQueueGroupANestedStack.json"
        );
        assert!(!staged[0].content.contains('\n'));
    }

    #[test]
    fn resource_ceiling() {
        let limits = ResourceLimits {
            max_resources_per_template: 2,
            ..Default::default()
        };
        let err = emit(Template::new("root"), vec![nested(3)], &limits).unwrap_err();
        assert!(matches!(
            err,
            Error::DocumentLimitExceeded {
                kind: DocumentLimit::Resources,
                actual: 3,
                limit: 2,
                ..
            }
        ));
    }

    #[test]
    fn size_ceiling() {
        let limits = ResourceLimits {
            max_template_bytes: 64,
            ..Default::default()
        };
        let err = emit(Template::new("root"), vec![nested(1)], &limits).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"Document ComputeFleetQueueGroupANestedStack.json exceeds the maximum size in bytes: 159 >= 64");
    }

    #[test]
    fn ceilings_are_exclusive() {
        let limits = ResourceLimits {
            max_resources_per_template: 3,
            ..Default::default()
        };
        assert!(emit(Template::new("root"), vec![nested(2)], &limits).is_ok());
        let err = emit(Template::new("root"), vec![nested(3)], &limits).unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"Document ComputeFleetQueueGroupANestedStack.json exceeds the maximum resource count: 3 >= 3");
    }
}
