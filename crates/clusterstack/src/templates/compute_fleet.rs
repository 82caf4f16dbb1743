//! Nested documents holding the compute fleet, one per partition.

use serde_json::{Value, json};
use stackdoc::intrinsic::{get_att, reference};
use stackdoc::{Output, Resource, StackImports, Template};

use crate::templates::StackContext;
use crate::templates::dna::BootstrapDescriptor;
use crate::templates::iam::{add_node_iam, compute_statements};
use crate::templates::launch_template::{compute_launch_template, compute_user_data};
use crate::templates::naming::{launch_template_id, nested_output_key, placement_group_id};
use crate::templates::partition::Partition;

/// A nested document and the resource of the root document creating it.
#[derive(Debug, Clone)]
pub struct NestedTemplate {
    /// Logical id of the stack resource in the root document.
    pub logical_id: String,
    pub file_name: String,
    pub template: Template,
}

/// Launch template of a compute resource, as seen from the root document.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchTemplateRef {
    pub queue: String,
    pub compute_resource: String,
    pub logical_id: String,
    pub id: Value,
    pub version: Value,
}

/// Outputs of all compute fleet nested documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetOutputs {
    /// In configuration order of queues and compute resources.
    pub launch_templates: Vec<LaunchTemplateRef>,
    /// Names of the queue roles created with the cluster.
    pub role_names: Vec<Value>,
}

struct PartitionBuilder<'a, 'b> {
    ctx: &'a StackContext<'b>,
    partition: &'a Partition,
    stack_id: String,
    template: Template,
    imports: StackImports,
    outputs: &'a mut FleetOutputs,
}

impl PartitionBuilder<'_, '_> {
    /// Exports `value` of the nested document and returns how the root document reads it.
    fn export(&mut self, logical_id: &str, attribute: &str, value: Value) -> crate::Result<Value> {
        let key = nested_output_key(
            self.ctx.stack_name,
            &self.partition.name(),
            logical_id,
            attribute,
        );
        self.template.add_output(&key, Output::new(value))?;
        Ok(get_att(&self.stack_id, &format!("Outputs.{key}")))
    }

    fn add_queue(&mut self, index: usize, descriptor: &BootstrapDescriptor) -> crate::Result<()> {
        let ctx = self.ctx;
        let queue = &ctx.layout.queues[index];
        let statements = compute_statements(ctx)
            .iter()
            .map(|statement| self.imports.import(statement))
            .collect();
        let additional_policies = queue
            .queue
            .iam
            .as_ref()
            .map(|iam| iam.additional_iam_policies.as_slice())
            .unwrap_or_default();
        let iam = add_node_iam(
            &mut self.template,
            queue.name(),
            &queue.role,
            statements,
            additional_policies,
        )?;
        if let Some(role_id) = &iam.role_id {
            let role_name = self.export(role_id, "Ref", reference(role_id))?;
            self.outputs.role_names.push(role_name);
        }

        if queue.queue.is_managed_placement_group() {
            self.template.add_resource(
                placement_group_id(queue.name()),
                Resource::new("AWS::EC2::PlacementGroup", json!({"Strategy": "cluster"})),
            )?;
        }

        for compute_resource in &queue.compute_resources {
            let logical_id = launch_template_id(queue.name(), compute_resource.name());
            let user_data = compute_user_data(descriptor, queue.name(), compute_resource.name())?;
            let launch_template = compute_launch_template(
                ctx,
                &mut self.imports,
                queue,
                compute_resource,
                &iam,
                &user_data,
            );
            self.template.add_resource(&logical_id, launch_template)?;
            let id = self.export(&logical_id, "Ref", reference(&logical_id))?;
            let version = self.export(
                &logical_id,
                "LatestVersionNumber",
                get_att(&logical_id, "LatestVersionNumber"),
            )?;
            self.outputs.launch_templates.push(LaunchTemplateRef {
                queue: queue.name().to_string(),
                compute_resource: compute_resource.name().to_string(),
                logical_id,
                id,
                version,
            });
        }
        Ok(())
    }

    fn finish(self, root: &mut Template) -> crate::Result<NestedTemplate> {
        let PartitionBuilder {
            ctx,
            stack_id,
            mut template,
            imports,
            ..
        } = self;
        imports.declare_in(&mut template);
        let file_name = format!("{stack_id}.json");
        root.add_resource(
            &stack_id,
            Resource::new(
                "AWS::CloudFormation::Stack",
                json!({
                    "TemplateURL": ctx.bucket.template_url(&file_name),
                    "Parameters": imports.parameters(),
                }),
            ),
        )?;
        log::debug!(
            "Nested stack {stack_id} has {} resources and imports {} parameters",
            template.resource_count(),
            imports.len()
        );
        Ok(NestedTemplate {
            logical_id: stack_id,
            file_name,
            template,
        })
    }
}

/// Builds the nested document of every partition and references them from `root`.
pub fn add_compute_fleet(
    root: &mut Template,
    ctx: &StackContext,
    partitions: &[Partition],
    descriptor: &BootstrapDescriptor,
) -> crate::Result<(Vec<NestedTemplate>, FleetOutputs)> {
    let mut outputs = FleetOutputs::default();
    let mut nested = Vec::with_capacity(partitions.len());
    for partition in partitions {
        let mut builder = PartitionBuilder {
            ctx,
            partition,
            stack_id: partition.stack_logical_id(),
            template: Template::new(format!(
                "Compute fleet of cluster {}, {}",
                ctx.stack_name,
                partition.name()
            )),
            imports: StackImports::new(),
            outputs: &mut outputs,
        };
        for &index in &partition.queues {
            builder.add_queue(index, descriptor)?;
        }
        nested.push(builder.finish(root)?);
    }
    Ok((nested, outputs))
}
