//! AWS Batch compute environments and job queues.
//!
//! AWS Batch manages its own fleet, so the whole compute side lives in the root document.

use serde_json::{Value, json};
use stackdoc::ids::create_hash_suffix;
use stackdoc::intrinsic::{get_att, reference};
use stackdoc::{Map, Resource, Template};

use crate::model::scheduling::CapacityType;
use crate::templates::StackContext;
use crate::templates::dna::BootstrapDescriptor;
use crate::templates::iam::{add_node_iam, aws_managed_policy, compute_statements, service_role};
use crate::templates::launch_template::compute_user_data;
use crate::templates::naming::launch_template_id;
use crate::templates::networking::compute_security_groups;
use crate::templates::tags::compute_tags;
use crate::templates::walker::{ComputeResourceLayout, QueueLayout};

const BATCH_SERVICE_ROLE: &str = "BatchServiceRole";
const SPOT_FLEET_ROLE: &str = "SpotIamFleetRole";

fn compute_environment_id(queue: &str, compute_resource: &str) -> String {
    format!(
        "ComputeEnvironment{}",
        create_hash_suffix(&format!("{queue}\t{compute_resource}"))
    )
}

fn job_queue_id(queue: &str) -> String {
    format!("JobQueue{}", create_hash_suffix(queue))
}

fn launch_template(ctx: &StackContext, user_data: Value) -> Resource {
    Resource::new(
        "AWS::EC2::LaunchTemplate",
        json!({"LaunchTemplateData": {
            "MetadataOptions": {"HttpTokens": ctx.cluster.imds.http_tokens()},
            "UserData": user_data,
        }}),
    )
}

fn compute_environment(
    ctx: &StackContext,
    queue: &QueueLayout,
    compute_resource: &ComputeResourceLayout,
    instance_role: &Value,
    template_id: &str,
) -> Resource {
    let vcpus = compute_resource.compute_resource.vcpus;
    let tags: Map<String, String> = compute_tags(ctx, queue.name(), compute_resource.name())
        .into_iter()
        .map(|tag| (tag.key, tag.value))
        .collect();
    let mut resources = json!({
        "Type": "EC2",
        "MinvCpus": vcpus.min,
        "DesiredvCpus": vcpus.desired,
        "MaxvCpus": vcpus.max,
        "InstanceTypes": compute_resource.compute_resource.instance_types.instance_types(),
        "Subnets": queue.queue.networking.subnet_ids,
        "SecurityGroupIds": compute_security_groups(queue.queue),
        "InstanceRole": instance_role,
        "LaunchTemplate": {
            "LaunchTemplateId": reference(template_id),
            "Version": "$Latest",
        },
        "Tags": tags,
    });
    if let Some(image_id) = queue.queue.custom_ami().or(ctx.cluster.image.custom_ami.as_deref()) {
        resources["ImageId"] = json!(image_id);
    }
    if queue.queue.capacity_type == CapacityType::Spot {
        resources["Type"] = json!("SPOT");
        resources["SpotIamFleetRole"] = get_att(SPOT_FLEET_ROLE, "Arn");
        if let Some(price) = compute_resource.compute_resource.spot_price {
            resources["BidPercentage"] = json!(price.round() as u32);
        }
    }
    Resource::new(
        "AWS::Batch::ComputeEnvironment",
        json!({
            "Type": "MANAGED",
            "State": "ENABLED",
            "ServiceRole": get_att(BATCH_SERVICE_ROLE, "Arn"),
            "ComputeResources": resources,
        }),
    )
}

/// Adds the AWS Batch roles and a compute environment per compute resource, the compute
/// environments of a queue are ordered in its job queue.
pub fn add_batch_resources(
    template: &mut Template,
    ctx: &StackContext,
    descriptor: &BootstrapDescriptor,
) -> crate::Result<()> {
    template.add_resource(
        BATCH_SERVICE_ROLE,
        service_role(
            "batch.amazonaws.com",
            vec![aws_managed_policy("service-role/AWSBatchServiceRole")],
        ),
    )?;
    if ctx
        .layout
        .queues
        .iter()
        .any(|queue| queue.queue.capacity_type == CapacityType::Spot)
    {
        template.add_resource(
            SPOT_FLEET_ROLE,
            service_role(
                "spotfleet.amazonaws.com",
                vec![aws_managed_policy("service-role/AmazonEC2SpotFleetTaggingRole")],
            ),
        )?;
    }

    for queue in &ctx.layout.queues {
        let additional_policies = queue
            .queue
            .iam
            .as_ref()
            .map(|iam| iam.additional_iam_policies.as_slice())
            .unwrap_or_default();
        let iam = add_node_iam(
            template,
            queue.name(),
            &queue.role,
            compute_statements(ctx),
            additional_policies,
        )?;
        if let Some(role) = iam
            .role_id
            .as_deref()
            .and_then(|role_id| template.resource_mut(role_id))
        {
            if let Some(policies) = role.properties["ManagedPolicyArns"].as_array_mut() {
                policies.push(aws_managed_policy(
                    "service-role/AmazonEC2ContainerServiceforEC2Role",
                ));
            }
        }

        let mut order = vec![];
        for compute_resource in &queue.compute_resources {
            let template_id = launch_template_id(queue.name(), compute_resource.name());
            let user_data = compute_user_data(descriptor, queue.name(), compute_resource.name())?;
            template.add_resource(&template_id, launch_template(ctx, user_data))?;

            let environment_id = compute_environment_id(queue.name(), compute_resource.name());
            template.add_resource(
                &environment_id,
                compute_environment(
                    ctx,
                    queue,
                    compute_resource,
                    &iam.instance_profile_arn,
                    &template_id,
                ),
            )?;
            let position = order.len() + 1;
            order.push(json!({
                "Order": position,
                "ComputeEnvironment": reference(&environment_id),
            }));
        }
        template.add_resource(
            job_queue_id(queue.name()),
            Resource::new(
                "AWS::Batch::JobQueue",
                json!({
                    "JobQueueName": format!("{}-{}", ctx.stack_name, queue.name()),
                    "Priority": 1,
                    "State": "ENABLED",
                    "ComputeEnvironmentOrder": order,
                }),
            ),
        )?;
    }
    Ok(())
}
