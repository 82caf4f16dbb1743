//! IAM identity of the cluster nodes.

use serde_json::{Value, json};
use stackdoc::intrinsic::{PARTITION, STACK_ID, get_att, join, reference};
use stackdoc::{Resource, Template};

use crate::model::SchedulerKind;
use crate::model::cluster::{IamPolicy, RoleSource, resource_name_from_arn};
use crate::templates::StackContext;
use crate::templates::naming::{
    DYNAMODB_TABLE, HOSTED_ZONE, SLURM_DYNAMODB_TABLE, instance_profile_id, policies_id, role_id,
};

const IAM_PATH: &str = "/parallelcluster/";

/// How a launch template refers to the identity of its nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeIam {
    /// Value of the `IamInstanceProfile` property of a launch template.
    pub instance_profile: Value,
    pub instance_profile_arn: Value,
    /// Logical id of the role created with the cluster.
    pub role_id: Option<String>,
}

impl NodeIam {
    /// Name of the managed role, for resources that reference it by name.
    pub fn role_name(&self) -> Option<Value> {
        self.role_id.as_deref().map(reference)
    }
}

fn partition_arn(service_path: &str) -> Value {
    join("", vec![json!("arn:"), reference(PARTITION), json!(service_path)])
}

fn assume_role_policy(service: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {"Service": [service]},
            "Action": ["sts:AssumeRole"],
        }],
    })
}

pub(crate) fn service_role(service: &str, managed_policies: Vec<Value>) -> Resource {
    Resource::new(
        "AWS::IAM::Role",
        json!({
            "AssumeRolePolicyDocument": assume_role_policy(service),
            "ManagedPolicyArns": managed_policies,
            "Path": IAM_PATH,
        }),
    )
}

pub(crate) fn aws_managed_policy(name: &str) -> Value {
    partition_arn(&format!(":iam::aws:policy/{name}"))
}

/// Adds the identity of a node class.
///
/// A managed role gets a role, its policies and an instance profile. A user role only gets an
/// instance profile and a user instance profile is referenced as it is.
pub fn add_node_iam(
    template: &mut Template,
    node: &str,
    source: &RoleSource,
    statements: Vec<Value>,
    additional_policies: &[IamPolicy],
) -> crate::Result<NodeIam> {
    let profile_id = instance_profile_id(node);
    let roles = match source {
        RoleSource::InstanceProfile(arn) => {
            return Ok(NodeIam {
                instance_profile: json!({"Arn": arn}),
                instance_profile_arn: json!(arn),
                role_id: None,
            });
        }
        RoleSource::InstanceRole(arn) => vec![json!(resource_name_from_arn(arn))],
        RoleSource::Managed => {
            let role = role_id(node);
            let mut managed_policies = vec![aws_managed_policy("CloudWatchAgentServerPolicy")];
            managed_policies.extend(
                additional_policies
                    .iter()
                    .map(|policy| json!(policy.policy)),
            );
            template.add_resource(&role, service_role("ec2.amazonaws.com", managed_policies))?;
            template.add_resource(
                policies_id(node),
                Resource::new(
                    "AWS::IAM::Policy",
                    json!({
                        "PolicyName": "parallelcluster",
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": statements,
                        },
                        "Roles": [reference(&role)],
                    }),
                ),
            )?;
            vec![reference(&role)]
        }
    };
    template.add_resource(
        &profile_id,
        Resource::new(
            "AWS::IAM::InstanceProfile",
            json!({"Roles": roles, "Path": IAM_PATH}),
        ),
    )?;
    Ok(NodeIam {
        instance_profile: json!({"Name": reference(&profile_id)}),
        instance_profile_arn: get_att(&profile_id, "Arn"),
        role_id: source.is_managed().then(|| role_id(node)),
    })
}

fn statement(sid: &str, actions: &[&str], resource: Value) -> Value {
    json!({
        "Sid": sid,
        "Effect": "Allow",
        "Action": actions,
        "Resource": resource,
    })
}

fn bucket_objects(ctx: &StackContext) -> Value {
    partition_arn(&format!(
        ":s3:::{}/{}/*",
        ctx.bucket.name, ctx.bucket.artifact_directory
    ))
}

/// Permissions of the head node.
pub fn head_node_statements(ctx: &StackContext) -> Vec<Value> {
    let mut statements = vec![
        statement(
            "Ec2",
            &[
                "ec2:DescribeInstanceAttribute",
                "ec2:DescribeInstances",
                "ec2:DescribeInstanceStatus",
                "ec2:DescribeVolumes",
                "ec2:CreateTags",
            ],
            json!("*"),
        ),
        statement(
            "CloudFormation",
            &[
                "cloudformation:DescribeStacks",
                "cloudformation:DescribeStackResource",
                "cloudformation:SignalResource",
            ],
            reference(STACK_ID),
        ),
        statement("S3GetObj", &["s3:GetObject"], bucket_objects(ctx)),
    ];
    match ctx.kind() {
        SchedulerKind::Slurm => {
            statements.push(statement(
                "Ec2TagsAndVolumes",
                &[
                    "ec2:AttachVolume",
                    "ec2:RunInstances",
                    "ec2:TerminateInstances",
                    "ec2:CreateFleet",
                ],
                json!("*"),
            ));
            statements.push(statement(
                "DynamoDBTable",
                &[
                    "dynamodb:PutItem",
                    "dynamodb:BatchWriteItem",
                    "dynamodb:GetItem",
                    "dynamodb:Query",
                ],
                json!([
                    get_att(DYNAMODB_TABLE, "Arn"),
                    get_att(SLURM_DYNAMODB_TABLE, "Arn")
                ]),
            ));
            if ctx.has_managed_hosted_zone() {
                statements.push(statement(
                    "Route53",
                    &["route53:ChangeResourceRecordSets"],
                    partition_arn_with_ref(":route53:::hostedzone/", HOSTED_ZONE),
                ));
            }
        }
        SchedulerKind::Plugin => statements.push(statement(
            "DynamoDBTable",
            &["dynamodb:PutItem", "dynamodb:GetItem", "dynamodb:Query"],
            get_att(DYNAMODB_TABLE, "Arn"),
        )),
        SchedulerKind::AwsBatch => statements.push(statement(
            "Batch",
            &[
                "batch:SubmitJob",
                "batch:RegisterJobDefinition",
                "batch:DescribeJobQueues",
                "batch:DescribeComputeEnvironments",
            ],
            json!("*"),
        )),
    }
    statements
}

fn partition_arn_with_ref(service_path: &str, logical_id: &str) -> Value {
    join(
        "",
        vec![
            json!("arn:"),
            reference(PARTITION),
            json!(service_path),
            reference(logical_id),
        ],
    )
}

/// Permissions of the compute nodes.
pub fn compute_statements(ctx: &StackContext) -> Vec<Value> {
    let mut statements = vec![
        statement(
            "Ec2",
            &["ec2:DescribeInstanceAttribute", "ec2:DescribeInstances"],
            json!("*"),
        ),
        statement("S3GetObj", &["s3:GetObject"], bucket_objects(ctx)),
    ];
    if ctx.kind() == SchedulerKind::Slurm {
        statements.push(statement(
            "DynamoDBTable",
            &["dynamodb:GetItem", "dynamodb:Query"],
            get_att(DYNAMODB_TABLE, "Arn"),
        ));
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(source: RoleSource) -> (Template, NodeIam) {
        let mut template = Template::new("test");
        let iam = add_node_iam(&mut template, "queue1", &source, vec![], &[]).unwrap();
        (template, iam)
    }

    #[test]
    fn managed_role() {
        let (template, iam) = build(RoleSource::Managed);
        assert_eq!(template.resource_count(), 3);
        let role = role_id("queue1");
        assert!(template.resource(&role).is_some());
        assert_eq!(iam.role_name(), Some(reference(&role)));
        assert_eq!(
            iam.instance_profile,
            json!({"Name": reference(&instance_profile_id("queue1"))})
        );
    }

    #[test]
    fn user_role() {
        let (template, iam) = build(RoleSource::InstanceRole(
            "arn:aws:iam::123456789012:role/path/my-role".to_string(),
        ));
        assert_eq!(template.resource_count(), 1);
        let profile = template.resource(&instance_profile_id("queue1")).unwrap();
        assert_eq!(profile.property("Roles"), Some(&json!(["my-role"])));
        assert_eq!(iam.role_name(), None);
    }

    #[test]
    fn user_instance_profile() {
        let arn = "arn:aws:iam::123456789012:instance-profile/my-profile";
        let (template, iam) = build(RoleSource::InstanceProfile(arn.to_string()));
        assert_eq!(template.resource_count(), 0);
        assert_eq!(iam.instance_profile, json!({"Arn": arn}));
        assert_eq!(iam.instance_profile_arn, json!(arn));
    }
}
