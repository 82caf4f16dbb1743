//! Lambda functions cleaning up cluster resources on deletion.

use serde_json::{Value, json};
use stackdoc::ids::digest_hex;
use stackdoc::intrinsic::{get_att, reference};
use stackdoc::{Resource, Template};

use crate::templates::StackContext;
use crate::templates::iam::{aws_managed_policy, service_role};
use crate::templates::naming::{CLUSTER_DNS_DOMAIN, HOSTED_ZONE};

pub const CLEANUP_RESOURCES_FUNCTION: &str = "CleanupResourcesFunction";
pub const CLEANUP_ROUTE53_FUNCTION: &str = "CleanupRoute53Function";
const LAMBDA_ROLE: &str = "CleanupResourcesRole";

const CUSTOM_RESOURCES_DIR: &str = "custom_resources";
const CUSTOM_RESOURCES_ARTIFACT: &str = "artifacts.zip";

fn function(ctx: &StackContext, name: &str, handler: &str) -> Resource {
    let suffix = &digest_hex(ctx.stack_name.as_bytes())[..8];
    let mut properties = json!({
        "FunctionName": format!("pcluster-{name}-{suffix}"),
        "Handler": handler,
        "Runtime": "python3.9",
        "Timeout": 900,
        "MemorySize": 128,
        "Role": get_att(LAMBDA_ROLE, "Arn"),
        "Code": {
            "S3Bucket": ctx.bucket.name,
            "S3Key": ctx.bucket.object_key(CUSTOM_RESOURCES_DIR, CUSTOM_RESOURCES_ARTIFACT),
        },
    });
    if let Some(vpc_config) = &ctx.cluster.deployment_settings.lambda_functions_vpc_config {
        properties["VpcConfig"] = json!(vpc_config);
    }
    Resource::new("AWS::Lambda::Function", properties)
}

fn custom_resource(function: &str, properties: Value) -> Resource {
    let mut properties = properties;
    properties["ServiceToken"] = get_att(function, "Arn");
    Resource::new("AWS::CloudFormation::CustomResource", properties)
}

/// Adds the cleanup functions, their role and the custom resources invoking them.
pub fn add_cleanup_functions(template: &mut Template, ctx: &StackContext) -> crate::Result<()> {
    let execution_policy = if ctx
        .cluster
        .deployment_settings
        .lambda_functions_vpc_config
        .is_some()
    {
        "service-role/AWSLambdaVPCAccessExecutionRole"
    } else {
        "service-role/AWSLambdaBasicExecutionRole"
    };
    let mut role = service_role(
        "lambda.amazonaws.com",
        vec![aws_managed_policy(execution_policy)],
    );
    role.properties["Policies"] = json!([{
        "PolicyName": "LambdaPolicy",
        "PolicyDocument": {
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Sid": "S3BucketPolicy",
                    "Effect": "Allow",
                    "Action": ["s3:DeleteObject", "s3:DeleteObjectVersion", "s3:ListBucket", "s3:ListBucketVersions"],
                    "Resource": "*",
                },
                {
                    "Sid": "Ec2Terminate",
                    "Effect": "Allow",
                    "Action": ["ec2:DescribeInstances", "ec2:TerminateInstances"],
                    "Resource": "*",
                },
                {
                    "Sid": "Route53",
                    "Effect": "Allow",
                    "Action": ["route53:ListResourceRecordSets", "route53:ChangeResourceRecordSets"],
                    "Resource": "*",
                },
            ],
        },
    }]);
    template.add_resource(LAMBDA_ROLE, role)?;

    template.add_resource(
        CLEANUP_RESOURCES_FUNCTION,
        function(ctx, "CleanupResources", "cleanup_resources.handler"),
    )?;
    template.add_resource(
        "CleanupResourcesS3BucketCustomResource",
        custom_resource(
            CLEANUP_RESOURCES_FUNCTION,
            json!({
                "ResourcesS3Bucket": ctx.bucket.name,
                "ArtifactS3RootDirectory": ctx.bucket.artifact_directory,
                "Action": "DELETE_S3_ARTIFACTS",
            }),
        ),
    )?;
    if ctx.has_compute_fleet() {
        template.add_resource(
            "TerminateComputeFleetCustomResource",
            custom_resource(
                CLEANUP_RESOURCES_FUNCTION,
                json!({"StackName": ctx.stack_name, "Action": "TERMINATE_EC2_INSTANCES"}),
            ),
        )?;
    }

    if ctx.has_managed_hosted_zone() {
        template.add_resource(
            CLEANUP_ROUTE53_FUNCTION,
            function(ctx, "CleanupRoute53", "cleanup_resources.handler"),
        )?;
        template.add_resource(
            "CleanupRoute53CustomResource",
            custom_resource(
                CLEANUP_ROUTE53_FUNCTION,
                json!({
                    "ClusterHostedZone": reference(HOSTED_ZONE),
                    "Action": "DELETE_DNS_RECORDS",
                    "ClusterDNSDomain": reference(CLUSTER_DNS_DOMAIN),
                }),
            ),
        )?;
    }
    Ok(())
}
