use serde_json::{Value, json};
use stackdoc::intrinsic::reference;
use stackdoc::{Resource, Template};

use crate::model::Queue;
use crate::templates::StackContext;
use crate::templates::naming::{COMPUTE_SECURITY_GROUP, HEAD_NODE_SECURITY_GROUP};
use crate::templates::tags::cluster_tags;

const SECURITY_GROUP: &str = "AWS::EC2::SecurityGroup";
const SECURITY_GROUP_INGRESS: &str = "AWS::EC2::SecurityGroupIngress";
const ANYWHERE: &str = "0.0.0.0/0";

fn is_head_node_group_managed(ctx: &StackContext) -> bool {
    ctx.cluster.head_node.networking.security_groups.is_none()
}

fn is_compute_group_managed(ctx: &StackContext) -> bool {
    ctx.cluster
        .scheduling
        .queues
        .iter()
        .any(|queue| queue.networking.security_groups.is_none())
}

fn security_groups(configured: Option<&Vec<String>>, managed: &str, additional: &[String]) -> Value {
    let mut groups: Vec<Value> = match configured {
        Some(groups) => groups.iter().map(|group| json!(group)).collect(),
        None => vec![reference(managed)],
    };
    groups.extend(additional.iter().map(|group| json!(group)));
    Value::Array(groups)
}

pub fn head_node_security_groups(ctx: &StackContext) -> Value {
    let networking = &ctx.cluster.head_node.networking;
    security_groups(
        networking.security_groups.as_ref(),
        HEAD_NODE_SECURITY_GROUP,
        &networking.additional_security_groups,
    )
}

pub fn compute_security_groups(queue: &Queue) -> Value {
    security_groups(
        queue.networking.security_groups.as_ref(),
        COMPUTE_SECURITY_GROUP,
        &queue.networking.additional_security_groups,
    )
}

/// Groups of the shared storage network interfaces: every group a node of the cluster is in.
pub fn storage_security_groups(ctx: &StackContext) -> Value {
    let mut groups: Vec<Value> = vec![];
    let candidates = std::iter::once(head_node_security_groups(ctx)).chain(
        ctx.cluster
            .scheduling
            .queues
            .iter()
            .map(compute_security_groups),
    );
    for group in candidates.flat_map(|groups| match groups {
        Value::Array(groups) => groups,
        _ => vec![],
    }) {
        if !groups.contains(&group) {
            groups.push(group);
        }
    }
    Value::Array(groups)
}

fn ingress(group: &str, source: &str) -> Resource {
    Resource::new(
        SECURITY_GROUP_INGRESS,
        json!({
            "IpProtocol": "-1",
            "FromPort": 0,
            "ToPort": 65535,
            "SourceSecurityGroupId": reference(source),
            "GroupId": reference(group),
        }),
    )
}

/// Adds the security groups created with the cluster and the rules between them.
pub fn add_security_groups(template: &mut Template, ctx: &StackContext) -> crate::Result<()> {
    let tags = cluster_tags(ctx);
    let head_node = is_head_node_group_managed(ctx);
    let compute = is_compute_group_managed(ctx);

    if head_node {
        let allowed_ips = ctx
            .cluster
            .head_node
            .ssh
            .as_ref()
            .and_then(|ssh| ssh.allowed_ips.as_deref())
            .unwrap_or(ANYWHERE);
        let mut rules = vec![json!({
            "IpProtocol": "tcp",
            "FromPort": 22,
            "ToPort": 22,
            "CidrIp": allowed_ips,
        })];
        if ctx.cluster.is_dcv_enabled() {
            rules.push(json!({
                "IpProtocol": "tcp",
                "FromPort": 8443,
                "ToPort": 8443,
                "CidrIp": allowed_ips,
            }));
        }
        template.add_resource(
            HEAD_NODE_SECURITY_GROUP,
            Resource::new(
                SECURITY_GROUP,
                json!({
                    "GroupDescription": "Enable access to the head node",
                    "VpcId": ctx.layout.vpc_id(),
                    "SecurityGroupIngress": rules,
                    "Tags": tags,
                }),
            ),
        )?;
    }
    if compute {
        template.add_resource(
            COMPUTE_SECURITY_GROUP,
            Resource::new(
                SECURITY_GROUP,
                json!({
                    "GroupDescription": "Allow access to compute nodes",
                    "VpcId": ctx.layout.vpc_id(),
                    "Tags": tags,
                }),
            ),
        )?;
        template.add_resource(
            "ComputeSecurityGroupIngress",
            ingress(COMPUTE_SECURITY_GROUP, COMPUTE_SECURITY_GROUP),
        )?;
    }
    if head_node && compute {
        template.add_resource(
            "ComputeSecurityGroupHeadNodeIngress",
            ingress(COMPUTE_SECURITY_GROUP, HEAD_NODE_SECURITY_GROUP),
        )?;
        template.add_resource(
            "HeadNodeSecurityGroupComputeIngress",
            ingress(HEAD_NODE_SECURITY_GROUP, COMPUTE_SECURITY_GROUP),
        )?;
    }
    Ok(())
}

