//! Tags of the cluster nodes.
//!
//! Keys under [`TAG_NAMESPACE`] and the `Name` key are reserved for the cluster. User tags are
//! appended after the reserved ones and can not replace them.

use crate::CLUSTERSTACK_VERSION;
use crate::common::defaults::TAG_NAMESPACE;
use crate::model::cluster::Tag;
use crate::templates::StackContext;
use crate::templates::walker::StorageCounts;

pub const NODE_TYPE_HEAD_NODE: &str = "HeadNode";
pub const NODE_TYPE_COMPUTE: &str = "Compute";
const NAME_TAG: &str = "Name";

fn reserved(name: &str) -> String {
    format!("{TAG_NAMESPACE}:{name}")
}

/// `efs=1, multiebs=1, raid=0, fsx=3`, RAID arrays are counted by their member volumes.
pub fn filesystem_summary(counts: &StorageCounts) -> String {
    format!(
        "efs={}, multiebs={}, raid={}, fsx={}",
        counts.efs, counts.ebs, counts.raid_volumes, counts.fsx
    )
}

/// `<os>, <scheduler>, <version>, <architecture>`
pub fn attributes_summary(ctx: &StackContext) -> String {
    format!(
        "{}, {}, {CLUSTERSTACK_VERSION}, {}",
        ctx.cluster.image.os,
        ctx.kind(),
        ctx.layout.architecture()
    )
}

pub fn networking_summary(ctx: &StackContext) -> String {
    if ctx.layout.is_efa_enabled() {
        "EFA=compute".to_string()
    } else {
        "EFA=NONE".to_string()
    }
}

fn is_reserved(key: &str) -> bool {
    key == NAME_TAG || key.starts_with(&reserved(""))
}

fn with_user_tags(mut tags: Vec<Tag>, ctx: &StackContext) -> Vec<Tag> {
    for tag in &ctx.cluster.tags {
        if is_reserved(&tag.key) {
            log::warn!("Tag {} is reserved for the cluster and is ignored", tag.key);
            continue;
        }
        tags.push(tag.clone());
    }
    tags
}

fn node_tags(ctx: &StackContext, node_type: &str) -> Vec<Tag> {
    vec![
        Tag::new(reserved("cluster-name"), ctx.stack_name),
        Tag::new(reserved("node-type"), node_type),
    ]
}

/// Tags of the head node instance, with the summaries of the cluster.
pub fn head_node_instance_tags(ctx: &StackContext) -> Vec<Tag> {
    let mut tags = vec![Tag::new(NAME_TAG, NODE_TYPE_HEAD_NODE)];
    tags.extend(node_tags(ctx, NODE_TYPE_HEAD_NODE));
    tags.extend([
        Tag::new(reserved("attributes"), attributes_summary(ctx)),
        Tag::new(reserved("filesystem"), filesystem_summary(&ctx.layout.storage)),
        Tag::new(reserved("networking"), networking_summary(ctx)),
    ]);
    with_user_tags(tags, ctx)
}

/// Tags of the head node volumes, they never carry the summaries.
pub fn head_node_volume_tags(ctx: &StackContext) -> Vec<Tag> {
    let mut tags = node_tags(ctx, NODE_TYPE_HEAD_NODE);
    tags.push(Tag::new(reserved("version"), CLUSTERSTACK_VERSION));
    with_user_tags(tags, ctx)
}

pub fn compute_tags(ctx: &StackContext, queue: &str, compute_resource: &str) -> Vec<Tag> {
    let mut tags = node_tags(ctx, NODE_TYPE_COMPUTE);
    tags.extend([
        Tag::new(reserved("queue-name"), queue),
        Tag::new(reserved("compute-resource-name"), compute_resource),
        Tag::new(reserved("version"), CLUSTERSTACK_VERSION),
    ]);
    with_user_tags(tags, ctx)
}

/// Tags of shared resources created with the cluster (storage, security groups, tables).
pub fn cluster_tags(ctx: &StackContext) -> Vec<Tag> {
    with_user_tags(
        vec![
            Tag::new(reserved("cluster-name"), ctx.stack_name),
            Tag::new(reserved("version"), CLUSTERSTACK_VERSION),
        ],
        ctx,
    )
}
