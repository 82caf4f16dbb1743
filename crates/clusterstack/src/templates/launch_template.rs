//! Launch templates of the compute nodes.
//!
//! Launch templates live in the nested document of their partition, references to the root
//! document are imported as parameters.

use indoc::formatdoc;
use serde_json::{Value, json};
use stackdoc::intrinsic::{base64, reference};
use stackdoc::{Resource, StackImports};

use crate::model::scheduling::CapacityType;
use crate::templates::StackContext;
use crate::templates::dna::BootstrapDescriptor;
use crate::templates::iam::NodeIam;
use crate::templates::naming::placement_group_id;
use crate::templates::networking::compute_security_groups;
use crate::templates::tags::compute_tags;
use crate::templates::walker::{ComputeResourceLayout, QueueLayout};

const DNA_PATH: &str = "/etc/chef/dna.json";

/// Boot script of a compute node, the descriptor is written before the node is configured.
pub fn compute_user_data(
    descriptor: &BootstrapDescriptor,
    queue: &str,
    compute_resource: &str,
) -> crate::Result<Value> {
    let dna = descriptor.compute_node_text(queue, compute_resource)?;
    let script = formatdoc! {r#"
        Content-Type: multipart/mixed; boundary="==BOUNDARY=="
        MIME-Version: 1.0

        --==BOUNDARY==
        Content-Type: text/x-shellscript; charset="us-ascii"
        MIME-Version: 1.0

        #!/bin/bash -x
        mkdir -p /etc/chef
        cat > {dna_path} << 'EOF'
        {dna}
        EOF
        /opt/parallelcluster/scripts/bootstrap-node.sh {dna_path}
        --==BOUNDARY==--
    "#, dna_path = DNA_PATH, dna = dna};
    Ok(base64(descriptor.resolve(&script)?))
}

fn network_interfaces(
    queue: &QueueLayout,
    compute_resource: &ComputeResourceLayout,
    groups: Value,
) -> Vec<Value> {
    let shape = &compute_resource.shape;
    let subnet = queue.single_subnet().filter(|_| shape.pinned);
    (0..shape.network_interfaces)
        .map(|index| {
            let mut interface = json!({
                "DeviceIndex": if index == 0 { 0 } else { 1 },
                "NetworkCardIndex": index,
                "Groups": groups,
            });
            if shape.efa {
                interface["InterfaceType"] = json!("efa");
            }
            if let Some(subnet) = subnet {
                interface["SubnetId"] = json!(subnet);
            }
            if index == 0 {
                if let Some(public_ip) = queue.queue.networking.assign_public_ip {
                    interface["AssociatePublicIpAddress"] = json!(public_ip);
                }
            }
            interface
        })
        .collect()
}

fn placement(queue: &QueueLayout) -> Option<Value> {
    let group = queue.queue.networking.placement_group.as_ref()?;
    if !group.enabled {
        return None;
    }
    Some(match &group.id {
        Some(id) => json!({"GroupName": id}),
        None => json!({"GroupName": reference(&placement_group_id(queue.name()))}),
    })
}

fn spot_options(compute_resource: &ComputeResourceLayout) -> Value {
    let mut spot_options = json!({
        "SpotInstanceType": "one-time",
        "InstanceInterruptionBehavior": "terminate",
    });
    if let Some(price) = compute_resource.compute_resource.spot_price {
        spot_options["MaxPrice"] = json!(price.to_string());
    }
    json!({"MarketType": "spot", "SpotOptions": spot_options})
}

/// Launch template of the nodes of a compute resource.
///
/// `InstanceType` and `EbsOptimized` are set only when a single instance type is pinned, the
/// instances of flexible compute resources are chosen by the fleet. Values of the root document
/// (`user_data`, security groups) go through `imports`, `iam` belongs to the nested document.
pub fn compute_launch_template(
    ctx: &StackContext,
    imports: &mut StackImports,
    queue: &QueueLayout,
    compute_resource: &ComputeResourceLayout,
    iam: &NodeIam,
    user_data: &Value,
) -> Resource {
    let tags = compute_tags(ctx, queue.name(), compute_resource.name());
    let groups = imports.import(&compute_security_groups(queue.queue));
    let mut data = json!({
        "ImageId": queue.image_id,
        "IamInstanceProfile": iam.instance_profile,
        "NetworkInterfaces": network_interfaces(queue, compute_resource, groups),
        "MetadataOptions": {"HttpTokens": ctx.cluster.imds.http_tokens()},
        "Monitoring": {"Enabled": ctx.cluster.monitoring.detailed_monitoring},
        "UserData": imports.import(user_data),
        "TagSpecifications": [
            {"ResourceType": "instance", "Tags": tags},
            {"ResourceType": "volume", "Tags": tags},
        ],
    });
    if let Some(instance_type) = compute_resource.compute_resource.instance_types.pinned() {
        data["InstanceType"] = json!(instance_type);
    }
    if let Some(ebs_optimized) = compute_resource.shape.ebs_optimized {
        data["EbsOptimized"] = json!(ebs_optimized);
    }
    if queue.queue.capacity_type == CapacityType::Spot {
        data["InstanceMarketOptions"] = spot_options(compute_resource);
    }
    if let Some(cores) = compute_resource.disabled_threads_cores() {
        data["CpuOptions"] = json!({"CoreCount": cores, "ThreadsPerCore": 1});
    }
    if let Some(placement) = placement(queue) {
        data["Placement"] = placement;
    }
    if let Some(key_name) = ctx
        .cluster
        .head_node
        .ssh
        .as_ref()
        .and_then(|ssh| ssh.key_name.as_ref())
    {
        data["KeyName"] = json!(key_name);
    }
    Resource::new(
        "AWS::EC2::LaunchTemplate",
        json!({"LaunchTemplateData": data}),
    )
}
