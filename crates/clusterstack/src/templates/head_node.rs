//! Head node, its launch template and the wait condition signalled once it is configured.

use indoc::formatdoc;
use serde_json::{Value, json};
use stackdoc::intrinsic::{REGION, STACK_NAME, base64, get_att, reference};
use stackdoc::{Map, Output, Resource, Template, TokenMap};

use crate::common::defaults::{DEFAULT_PROXY, SHARED_DIR};
use crate::templates::StackContext;
use crate::templates::compute_fleet::FleetOutputs;
use crate::templates::dna::{BootstrapDescriptor, head_node_bootstrap_timeout};
use crate::templates::iam::NodeIam;
use crate::templates::naming::{
    HEAD_NODE, HEAD_NODE_LAUNCH_TEMPLATE, wait_condition_handle_id, wait_condition_id,
};
use crate::templates::networking::head_node_security_groups;
use crate::templates::tags::{head_node_instance_tags, head_node_volume_tags};

const DNA_FILE: &str = "/tmp/dna.json";
const LAUNCH_TEMPLATES_CONFIG: &str = "launch-templates-config.json";
const CONFIG_SET: &str = "deployFiles";

const DEFAULT_ROOT_VOLUME_GIB: u32 = 35;

fn config_file(content: Value) -> Value {
    json!({
        "content": content,
        "mode": "000644",
        "owner": "root",
        "group": "root",
    })
}

/// Launch template id and version of every compute resource, grouped by queue.
fn launch_templates_config(fleet: &FleetOutputs) -> crate::Result<Value> {
    let mut tokens = TokenMap::new();
    let mut queues: Map<String, Map<String, Value>> = Map::new();
    for launch_template in &fleet.launch_templates {
        queues
            .entry(TokenMap::escape(&launch_template.queue))
            .or_default()
            .insert(
                TokenMap::escape(&launch_template.compute_resource),
                json!({"LaunchTemplate": {
                    "Id": tokens.tokenize(launch_template.id.clone()),
                    "Version": tokens.tokenize(launch_template.version.clone()),
                }}),
            );
    }
    let queues: Map<String, Value> = queues
        .into_iter()
        .map(|(queue, compute_resources)| (queue, json!({"ComputeResources": compute_resources})))
        .collect();
    let text = serde_json::to_string_pretty(&json!({ "Queues": queues }))?;
    Ok(tokens.resolve(&text)?)
}

fn init_metadata(
    ctx: &StackContext,
    descriptor: &BootstrapDescriptor,
    fleet: &FleetOutputs,
) -> crate::Result<Value> {
    let mut files = Map::new();
    files.insert(
        DNA_FILE.to_string(),
        config_file(descriptor.render_head_node()?),
    );
    if ctx.has_compute_fleet() {
        files.insert(
            format!("{SHARED_DIR}/{LAUNCH_TEMPLATES_CONFIG}"),
            config_file(launch_templates_config(fleet)?),
        );
    }
    Ok(json!({
        "AWS::CloudFormation::Init": {
            "configSets": {CONFIG_SET: ["deployConfigFiles"]},
            "deployConfigFiles": {"files": files},
        }
    }))
}

/// Boot script of the head node: deploys the configuration files and reports the result to the
/// wait condition.
fn user_data(ctx: &StackContext) -> crate::Result<Value> {
    let mut tokens = TokenMap::new();
    let wait_handle = tokens.tokenize(reference(&wait_condition_handle_id(ctx.timestamp)));
    let stack_name = tokens.tokenize(reference(STACK_NAME));
    let region = tokens.tokenize(reference(REGION));
    let proxy = match ctx.cluster.proxy() {
        DEFAULT_PROXY => String::new(),
        proxy => {
            let proxy = TokenMap::escape(proxy);
            format!(" --http-proxy {proxy} --https-proxy {proxy}")
        }
    };
    let script = formatdoc! {r#"
        #!/bin/bash -x

        function error_exit {{
          cfn-signal --exit-code=1 --reason="$1" "{wait_handle}"
          exit 1
        }}

        cfn-init -s {stack_name} -v -c {config_set} -r {launch_template} --region {region}{proxy} || error_exit 'Failed to deploy the configuration files'
        /opt/parallelcluster/scripts/bootstrap-node.sh {dna_file} || error_exit 'Failed to configure the head node'
        cfn-signal --exit-code=0 --reason="HeadNode setup complete" "{wait_handle}"
    "#,
        wait_handle = wait_handle,
        stack_name = stack_name,
        config_set = CONFIG_SET,
        launch_template = HEAD_NODE_LAUNCH_TEMPLATE,
        region = region,
        proxy = proxy,
        dna_file = DNA_FILE,
    };
    Ok(base64(tokens.resolve(&script)?))
}

fn root_volume(ctx: &StackContext) -> Value {
    let root_volume = &ctx.cluster.head_node.local_storage.root_volume;
    json!({
        "DeviceName": ctx.cluster.image.os.root_device_name(),
        "Ebs": {
            "VolumeSize": root_volume.size.unwrap_or(DEFAULT_ROOT_VOLUME_GIB),
            "Encrypted": root_volume.encrypted.unwrap_or(true),
            "VolumeType": root_volume.volume_type.as_deref().unwrap_or("gp3"),
            "DeleteOnTermination": root_volume.delete_on_termination.unwrap_or(true),
        },
    })
}

fn launch_template(
    ctx: &StackContext,
    iam: &NodeIam,
    descriptor: &BootstrapDescriptor,
    fleet: &FleetOutputs,
) -> crate::Result<Resource> {
    let head_node = &ctx.layout.head_node;
    let mut data = json!({
        "ImageId": head_node.image_id,
        "InstanceType": ctx.cluster.head_node.instance_type,
        "IamInstanceProfile": iam.instance_profile,
        "NetworkInterfaces": [{
            "DeviceIndex": 0,
            "NetworkCardIndex": 0,
            "SubnetId": head_node.subnet_id,
            "Groups": head_node_security_groups(ctx),
        }],
        "BlockDeviceMappings": [root_volume(ctx)],
        "EbsOptimized": head_node.instance_type.is_ebs_optimized(),
        "MetadataOptions": {"HttpTokens": ctx.cluster.imds.http_tokens()},
        "Monitoring": {"Enabled": ctx.cluster.monitoring.detailed_monitoring},
        "UserData": user_data(ctx)?,
        // The instance carries its own tags, the launch template only tags the volumes.
        "TagSpecifications": [{"ResourceType": "volume", "Tags": head_node_volume_tags(ctx)}],
    });
    if let Some(key_name) = ctx
        .cluster
        .head_node
        .ssh
        .as_ref()
        .and_then(|ssh| ssh.key_name.as_ref())
    {
        data["KeyName"] = json!(key_name);
    }
    if ctx.cluster.head_node.disable_simultaneous_multithreading
        && head_node.instance_type.threads_per_core() > 1
    {
        data["CpuOptions"] = json!({
            "CoreCount": head_node.instance_type.cores(),
            "ThreadsPerCore": 1,
        });
    }
    Ok(Resource::new(
        "AWS::EC2::LaunchTemplate",
        json!({"LaunchTemplateData": data}),
    )
    .with_metadata(init_metadata(ctx, descriptor, fleet)?))
}

/// Adds the head node with its launch template, the wait condition and the head node outputs.
pub fn add_head_node(
    template: &mut Template,
    ctx: &StackContext,
    iam: &NodeIam,
    descriptor: &BootstrapDescriptor,
    fleet: &FleetOutputs,
) -> crate::Result<()> {
    template.add_resource(
        HEAD_NODE_LAUNCH_TEMPLATE,
        launch_template(ctx, iam, descriptor, fleet)?,
    )?;
    template.add_resource(
        HEAD_NODE,
        Resource::new(
            "AWS::EC2::Instance",
            json!({
                "LaunchTemplate": {
                    "LaunchTemplateId": reference(HEAD_NODE_LAUNCH_TEMPLATE),
                    "Version": get_att(HEAD_NODE_LAUNCH_TEMPLATE, "LatestVersionNumber"),
                },
                "Tags": head_node_instance_tags(ctx),
            }),
        ),
    )?;

    let handle = wait_condition_handle_id(ctx.timestamp);
    let timeout = head_node_bootstrap_timeout(ctx.cluster);
    template.add_resource(
        &handle,
        Resource::new("AWS::CloudFormation::WaitConditionHandle", Value::Null),
    )?;
    template.add_resource(
        wait_condition_id(ctx.timestamp),
        Resource::new(
            "AWS::CloudFormation::WaitCondition",
            json!({"Handle": reference(&handle), "Timeout": timeout.to_string()}),
        )
        .depends_on(HEAD_NODE),
    )?;
    log::debug!("Head node bootstrap timeout is {timeout}s");

    template.add_output(
        "HeadNodeInstanceID",
        Output::new(reference(HEAD_NODE)).with_description("ID of the head node instance"),
    )?;
    template.add_output(
        "HeadNodePrivateIP",
        Output::new(get_att(HEAD_NODE, "PrivateIp"))
            .with_description("Private IP Address of the head node"),
    )?;
    Ok(())
}
