//! Stack of the infrastructure a scheduler plugin brings with it.

use serde_json::{Value, json};
use stackdoc::intrinsic::{STACK_ID, join, reference};
use stackdoc::{Map, Resource, Template};

use crate::templates::StackContext;
use crate::templates::compute_fleet::FleetOutputs;
use crate::templates::iam::NodeIam;
use crate::templates::naming::SCHEDULER_PLUGIN_STACK;

pub const PLUGIN_TEMPLATE_NAME: &str = "scheduler-plugin-substack.cfn";

fn role_names(names: &[Value]) -> Value {
    match names {
        [] => json!(""),
        [name] => name.clone(),
        names => join(",", names.to_vec()),
    }
}

/// Adds the plugin stack when the plugin defines its own infrastructure, otherwise nothing.
///
/// The plugin stack depends on every launch template of the cluster, compute nodes therefore
/// never reference it.
pub fn add_scheduler_plugin_stack(
    template: &mut Template,
    ctx: &StackContext,
    head_node_iam: &NodeIam,
    fleet: &FleetOutputs,
) -> crate::Result<()> {
    if !ctx.has_plugin_substack() {
        return Ok(());
    }
    let mut parameters = Map::new();
    parameters.insert("ClusterName".to_string(), json!(ctx.stack_name));
    parameters.insert("ParallelClusterStackId".to_string(), reference(STACK_ID));
    parameters.insert("VpcId".to_string(), json!(ctx.layout.vpc_id()));
    parameters.insert(
        "HeadNodeRoleName".to_string(),
        head_node_iam.role_name().unwrap_or_else(|| json!("")),
    );
    parameters.insert(
        "ComputeFleetRoleNames".to_string(),
        role_names(&fleet.role_names),
    );
    for launch_template in &fleet.launch_templates {
        parameters.insert(
            format!("{}Version", launch_template.logical_id),
            launch_template.version.clone(),
        );
    }
    log::debug!(
        "Scheduler plugin stack receives {} parameters",
        parameters.len()
    );
    template.add_resource(
        SCHEDULER_PLUGIN_STACK,
        Resource::new(
            "AWS::CloudFormation::Stack",
            json!({
                "TemplateURL": ctx.bucket.template_url(PLUGIN_TEMPLATE_NAME),
                "Parameters": parameters,
            }),
        ),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackdoc::intrinsic::get_att;

    #[test]
    fn compute_role_names() {
        assert_eq!(role_names(&[]), json!(""));
        let first = get_att("Stack", "Outputs.RoleA");
        assert_eq!(role_names(std::slice::from_ref(&first)), first);
        let second = get_att("Stack", "Outputs.RoleB");
        assert_eq!(
            role_names(&[first.clone(), second.clone()]),
            json!({"Fn::Join": [",", [first, second]]})
        );
    }
}
