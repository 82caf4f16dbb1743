//! Resources a scheduler family needs in the root stack.

use serde_json::json;
use stackdoc::intrinsic::{REGION, reference};
use stackdoc::{Parameter, Resource, Template};

use crate::model::SchedulerKind;
use crate::templates::StackContext;
use crate::templates::naming::{
    CLUSTER_DNS_DOMAIN, DYNAMODB_TABLE, HOSTED_ZONE, SLURM_DYNAMODB_TABLE,
};

/// Root stack resources of a scheduler family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FamilyResources {
    /// Table holding the state of the cluster nodes.
    cluster_table: bool,
    /// Table holding the state of the Slurm daemons.
    slurm_table: bool,
    /// DNS domain of the cluster nodes, when not disabled by the scheduler settings.
    dns: bool,
}

const fn family_resources(kind: SchedulerKind) -> FamilyResources {
    match kind {
        SchedulerKind::Slurm => FamilyResources {
            cluster_table: true,
            slurm_table: true,
            dns: true,
        },
        SchedulerKind::Plugin => FamilyResources {
            cluster_table: true,
            slurm_table: false,
            dns: false,
        },
        SchedulerKind::AwsBatch => FamilyResources {
            cluster_table: false,
            slurm_table: false,
            dns: false,
        },
    }
}

fn table(name: String) -> Resource {
    Resource::new(
        "AWS::DynamoDB::Table",
        json!({
            "TableName": name,
            "AttributeDefinitions": [{"AttributeName": "Id", "AttributeType": "S"}],
            "KeySchema": [{"AttributeName": "Id", "KeyType": "HASH"}],
            "BillingMode": "PAY_PER_REQUEST",
        }),
    )
}

/// Default DNS domain of the cluster nodes.
pub fn default_dns_domain(stack_name: &str) -> String {
    format!("{}.pcluster.", stack_name.to_lowercase())
}

pub fn add_scheduler_resources(template: &mut Template, ctx: &StackContext) -> crate::Result<()> {
    let family = family_resources(ctx.kind());
    if family.cluster_table {
        template.add_resource(
            DYNAMODB_TABLE,
            table(format!("parallelcluster-{}", ctx.stack_name)),
        )?;
    }
    if family.slurm_table {
        template.add_resource(
            SLURM_DYNAMODB_TABLE,
            table(format!("parallelcluster-slurm-{}", ctx.stack_name)),
        )?;
    }
    if family.dns && ctx.has_cluster_dns_domain() {
        template.add_parameter(
            CLUSTER_DNS_DOMAIN,
            Parameter::string()
                .with_default(default_dns_domain(ctx.stack_name))
                .with_description("DNS Domain of the private hosted zone"),
        );
        if ctx.has_managed_hosted_zone() {
            template.add_resource(
                HOSTED_ZONE,
                Resource::new(
                    "AWS::Route53::HostedZone",
                    json!({
                        "Name": reference(CLUSTER_DNS_DOMAIN),
                        "VPCs": [{"VPCId": ctx.layout.vpc_id(), "VPCRegion": reference(REGION)}],
                        "HostedZoneConfig": {"Comment": format!("Hosted zone of cluster {}", ctx.stack_name)},
                    }),
                ),
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_table() {
        assert_eq!(
            family_resources(SchedulerKind::Slurm),
            FamilyResources {
                cluster_table: true,
                slurm_table: true,
                dns: true
            }
        );
        assert!(family_resources(SchedulerKind::Plugin).cluster_table);
        assert!(!family_resources(SchedulerKind::Plugin).dns);
        assert!(!family_resources(SchedulerKind::AwsBatch).cluster_table);
    }

    #[test]
    fn dns_domain() {
        assert_eq!(default_dns_domain("ClusterName"), "clustername.pcluster.");
    }
}
