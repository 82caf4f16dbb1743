//! Log group, head node alarms and the cluster dashboard.

use serde_json::{Value, json};
use stackdoc::intrinsic::{REGION, reference};
use stackdoc::{Resource, Template, TokenMap};

use crate::common::defaults::log_retention_days;
use crate::templates::StackContext;
use crate::templates::naming::{DASHBOARD, HEAD_NODE, LOG_GROUP};

struct HeadNodeAlarm {
    logical_id: &'static str,
    name: &'static str,
    metric: &'static str,
    /// Dimensions besides the instance id.
    dimensions: &'static [(&'static str, &'static str)],
}

const HEAD_NODE_ALARMS: [HeadNodeAlarm; 2] = [
    HeadNodeAlarm {
        logical_id: "HeadNodeDiskAlarm",
        name: "DiskAlarm",
        metric: "disk_used_percent",
        dimensions: &[("path", "/")],
    },
    HeadNodeAlarm {
        logical_id: "HeadNodeMemAlarm",
        name: "MemAlarm",
        metric: "mem_used_percent",
        dimensions: &[],
    },
];

const ALARM_THRESHOLD_PERCENT: u32 = 90;

pub fn add_log_group(template: &mut Template, ctx: &StackContext) -> crate::Result<()> {
    if !ctx.cluster.is_cw_logging_enabled() {
        return Ok(());
    }
    let logs = &ctx.cluster.monitoring.logs.cloud_watch;
    let resource = Resource::new(
        "AWS::Logs::LogGroup",
        json!({
            "LogGroupName": ctx.log_group_name(),
            "RetentionInDays": logs.retention_in_days.unwrap_or_else(log_retention_days),
        }),
    );
    let resource = match logs.deletion_policy.as_deref() {
        Some("Retain") => resource.retained(),
        _ => resource,
    };
    template.add_resource(LOG_GROUP, resource)?;
    Ok(())
}

fn alarm(ctx: &StackContext, alarm: &HeadNodeAlarm) -> Resource {
    let mut dimensions = vec![json!({"Name": "InstanceId", "Value": reference(HEAD_NODE)})];
    dimensions.extend(
        alarm
            .dimensions
            .iter()
            .map(|(name, value)| json!({"Name": name, "Value": value})),
    );
    Resource::new(
        "AWS::CloudWatch::Alarm",
        json!({
            "AlarmName": format!("{}_{}_HeadNode", ctx.stack_name, alarm.name),
            "MetricName": alarm.metric,
            "Namespace": "CWAgent",
            "Statistic": "Maximum",
            "Period": 60,
            "EvaluationPeriods": 2,
            "Threshold": ALARM_THRESHOLD_PERCENT,
            "ComparisonOperator": "GreaterThanThreshold",
            "Dimensions": dimensions,
        }),
    )
}

fn dashboard_body(ctx: &StackContext, tokens: &mut TokenMap) -> crate::Result<String> {
    let instance = tokens.tokenize(reference(HEAD_NODE));
    let region = tokens.tokenize(reference(REGION));
    let mut widgets: Vec<Value> = HEAD_NODE_ALARMS
        .iter()
        .enumerate()
        .map(|(index, alarm)| {
            json!({
                "type": "metric",
                "x": (index % 2) * 12,
                "y": (index / 2) * 6,
                "width": 12,
                "height": 6,
                "properties": {
                    "title": format!("Head Node {}", alarm.metric),
                    "region": region,
                    "metrics": [["CWAgent", alarm.metric, "InstanceId", instance]],
                    "view": "timeSeries",
                },
            })
        })
        .collect();
    if ctx.cluster.is_cw_logging_enabled() {
        widgets.push(json!({
            "type": "log",
            "x": 0,
            "y": 6 * HEAD_NODE_ALARMS.len().div_ceil(2),
            "width": 24,
            "height": 6,
            "properties": {
                "title": "Head Node Logs",
                "region": region,
                "query": format!(
                    "SOURCE '{}' | fields @timestamp, @message | sort @timestamp desc",
                    TokenMap::escape(&ctx.log_group_name())
                ),
            },
        }));
    }
    Ok(serde_json::to_string(&json!({ "widgets": widgets }))?)
}

/// Adds the head node alarms and the dashboard, when dashboards are enabled.
pub fn add_alarms_and_dashboard(template: &mut Template, ctx: &StackContext) -> crate::Result<()> {
    if !ctx.cluster.is_cw_dashboard_enabled() {
        return Ok(());
    }
    for head_node_alarm in &HEAD_NODE_ALARMS {
        template.add_resource(head_node_alarm.logical_id, alarm(ctx, head_node_alarm))?;
    }

    let mut tokens = TokenMap::new();
    let body = dashboard_body(ctx, &mut tokens)?;
    let name = format!(
        "{}-{}",
        TokenMap::escape(ctx.stack_name),
        tokens.tokenize(reference(REGION))
    );
    let (name, body) = (tokens.resolve(&name)?, tokens.resolve(&body)?);
    template.add_resource(
        DASHBOARD,
        Resource::new(
            "AWS::CloudWatch::Dashboard",
            json!({"DashboardName": name, "DashboardBody": body}),
        ),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alarms_are_distinct() {
        assert_ne!(HEAD_NODE_ALARMS[0].logical_id, HEAD_NODE_ALARMS[1].logical_id);
        assert!(
            HEAD_NODE_ALARMS
                .iter()
                .all(|alarm| alarm.logical_id.starts_with(HEAD_NODE))
        );
    }
}
