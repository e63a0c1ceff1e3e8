use std::time::Duration;

use serde_json::{json, Value};

use super::{FnProbe, ProbeBuilder, ProbeCheck, ProbeDetail, SecurityControl};

/// Counts the entries of the array under `field`; a missing array is an error.
fn count_entries(response: &Value, field: &str) -> anyhow::Result<u32> {
    response
        .get(field)
        .and_then(Value::as_array)
        .map(|entries| entries.len() as u32)
        .ok_or_else(|| anyhow::anyhow!("control plane response has no '{}' array", field))
}

fn monitoring_check(check: &str, resources: u32) -> ProbeCheck {
    let configured = resources > 0;
    ProbeCheck::new(configured, ProbeDetail::Monitoring {
        check: check.to_string(),
        configured,
        resources,
    })
}

/// Access logs for the target must be collected.
pub fn access_logging(timeout: Duration) -> FnProbe {
    ProbeBuilder::new("access-logging")
        .control(SecurityControl::Monitoring)
        .timeout(timeout)
        .run(|ctx| async move {
            let host = ctx.target.host_str().unwrap_or_default().to_string();
            let response = ctx.control_plane()?
                .invoke("logs", "DescribeLogGroups", json!({ "target": host }))
                .await?;
            Ok(monitoring_check("access-logging", count_entries(&response, "log_groups")?))
        })
}

/// At least one security alarm must watch the target.
pub fn security_alarms(timeout: Duration) -> FnProbe {
    ProbeBuilder::new("security-alarms")
        .control(SecurityControl::Monitoring)
        .timeout(timeout)
        .run(|ctx| async move {
            let host = ctx.target.host_str().unwrap_or_default().to_string();
            let response = ctx.control_plane()?
                .invoke("monitoring", "DescribeAlarms", json!({ "target": host, "state": "any" }))
                .await?;
            Ok(monitoring_check("security-alarms", count_entries(&response, "alarms")?))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_entries() {
        let response = json!({"alarms": [{"name": "waf-blocked-spike"}, {"name": "5xx-rate"}]});
        assert_eq!(count_entries(&response, "alarms").unwrap(), 2);
        assert!(count_entries(&response, "log_groups").is_err());
    }

    #[test]
    fn test_monitoring_check_requires_resources() {
        assert!(!monitoring_check("security-alarms", 0).passed);
        assert!(monitoring_check("security-alarms", 1).passed);
    }
}
