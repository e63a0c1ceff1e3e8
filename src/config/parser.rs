use std::path::Path;

use tracing::warn;

use super::schema::CONFIG_SCHEMA;
use super::security::validate_security_patterns;
use super::types::ProdGuardConfig;
use crate::errors::ProdGuardError;

const MAX_CONFIG_BYTES: u64 = 1_048_576;

pub async fn parse_config(path: &Path) -> Result<ProdGuardConfig, ProdGuardError> {
    if !path.exists() {
        return Err(ProdGuardError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_CONFIG_BYTES {
        return Err(ProdGuardError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
}

/// Parse and check a YAML document already in memory.
pub fn parse_config_str(content: &str) -> Result<ProdGuardConfig, ProdGuardError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    if yaml.is_null() {
        return Ok(ProdGuardConfig::default());
    }

    validate_security_patterns(&yaml)?;

    // Advisory only: structural problems are reported, typed parsing decides.
    for msg in schema_warnings(&yaml)? {
        warn!(validation_error = %msg, "Config schema warning");
    }

    let config: ProdGuardConfig = serde_yaml::from_value(yaml)?;
    validate_conflicts(&config)?;
    Ok(config)
}

/// Schema violations as readable messages.
pub fn schema_warnings(yaml: &serde_yaml::Value) -> Result<Vec<String>, ProdGuardError> {
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| ProdGuardError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| ProdGuardError::Config(format!("Schema compilation error: {}", e)))?;

    let messages = match compiled.validate(&json_value) {
        Ok(()) => Vec::new(),
        Err(errors) => errors.map(|e| format!("{} at {}", e, e.instance_path)).collect(),
    };
    Ok(messages)
}

/// Settings that parse fine individually but contradict each other.
fn validate_conflicts(config: &ProdGuardConfig) -> Result<(), ProdGuardError> {
    let execution = config.execution.as_ref();

    if let Some(order) = execution.and_then(|e| e.order.as_ref()) {
        if let Some(categories) = &config.categories {
            for name in categories.keys() {
                if !order.iter().any(|o| o == name) {
                    warn!(category = %name, "Category override for a category not in the execution order");
                }
            }
        }
    }

    if execution.and_then(|e| e.dry_run).unwrap_or(false) && execution.and_then(|e| e.read_only) == Some(false) {
        warn!("read_only: false has no effect on a dry run");
    }

    if let Some(categories) = &config.categories {
        for (name, category) in categories {
            if category.critical_probes.as_ref().is_some_and(|p| p.iter().any(|n| n.trim().is_empty())) {
                return Err(ProdGuardError::Config(format!(
                    "Category '{}' lists an empty critical probe name",
                    name
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = parse_config_str("").unwrap();
        assert!(config.target.is_none());
    }

    #[test]
    fn test_valid_document_parses() {
        let config = parse_config_str("target: https://example.com\nexecution:\n  pass_threshold: 0.75\n").unwrap();
        assert_eq!(config.target.as_deref(), Some("https://example.com"));
        assert_eq!(config.execution.unwrap().pass_threshold, Some(0.75));
    }

    #[test]
    fn test_dangerous_value_rejected() {
        assert!(matches!(
            parse_config_str("output:\n  directory: ../../tmp\n"),
            Err(ProdGuardError::Config(_))
        ));
    }

    #[test]
    fn test_type_mismatch_is_yaml_error() {
        assert!(matches!(
            parse_config_str("execution:\n  read_only: sometimes\n"),
            Err(ProdGuardError::Yaml(_))
        ));
    }

    #[test]
    fn test_empty_critical_probe_rejected() {
        let err = parse_config_str("categories:\n  https:\n    critical_probes: ['']\n").unwrap_err();
        assert!(err.to_string().contains("https"));
    }

    #[test]
    fn test_schema_reports_out_of_range_threshold() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("execution:\n  pass_threshold: 1.5\n").unwrap();
        let warnings = schema_warnings(&yaml).unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = parse_config(Path::new("/nonexistent/prodguard.yaml")).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
