use crate::errors::ProdGuardError;

/// Substrings that have no business in a run configuration.
const DANGEROUS_PATTERNS: &[&str] = &[
    "../",
    "..\\",
    "<script",
    "javascript:",
    "data:",
    "file:",
    "vbscript:",
];

/// Reject the document if any string value carries a dangerous pattern.
pub fn validate_security_patterns(value: &serde_yaml::Value) -> Result<(), ProdGuardError> {
    match find_dangerous(value, "root") {
        Some((pattern, path)) => Err(ProdGuardError::Config(format!(
            "Dangerous pattern '{}' found at config path: {}",
            pattern, path
        ))),
        None => Ok(()),
    }
}

fn find_dangerous(value: &serde_yaml::Value, path: &str) -> Option<(&'static str, String)> {
    match value {
        serde_yaml::Value::String(s) => {
            let lower = s.to_lowercase();
            DANGEROUS_PATTERNS
                .iter()
                .find(|p| lower.contains(*p))
                .map(|p| (*p, path.to_string()))
        }
        serde_yaml::Value::Mapping(map) => map.iter().find_map(|(k, v)| {
            let key = k.as_str().unwrap_or("?");
            find_dangerous(v, &join_path(path, key))
        }),
        serde_yaml::Value::Sequence(seq) => seq
            .iter()
            .enumerate()
            .find_map(|(i, v)| find_dangerous(v, &format!("{}[{}]", path, i))),
        _ => None,
    }
}

fn join_path(parent: &str, key: &str) -> String {
    if parent == "root" {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_safe_config_passes() {
        let doc = yaml("target: https://example.com\nexecution:\n  order: [https, rate-limiting]");
        assert!(validate_security_patterns(&doc).is_ok());
    }

    #[test]
    fn test_traversal_in_output_dir_blocked() {
        let err = validate_security_patterns(&yaml("output:\n  directory: ../../etc")).unwrap_err();
        assert!(err.to_string().contains("output.directory"));
    }

    #[test]
    fn test_script_uri_target_blocked() {
        assert!(validate_security_patterns(&yaml("target: 'javascript:alert(1)'")).is_err());
        assert!(validate_security_patterns(&yaml("target: 'file:///etc/passwd'")).is_err());
    }

    #[test]
    fn test_sequence_path_reported() {
        let err = validate_security_patterns(&yaml("execution:\n  order: [https, '<script>']")).unwrap_err();
        assert!(err.to_string().contains("execution.order[1]"));
    }

    #[test]
    fn test_numeric_values_pass() {
        assert!(validate_security_patterns(&yaml("probes:\n  timeout_ms: 8000\nexecution:\n  dry_run: true")).is_ok());
    }
}
