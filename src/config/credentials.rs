use tracing::debug;

/// Resolve a secret value. A value starting with `$` names an environment
/// variable; an unset variable resolves to `None`.
pub fn resolve_credential(value: &str) -> Option<String> {
    match value.strip_prefix('$') {
        Some(var_name) => match std::env::var(var_name) {
            Ok(resolved) if !resolved.is_empty() => {
                debug!(var = %var_name, "Resolved credential from environment");
                Some(resolved)
            }
            _ => {
                debug!(var = %var_name, "Credential variable not set");
                None
            }
        },
        None if value.is_empty() => None,
        None => Some(value.to_string()),
    }
}

/// Replace every occurrence of a known secret with `[REDACTED]`.
pub fn redact_credentials(text: &str, secrets: &[&str]) -> String {
    secrets
        .iter()
        .filter(|s| s.len() >= 4)
        .fold(text.to_string(), |acc, secret| acc.replace(secret, "[REDACTED]"))
}
