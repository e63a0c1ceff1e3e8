use super::types::ProdGuardError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl ProdGuardError {
    /// Classify this error to determine its type and whether the orchestrator
    /// may retry the category that raised it.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Transient infrastructure failures
            ProdGuardError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },
            ProdGuardError::CategoryInfrastructure(_) => ErrorClassification {
                error_type: "CategoryInfrastructureError",
                retryable: true,
            },
            ProdGuardError::ControlPlane(_) => ErrorClassification {
                error_type: "ControlPlaneError",
                retryable: true,
            },
            ProdGuardError::Http(_) => ErrorClassification {
                error_type: "HttpError",
                retryable: true,
            },
            ProdGuardError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },
            ProdGuardError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: true,
            },

            // A category that already ran past its time budget is not re-run
            // against a live target.
            ProdGuardError::Timeout(_) => ErrorClassification {
                error_type: "TimeoutError",
                retryable: false,
            },
            ProdGuardError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            ProdGuardError::Permission(_) => ErrorClassification {
                error_type: "PermissionError",
                retryable: false,
            },
            ProdGuardError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: false,
            },
            ProdGuardError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infrastructure_error_is_retryable() {
        let err = ProdGuardError::CategoryInfrastructure("setup failed".into());
        let class = err.classify();
        assert!(class.retryable);
        assert_eq!(class.error_type, "CategoryInfrastructureError");
    }

    #[test]
    fn test_config_error_not_retryable() {
        let err = ProdGuardError::Config("missing target".into());
        let class = err.classify();
        assert!(!class.retryable);
        assert_eq!(class.error_type, "ConfigError");
    }

    #[test]
    fn test_network_error_retryable() {
        let err = ProdGuardError::Network("connection refused".into());
        assert!(err.classify().retryable);
    }

    #[test]
    fn test_timeout_not_retryable() {
        let err = ProdGuardError::Timeout("category exceeded budget".into());
        assert!(!err.classify().retryable);
    }

    #[test]
    fn test_permission_not_retryable() {
        let err = ProdGuardError::Permission("mutating call in read-only mode".into());
        assert!(!err.classify().retryable);
    }

    #[test]
    fn test_control_plane_retryable() {
        let err = ProdGuardError::ControlPlane("throttled".into());
        assert!(err.classify().retryable);
    }
}
