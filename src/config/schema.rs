use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "environment": { "type": "string", "enum": ["production", "staging", "development"] },
            "target": { "type": "string", "format": "uri" },
            "execution": {
                "type": "object",
                "properties": {
                    "order": { "type": "array", "items": { "type": "string" }, "minItems": 1 },
                    "concurrency": {
                        "type": "object",
                        "properties": {
                            "mode": { "type": "string", "enum": ["sequential", "bounded_parallel"] },
                            "max_concurrent": { "type": "integer", "minimum": 1 }
                        }
                    },
                    "retry": {
                        "type": "object",
                        "properties": {
                            "max_retries": { "type": "integer", "minimum": 0 },
                            "retry_delay_ms": { "type": "integer", "minimum": 0 }
                        }
                    },
                    "read_only": { "type": "boolean" },
                    "dry_run": { "type": "boolean" },
                    "pass_threshold": { "type": "number", "minimum": 0, "maximum": 1 }
                }
            },
            "emergency_stop": {
                "type": "object",
                "properties": {
                    "max_test_duration_ms": { "type": "integer", "minimum": 1 },
                    "resource_threshold": { "type": "number", "minimum": 0, "maximum": 1 },
                    "cost_threshold_usd": { "type": "number", "minimum": 0 },
                    "auto_stop_enabled": { "type": "boolean" },
                    "poll_interval_ms": { "type": "integer", "minimum": 1 }
                }
            },
            "probes": {
                "type": "object",
                "properties": {
                    "timeout_ms": { "type": "integer", "minimum": 1 },
                    "flood_timeout_ms": { "type": "integer", "minimum": 1 },
                    "rate_limit_requests": { "type": "integer", "minimum": 1 },
                    "cost_per_request_usd": { "type": "number", "minimum": 0 },
                    "request_capacity": { "type": "integer", "minimum": 1 }
                }
            },
            "categories": {
                "type": "object",
                "additionalProperties": {
                    "type": "object",
                    "properties": {
                        "critical_probes": { "type": "array", "items": { "type": "string" } }
                    }
                }
            },
            "control_plane": {
                "type": "object",
                "required": ["endpoint"],
                "properties": {
                    "endpoint": { "type": "string", "format": "uri" },
                    "token": { "type": "string" }
                }
            },
            "output": {
                "type": "object",
                "properties": {
                    "directory": { "type": "string" },
                    "markdown": { "type": "boolean" }
                }
            }
        }
    })
});
