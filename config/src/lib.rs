//! Engine and collaborator configuration for RAQE.
//!
//! `EngineConfig` holds the policy knobs the five subsystems read (retry
//! counts, row caps, timeouts, circuit-breaker thresholds). `CollaboratorsConfig`
//! holds deployment-topology settings (connection URLs, credentials) for the
//! graph store, vector store, embedder, and LLM. The split mirrors the
//! teacher's separation of an `AppConfig` of feature/service URLs from each
//! service's own `Cargo.toml`-level environment reads.

pub mod collaborators;

pub use collaborators::CollaboratorsConfig;

use serde::{Deserialize, Serialize};
use std::env;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub query_generation: QueryGenerationConfig,
    pub query_execution: QueryExecutionConfig,
    pub response_generation: ResponseGenerationConfig,
    pub auto_sync: AutoSyncConfig,
    pub auto_discovery: AutoDiscoveryConfig,
    pub resilience: ResilienceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            query_generation: QueryGenerationConfig::default(),
            query_execution: QueryExecutionConfig::default(),
            response_generation: ResponseGenerationConfig::default(),
            auto_sync: AutoSyncConfig::default(),
            auto_discovery: AutoDiscoveryConfig::default(),
            resilience: ResilienceConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load the engine configuration from `RAQE_*`-prefixed environment
    /// variables, falling back to documented defaults for anything unset or
    /// unparsable. Never panics.
    pub fn from_env() -> Self {
        Self {
            query_generation: QueryGenerationConfig {
                allow_write: env_or("RAQE_ALLOW_WRITE", false),
                max_retries: env_or("RAQE_QUERY_MAX_RETRIES", 3),
                temperature: env_or("RAQE_QUERY_TEMPERATURE", 0.1),
                explain: env_or("RAQE_QUERY_EXPLAIN", true),
                complexity_max: env_or("RAQE_QUERY_COMPLEXITY_MAX", 100),
            },
            query_execution: QueryExecutionConfig {
                timeout_secs: env_or("RAQE_EXEC_TIMEOUT_SECS", 30),
                timeout_max_secs: env_or("RAQE_EXEC_TIMEOUT_MAX_SECS", 120),
                row_limit: env_or("RAQE_EXEC_ROW_LIMIT", 100),
                row_limit_max: env_or("RAQE_EXEC_ROW_LIMIT_MAX", 1000),
                read_only: env_or("RAQE_EXEC_READ_ONLY", true),
                include_stats: env_or("RAQE_EXEC_INCLUDE_STATS", true),
            },
            response_generation: ResponseGenerationConfig {
                sample_size: env_or("RAQE_RESPONSE_SAMPLE_SIZE", 10),
                include_details: env_or("RAQE_RESPONSE_INCLUDE_DETAILS", false),
            },
            auto_sync: AutoSyncConfig {
                create: env_or("RAQE_AUTO_SYNC_CREATE", true),
                update: env_or("RAQE_AUTO_SYNC_UPDATE", true),
                delete: env_or("RAQE_AUTO_SYNC_DELETE", true),
                unknown_id_creates: env_or("RAQE_AUTO_SYNC_UNKNOWN_ID_CREATES", true),
            },
            auto_discovery: AutoDiscoveryConfig {
                depth_guard: env_or("RAQE_DISCOVERY_DEPTH_GUARD", 5),
                cache_ttl_secs: env::var("RAQE_DISCOVERY_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok()),
            },
            resilience: ResilienceConfig {
                circuit_failure_threshold: env_or("RAQE_CIRCUIT_FAILURE_THRESHOLD", 5),
                circuit_recovery_timeout_secs: env_or("RAQE_CIRCUIT_RECOVERY_TIMEOUT_SECS", 30),
                store_retry_attempts: env_or("RAQE_STORE_RETRY_ATTEMPTS", 3),
                network_retry_attempts: env_or("RAQE_NETWORK_RETRY_ATTEMPTS", 5),
            },
        }
    }
}

/// Options for the Query Generator & Validator (distilled §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryGenerationConfig {
    pub allow_write: bool,
    pub max_retries: u32,
    pub temperature: f32,
    pub explain: bool,
    pub complexity_max: u32,
}

impl Default for QueryGenerationConfig {
    fn default() -> Self {
        Self {
            allow_write: false,
            max_retries: 3,
            temperature: 0.1,
            explain: true,
            complexity_max: 100,
        }
    }
}

/// Options for the Executor (distilled §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryExecutionConfig {
    pub timeout_secs: u64,
    pub timeout_max_secs: u64,
    pub row_limit: u64,
    pub row_limit_max: u64,
    pub read_only: bool,
    pub include_stats: bool,
}

impl Default for QueryExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            timeout_max_secs: 120,
            row_limit: 100,
            row_limit_max: 1000,
            read_only: true,
            include_stats: true,
        }
    }
}

/// Options for the Response Generator (distilled §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseGenerationConfig {
    pub sample_size: usize,
    pub include_details: bool,
}

impl Default for ResponseGenerationConfig {
    fn default() -> Self {
        Self {
            sample_size: 10,
            include_details: false,
        }
    }
}

/// Per-operation auto-sync flags (distilled §3.2 `AutoSyncFlags`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoSyncConfig {
    pub create: bool,
    pub update: bool,
    pub delete: bool,
    /// Whether `sync` treats an unknown id as a create (upsert) rather than an error.
    pub unknown_id_creates: bool,
}

impl Default for AutoSyncConfig {
    fn default() -> Self {
        Self {
            create: true,
            update: true,
            delete: true,
            unknown_id_creates: true,
        }
    }
}

/// Auto-discovery depth guard and cache policy (distilled §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoDiscoveryConfig {
    pub depth_guard: u32,
    /// `None` means invalidation is manual-only (the default); `Some(secs)`
    /// additionally expires cache entries after the given age.
    pub cache_ttl_secs: Option<u64>,
}

impl Default for AutoDiscoveryConfig {
    fn default() -> Self {
        Self {
            depth_guard: 5,
            cache_ttl_secs: None,
        }
    }
}

/// Circuit breaker and retry policy (distilled §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    pub circuit_failure_threshold: u32,
    pub circuit_recovery_timeout_secs: u64,
    pub store_retry_attempts: u32,
    pub network_retry_attempts: u32,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            circuit_failure_threshold: 5,
            circuit_recovery_timeout_secs: 30,
            store_retry_attempts: 3,
            network_retry_attempts: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.query_generation.max_retries, 3);
        assert_eq!(config.query_generation.temperature, 0.1);
        assert_eq!(config.query_generation.complexity_max, 100);
        assert_eq!(config.query_execution.timeout_secs, 30);
        assert_eq!(config.query_execution.timeout_max_secs, 120);
        assert_eq!(config.query_execution.row_limit, 100);
        assert_eq!(config.query_execution.row_limit_max, 1000);
        assert_eq!(config.response_generation.sample_size, 10);
        assert_eq!(config.auto_discovery.depth_guard, 5);
        assert_eq!(config.resilience.circuit_failure_threshold, 5);
        assert_eq!(config.resilience.circuit_recovery_timeout_secs, 30);
        assert_eq!(config.resilience.store_retry_attempts, 3);
        assert_eq!(config.resilience.network_retry_attempts, 5);
    }

    #[test]
    fn from_env_falls_back_to_defaults_when_unset() {
        let config = EngineConfig::from_env();
        assert_eq!(config.query_generation.max_retries, 3);
        assert!(config.auto_sync.create);
    }
}
