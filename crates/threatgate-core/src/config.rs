use crate::error::ConfigError;
use crate::register::{Severity, Status, Threat};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::debug;

/// Default location of the policy file, relative to the working directory.
pub const DEFAULT_POLICY_PATH: &str = ".threatgate/policy.toml";

/// Policy configuration loaded from `.threatgate/policy.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    #[serde(default)]
    pub gate: GatePolicy,
}

/// Which records block the gate.
///
/// A record blocks when its severity is in `blocking_severities` and its
/// status is in `blocking_statuses`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GatePolicy {
    #[serde(default = "default_severities", deserialize_with = "de_severities")]
    pub blocking_severities: Vec<Severity>,

    #[serde(default = "default_statuses", deserialize_with = "de_statuses")]
    pub blocking_statuses: Vec<Status>,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            blocking_severities: default_severities(),
            blocking_statuses: default_statuses(),
        }
    }
}

impl GatePolicy {
    pub fn blocks(&self, threat: &Threat) -> bool {
        self.blocking_severities.contains(&threat.severity)
            && self.blocking_statuses.contains(&threat.status)
    }
}

fn default_severities() -> Vec<Severity> {
    vec![Severity::High, Severity::Critical]
}

fn default_statuses() -> Vec<Status> {
    vec![Status::Open]
}

fn de_severities<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Severity>, D::Error> {
    let raw = Vec::<String>::deserialize(deserializer)?;
    raw.iter()
        .map(|s| {
            Severity::parse(s)
                .ok_or_else(|| serde::de::Error::custom(format!("unknown severity '{}'", s)))
        })
        .collect()
}

fn de_statuses<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Status>, D::Error> {
    let raw = Vec::<String>::deserialize(deserializer)?;
    raw.iter()
        .map(|s| {
            Status::parse(s).ok_or_else(|| serde::de::Error::custom(format!("unknown status '{}'", s)))
        })
        .collect()
}

/// Load policy configuration from a TOML file.
pub fn load_policy(path: &Path) -> Result<PolicyConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: PolicyConfig = toml::from_str(&content).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), ?config, "loaded gate policy");
    Ok(config)
}

/// Load `.threatgate/policy.toml` under `dir` if it exists.
pub fn discover_policy(dir: &Path) -> Result<Option<PolicyConfig>, ConfigError> {
    let path = dir.join(DEFAULT_POLICY_PATH);
    if !path.is_file() {
        return Ok(None);
    }
    load_policy(&path).map(Some)
}

/// Generate a starter policy file.
pub fn generate_default_policy() -> String {
    r#"# threatgate policy configuration

[gate]
# A threat blocks the gate when its severity AND its status are both listed.
# Severities: low, medium, high, critical
blocking_severities = ["high", "critical"]

# Statuses: open, mitigated, accepted-risk
blocking_statuses = ["open"]
"#
    .to_string()
}
