//! Operator configuration.

use crate::error::{OperatorError, OperatorResult};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How an existing child is brought back to its desired shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePolicy {
    /// Replace the whole object on every pass.
    #[default]
    AlwaysReplace,
    /// Replace only when a field the builder sets differs on the live object.
    SkipUnchanged,
}

impl FromStr for UpdatePolicy {
    type Err = OperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "replace" | "always-replace" => Ok(Self::AlwaysReplace),
            "skip-unchanged" => Ok(Self::SkipUnchanged),
            other => Err(OperatorError::InvalidConfig(format!(
                "unknown update policy: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlwaysReplace => write!(f, "replace"),
            Self::SkipUnchanged => write!(f, "skip-unchanged"),
        }
    }
}

/// Configuration shared by every reconcile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace parents are watched in and children are written to.
    pub namespace: String,
    /// Delay before the next pass while the parent is not yet ready.
    pub requeue_interval: Duration,
    /// Delay before retrying a pass that failed.
    pub error_requeue_interval: Duration,
    /// Write strategy for children that already exist.
    pub update_policy: UpdatePolicy,
    /// Extra whole-pass attempts after an optimistic-concurrency conflict.
    pub max_conflict_retries: u32,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            requeue_interval: Duration::from_secs(5),
            error_requeue_interval: Duration::from_secs(30),
            update_policy: UpdatePolicy::default(),
            max_conflict_retries: 0,
        }
    }
}

impl OperatorConfig {
    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PODINFO_NAMESPACE`: target namespace (default `default`)
    /// - `PODINFO_REQUEUE_SECS`: requeue delay while not ready (default 5)
    /// - `PODINFO_ERROR_REQUEUE_SECS`: requeue delay after an error (default 30)
    /// - `PODINFO_UPDATE_POLICY`: `replace` or `skip-unchanged`
    /// - `PODINFO_CONFLICT_RETRIES`: extra attempts after a conflict (default 0)
    pub fn from_env() -> OperatorResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> OperatorResult<Self> {
        let defaults = Self::default();

        let namespace = lookup("PODINFO_NAMESPACE").unwrap_or(defaults.namespace);

        let requeue_interval = match lookup("PODINFO_REQUEUE_SECS") {
            Some(v) => Duration::from_secs(parse_number("PODINFO_REQUEUE_SECS", &v)?),
            None => defaults.requeue_interval,
        };
        let error_requeue_interval = match lookup("PODINFO_ERROR_REQUEUE_SECS") {
            Some(v) => Duration::from_secs(parse_number("PODINFO_ERROR_REQUEUE_SECS", &v)?),
            None => defaults.error_requeue_interval,
        };
        let update_policy = match lookup("PODINFO_UPDATE_POLICY") {
            Some(v) => v.parse()?,
            None => defaults.update_policy,
        };
        let max_conflict_retries = match lookup("PODINFO_CONFLICT_RETRIES") {
            Some(v) => parse_number("PODINFO_CONFLICT_RETRIES", &v)?,
            None => defaults.max_conflict_retries,
        };

        let config = Self {
            namespace,
            requeue_interval,
            error_requeue_interval,
            update_policy,
            max_conflict_retries,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values that parse but cannot be used.
    pub fn validate(&self) -> OperatorResult<()> {
        if self.namespace.is_empty() {
            return Err(OperatorError::InvalidConfig(
                "namespace must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> OperatorResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| OperatorError::InvalidConfig(format!("{} is not a number: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = OperatorConfig::from_lookup(lookup(&[])).expect("config");
        assert_eq!(config, OperatorConfig::default());
        assert_eq!(config.update_policy, UpdatePolicy::AlwaysReplace);
    }

    #[test]
    fn reads_overrides() {
        let config = OperatorConfig::from_lookup(lookup(&[
            ("PODINFO_NAMESPACE", "apps"),
            ("PODINFO_REQUEUE_SECS", "2"),
            ("PODINFO_ERROR_REQUEUE_SECS", "60"),
            ("PODINFO_UPDATE_POLICY", "skip-unchanged"),
            ("PODINFO_CONFLICT_RETRIES", "3"),
        ]))
        .expect("config");

        assert_eq!(config.namespace, "apps");
        assert_eq!(config.requeue_interval, Duration::from_secs(2));
        assert_eq!(config.error_requeue_interval, Duration::from_secs(60));
        assert_eq!(config.update_policy, UpdatePolicy::SkipUnchanged);
        assert_eq!(config.max_conflict_retries, 3);
    }

    #[test]
    fn rejects_bad_values() {
        let err = OperatorConfig::from_lookup(lookup(&[("PODINFO_REQUEUE_SECS", "soon")]));
        assert!(matches!(err, Err(OperatorError::InvalidConfig(_))));

        let err = OperatorConfig::from_lookup(lookup(&[("PODINFO_UPDATE_POLICY", "patch")]));
        assert!(matches!(err, Err(OperatorError::InvalidConfig(_))));

        let err = OperatorConfig::from_lookup(lookup(&[("PODINFO_NAMESPACE", "")]));
        assert!(matches!(err, Err(OperatorError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_overridden_empty_namespace() {
        let mut config = OperatorConfig::from_lookup(lookup(&[])).expect("config");
        assert!(config.validate().is_ok());

        config.namespace.clear();
        assert!(matches!(
            config.validate(),
            Err(OperatorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn update_policy_round_trips_through_display() {
        for policy in [UpdatePolicy::AlwaysReplace, UpdatePolicy::SkipUnchanged] {
            assert_eq!(policy.to_string().parse::<UpdatePolicy>().ok(), Some(policy));
        }
    }
}
