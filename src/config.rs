// src/config.rs
use crate::error::ConfigError;
use crate::strata::StrataColumns;
use std::env;

pub const STRATA_COLUMN_VAR: &str = "strata_column";
pub const VALUE_COLUMN_VAR: &str = "value_column";

/// Column names fixed per deployment; survey and region columns arrive per invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodConfig {
    pub strata_column: String,
    pub value_column: String,
}

impl MethodConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key → value source. Every absent or blank key is reported.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut required = |key: &'static str| match lookup(key) {
            Some(v) if !v.trim().is_empty() => Some(v),
            _ => {
                missing.push(key);
                None
            }
        };
        let strata_column = required(STRATA_COLUMN_VAR);
        let value_column = required(VALUE_COLUMN_VAR);

        match (strata_column, value_column) {
            (Some(strata_column), Some(value_column)) => Ok(Self {
                strata_column,
                value_column,
            }),
            _ => Err(ConfigError::Invalid(missing.join(", "))),
        }
    }

    pub fn columns(&self, survey_column: &str, region_column: &str) -> StrataColumns {
        StrataColumns::new(
            self.value_column.as_str(),
            survey_column,
            region_column,
            self.strata_column.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_loads_both_columns() {
        let vars = source(&[("strata_column", "strata"), ("value_column", "Q608_total")]);
        let cfg = MethodConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(cfg.strata_column, "strata");
        assert_eq!(cfg.value_column, "Q608_total");

        let cols = cfg.columns("survey", "region");
        assert_eq!(cols, StrataColumns::new("Q608_total", "survey", "region", "strata"));
    }

    #[test]
    fn test_reports_every_missing_key() {
        let vars = source(&[("value_column", "  ")]);
        let err = MethodConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert_eq!(err, ConfigError::Invalid("strata_column, value_column".into()));
        assert!(err
            .to_string()
            .starts_with("Error validating environment parameters:"));
    }
}
