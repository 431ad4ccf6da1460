// Environment parameters
//
// A flat key -> value map scoped to one environment. Values may be literals or secret references
// (resolved later by `secrets::ParameterResolver`).

use std::collections::BTreeMap;

pub type ParameterMap = BTreeMap<String, String>;

pub const PASSWORD_ROOT: &str = "password_root";
pub const SERVER: &str = "server";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentParameters {
    environment: String,
    values: ParameterMap,
}

impl EnvironmentParameters {
    pub fn new(environment: impl Into<String>, values: ParameterMap) -> Self {
        Self {
            environment: environment.into(),
            values,
        }
    }

    /// Persisted base set overlaid with caller overrides (override wins).
    pub fn merged(
        environment: impl Into<String>,
        base: &ParameterMap,
        overrides: &ParameterMap,
    ) -> Self {
        let mut values = base.clone();
        for (k, v) in overrides {
            values.insert(k.clone(), v.clone());
        }
        Self::new(environment, values)
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn values(&self) -> &ParameterMap {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Value for `key` only when present and non-empty.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn server(&self) -> Option<&str> {
        self.non_empty(SERVER)
    }

    pub fn password_root(&self) -> Option<&str> {
        self.non_empty(PASSWORD_ROOT)
    }

    /// Both root credentials are needed before anything executes.
    pub fn has_root_credentials(&self) -> bool {
        self.server().is_some() && self.password_root().is_some()
    }
}
