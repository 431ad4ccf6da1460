// Parameter resolution (secret references -> literal values)
//
// Every value of an environment map is checked against the secret-reference grammar. Matches are
// fetched from the secret store, optionally projected through a JSON path, and memoized per run
// by their raw reference string. Resolution is sequential and follows map iteration order.
//
// IMPORTANT: resolved values are never logged; only a fingerprint is.

pub mod json_path;
pub mod reference;
pub mod store;

use crate::error::InstallError;
use crate::models::parameters::EnvironmentParameters;
use crate::security::crypto::secret_fingerprint;
use log::info;
use reference::{ReferenceGrammar, SecretReference};
use std::collections::HashMap;
use std::sync::Arc;
use store::SecretStoreClient;

/// Raw reference string -> resolved value, for one orchestration run.
#[derive(Debug, Default)]
pub struct ResolvedSecretCache {
    entries: HashMap<String, String>,
}

impl ResolvedSecretCache {
    pub fn get(&self, raw: &str) -> Option<&str> {
        self.entries.get(raw).map(String::as_str)
    }

    pub fn insert(&mut self, raw: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(raw.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Resolved values, for redaction.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.values().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct ParameterResolver {
    grammar: ReferenceGrammar,
    client: Arc<dyn SecretStoreClient>,
    cache: ResolvedSecretCache,
}

impl ParameterResolver {
    pub fn new(client: Arc<dyn SecretStoreClient>) -> Result<Self, InstallError> {
        let grammar = ReferenceGrammar::new().map_err(|e| {
            InstallError::Other(anyhow::anyhow!(
                "Internal error: failed to compile secret reference grammar: {}",
                e
            ))
        })?;

        Ok(Self {
            grammar,
            client,
            cache: ResolvedSecretCache::default(),
        })
    }

    pub fn cache(&self) -> &ResolvedSecretCache {
        &self.cache
    }

    /// Same keys, every secret reference replaced by its resolved literal.
    pub async fn resolve(
        &mut self,
        params: &EnvironmentParameters,
    ) -> Result<EnvironmentParameters, InstallError> {
        let mut resolved = params.clone();
        let mut secret_count = 0usize;

        for (key, raw) in params.values() {
            if let Some(value) = self.resolve_value(key, raw).await? {
                resolved.set(key.clone(), value);
                secret_count += 1;
            }
        }

        info!(
            "[PHASE: secrets] [STEP: resolve] Resolved {} secret parameter(s) for environment '{}' ({} backend fetch(es) cached)",
            secret_count,
            params.environment(),
            self.cache.len()
        );
        Ok(resolved)
    }

    /// `Ok(None)` for literals.
    pub async fn resolve_value(
        &mut self,
        key: &str,
        raw: &str,
    ) -> Result<Option<String>, InstallError> {
        let reference = self
            .grammar
            .parse(raw)
            .map_err(|e| InstallError::SecretSyntax {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        let Some(reference) = reference else {
            return Ok(None);
        };

        if let Some(cached) = self.cache.get(raw) {
            return Ok(Some(cached.to_string()));
        }

        let value = self.fetch(key, &reference).await?;
        info!(
            "[PHASE: secrets] [STEP: resolve] Parameter '{}' resolved from {} (fingerprint={})",
            key,
            reference.service,
            secret_fingerprint(&value)
        );
        self.cache.insert(raw, value.clone());
        Ok(Some(value))
    }

    async fn fetch(&self, key: &str, reference: &SecretReference) -> Result<String, InstallError> {
        let lookup_error = |reason: String| InstallError::SecretLookup {
            key: key.to_string(),
            reason,
        };

        let body = self
            .client
            .fetch(
                reference.service,
                &reference.parameter,
                reference.profile.as_deref(),
                reference.region.as_deref(),
            )
            .await
            .map_err(|e| lookup_error(e.to_string()))?;

        let Some(path) = reference.json_path.as_deref() else {
            return Ok(body);
        };

        let document: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            lookup_error(format!(
                "secret '{}' is not valid JSON (needed for path '{}'): {}",
                reference.parameter, path, e
            ))
        })?;

        match json_path::select_first(&document, path).map_err(|e| lookup_error(e.to_string()))? {
            Some(value) => Ok(json_path::render(&value)),
            None => Err(lookup_error(format!(
                "JSON path '{}' matched nothing in secret '{}'",
                path, reference.parameter
            ))),
        }
    }
}
