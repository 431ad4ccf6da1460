// Secret store clients
//
// `SecretStoreClient` is the seam the resolver talks to. Production uses `AwsSecretStore`
// (SSM Parameter Store + Secrets Manager); tests use counting stubs.
//
// Authentication is entirely delegated to the AWS default credential chain / named profiles.

use super::reference::SecretService;
use async_trait::async_trait;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_ssm::config::Region;
use log::{debug, info};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Error)]
pub enum SecretFetchError {
    #[error("{service} has no value for '{parameter}'")]
    NotFound {
        service: SecretService,
        parameter: String,
    },
    #[error("{service} request for '{parameter}' failed: {message}")]
    Transport {
        service: SecretService,
        parameter: String,
        message: String,
    },
}

#[async_trait]
pub trait SecretStoreClient: Send + Sync {
    /// Fetch the raw secret value for `parameter` from `service`.
    async fn fetch(
        &self,
        service: SecretService,
        parameter: &str,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> Result<String, SecretFetchError>;
}

type ClientKey = (Option<String>, Option<String>);

/// AWS-backed client. SDK clients are built lazily and reused per (profile, region).
#[derive(Default)]
pub struct AwsSecretStore {
    ssm_clients: Mutex<HashMap<ClientKey, aws_sdk_ssm::Client>>,
    secrets_manager_clients: Mutex<HashMap<ClientKey, aws_sdk_secretsmanager::Client>>,
}

impl AwsSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sdk_config(profile: Option<&str>, region: Option<&str>) -> aws_config::SdkConfig {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        loader.load().await
    }

    async fn ssm_client(&self, profile: Option<&str>, region: Option<&str>) -> aws_sdk_ssm::Client {
        let key: ClientKey = (profile.map(str::to_string), region.map(str::to_string));
        let mut clients = self.ssm_clients.lock().await;
        if let Some(client) = clients.get(&key) {
            return client.clone();
        }

        debug!(
            "[PHASE: secrets] [STEP: client_init] Creating SSM client (profile={:?}, region={:?})",
            profile, region
        );
        let client = aws_sdk_ssm::Client::new(&Self::sdk_config(profile, region).await);
        clients.insert(key, client.clone());
        client
    }

    async fn secrets_manager_client(
        &self,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> aws_sdk_secretsmanager::Client {
        let key: ClientKey = (profile.map(str::to_string), region.map(str::to_string));
        let mut clients = self.secrets_manager_clients.lock().await;
        if let Some(client) = clients.get(&key) {
            return client.clone();
        }

        debug!(
            "[PHASE: secrets] [STEP: client_init] Creating Secrets Manager client (profile={:?}, region={:?})",
            profile, region
        );
        let client = aws_sdk_secretsmanager::Client::new(&Self::sdk_config(profile, region).await);
        clients.insert(key, client.clone());
        client
    }

    async fn fetch_ssm(
        &self,
        parameter: &str,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> Result<String, SecretFetchError> {
        let client = self.ssm_client(profile, region).await;
        let result = client
            .get_parameter()
            .name(parameter)
            .with_decryption(true)
            .send()
            .await;

        match result {
            Ok(output) => output
                .parameter()
                .and_then(|p| p.value())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| SecretFetchError::NotFound {
                    service: SecretService::Ssm,
                    parameter: parameter.to_string(),
                }),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_parameter_not_found() {
                    Err(SecretFetchError::NotFound {
                        service: SecretService::Ssm,
                        parameter: parameter.to_string(),
                    })
                } else {
                    Err(SecretFetchError::Transport {
                        service: SecretService::Ssm,
                        parameter: parameter.to_string(),
                        message: DisplayErrorContext(&err).to_string(),
                    })
                }
            }
        }
    }

    async fn fetch_secrets_manager(
        &self,
        parameter: &str,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> Result<String, SecretFetchError> {
        let client = self.secrets_manager_client(profile, region).await;
        let result = client.get_secret_value().secret_id(parameter).send().await;

        match result {
            Ok(output) => output
                .secret_string()
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| SecretFetchError::NotFound {
                    service: SecretService::SecretsManager,
                    parameter: parameter.to_string(),
                }),
            Err(err) => {
                let err = err.into_service_error();
                if err.is_resource_not_found_exception() {
                    Err(SecretFetchError::NotFound {
                        service: SecretService::SecretsManager,
                        parameter: parameter.to_string(),
                    })
                } else {
                    Err(SecretFetchError::Transport {
                        service: SecretService::SecretsManager,
                        parameter: parameter.to_string(),
                        message: DisplayErrorContext(&err).to_string(),
                    })
                }
            }
        }
    }
}

#[async_trait]
impl SecretStoreClient for AwsSecretStore {
    async fn fetch(
        &self,
        service: SecretService,
        parameter: &str,
        profile: Option<&str>,
        region: Option<&str>,
    ) -> Result<String, SecretFetchError> {
        info!(
            "[PHASE: secrets] [STEP: fetch] Fetching {} parameter '{}' (profile={}, region={})",
            service,
            parameter,
            profile.unwrap_or("default"),
            region.unwrap_or("default")
        );

        match service {
            SecretService::Ssm => self.fetch_ssm(parameter, profile, region).await,
            SecretService::SecretsManager => {
                self.fetch_secrets_manager(parameter, profile, region).await
            }
        }
    }
}
