// Encryption-at-rest for persisted credentials
//
// Root credentials written back to the parameter store are sealed with AES-256-GCM:
//   "ENCv1:" + base64(nonce || ciphertext+tag)
// The master key is a base64 file under the state folder, created on first use.
// Values without the prefix are returned unchanged when opened.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use log::{info, warn};
use ring::rand::{SecureRandom, SystemRandom};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

const SEALED_PREFIX: &str = "ENCv1:";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Parameter keys whose values are sealed before they hit disk.
pub fn is_credential_key(key: &str) -> bool {
    key.to_ascii_lowercase().contains("password")
}

#[derive(Debug)]
pub struct SecretProtector {
    key_path: PathBuf,
    key: OnceCell<[u8; KEY_LEN]>,
}

impl SecretProtector {
    pub fn new(key_path: PathBuf) -> Self {
        Self {
            key_path,
            key: OnceCell::new(),
        }
    }

    pub fn is_sealed(&self, value: &str) -> bool {
        value.starts_with(SEALED_PREFIX)
    }

    pub async fn seal(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() || self.is_sealed(plaintext) {
            return Ok(plaintext.to_string());
        }

        let cipher = self.cipher().await?;
        let mut nonce = [0u8; NONCE_LEN];
        SystemRandom::new()
            .fill(&mut nonce)
            .map_err(|_| anyhow::anyhow!("Failed to generate nonce"))?;

        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| anyhow::anyhow!("Credential encryption failed"))?;

        let mut blob = nonce.to_vec();
        blob.extend_from_slice(&sealed);
        Ok(format!("{}{}", SEALED_PREFIX, B64.encode(blob)))
    }

    pub async fn open(&self, value: &str) -> Result<String> {
        let Some(encoded) = value.strip_prefix(SEALED_PREFIX) else {
            return Ok(value.to_string());
        };
        if encoded.is_empty() {
            return Ok(String::new());
        }

        let blob = B64
            .decode(encoded)
            .context("Sealed credential is not valid base64")?;
        if blob.len() <= NONCE_LEN {
            anyhow::bail!("Sealed credential is truncated");
        }
        let (nonce, sealed) = blob.split_at(NONCE_LEN);

        let cipher = self.cipher().await?;
        let plain = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| anyhow::anyhow!("Credential decryption failed (wrong master key?)"))?;
        String::from_utf8(plain).context("Decrypted credential is not valid UTF-8")
    }

    async fn cipher(&self) -> Result<Aes256Gcm> {
        let key = self.key.get_or_try_init(|| self.load_or_create_key()).await?;
        Aes256Gcm::new_from_slice(key)
            .map_err(|_| anyhow::anyhow!("Internal error: invalid AES-256 key length"))
    }

    async fn load_or_create_key(&self) -> Result<[u8; KEY_LEN]> {
        if tokio::fs::try_exists(&self.key_path).await.unwrap_or(false) {
            let encoded = tokio::fs::read_to_string(&self.key_path)
                .await
                .with_context(|| format!("Failed to read master key: {:?}", self.key_path))?;
            let decoded = B64
                .decode(encoded.trim())
                .context("Master key file is not valid base64")?;
            return decoded.try_into().map_err(|_| {
                anyhow::anyhow!("Master key file has invalid length (expected {KEY_LEN} bytes)")
            });
        }

        if let Some(parent) = self.key_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create key directory: {:?}", parent))?;
        }

        let mut key = [0u8; KEY_LEN];
        SystemRandom::new()
            .fill(&mut key)
            .map_err(|_| anyhow::anyhow!("Failed to generate master key"))?;
        let encoded = B64.encode(key);

        let write_once = || async {
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&self.key_path)
                .await
                .with_context(|| format!("Failed to create master key: {:?}", self.key_path))?;
            file.write_all(encoded.as_bytes()).await?;
            file.flush().await?;
            Ok::<(), anyhow::Error>(())
        };

        let strategy = ExponentialBackoff::from_millis(50)
            .factor(2)
            .max_delay(std::time::Duration::from_millis(750))
            .take(3)
            .map(jitter);

        match RetryIf::spawn(strategy, write_once, is_transient_io_error).await {
            Ok(()) => info!(
                "[PHASE: security] [STEP: master_key] Created master key at {:?}",
                self.key_path
            ),
            // Another process may have won the create-new race; this run keeps its in-memory key.
            Err(e) => warn!(
                "[PHASE: security] [STEP: master_key] Could not persist master key: {:#}",
                e
            ),
        }

        Ok(key)
    }
}

fn is_transient_io_error(err: &anyhow::Error) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("used by another process")
        || msg.contains("access is denied")
        || msg.contains("sharing violation")
        || msg.contains("resource temporarily unavailable")
}

/// Default master key location under the installer state folder.
pub fn default_key_path(state_dir: &Path) -> PathBuf {
    state_dir.join("secrets").join("parameters_master_key.b64")
}
