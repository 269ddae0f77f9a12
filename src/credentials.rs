use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use tracing::info;

use crate::catalog::{ModelInfo, rank_models};
use crate::error::{CredentialError, ValidationError};
use crate::gemini::TextProvider;
use crate::platform::OptionsStore;

/// Option key of the stored provider API key.
pub const API_KEY_KEY: &str = "fakepost_gemini_key";

static KEY_SHAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^AIza[0-9A-Za-z_-]{35}$").unwrap());

/// Whether `candidate` has the provider's key shape.
pub fn is_valid_key_format(candidate: &str) -> bool {
    KEY_SHAPE.is_match(candidate)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatus {
    pub has_key: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySaved {
    Saved,
    Disconnected,
}

impl KeySaved {
    pub fn message(self) -> &'static str {
        match self {
            KeySaved::Saved => "API key saved successfully",
            KeySaved::Disconnected => "API key disconnected successfully",
        }
    }
}

/// Stores and checks the provider API key. The key itself never leaves this type
/// except through `stored_key`, which the AI generator uses.
#[derive(Clone)]
pub struct CredentialManager {
    options: Arc<dyn OptionsStore>,
    provider: Arc<dyn TextProvider>,
}

impl CredentialManager {
    pub fn new(options: Arc<dyn OptionsStore>, provider: Arc<dyn TextProvider>) -> Self {
        Self { options, provider }
    }

    pub async fn status(&self) -> anyhow::Result<KeyStatus> {
        Ok(KeyStatus {
            has_key: self.stored_key().await?.is_some(),
        })
    }

    /// Store a key, or disconnect when `candidate` is empty.
    /// Re-saving the current key is a success.
    pub async fn save(&self, candidate: &str) -> Result<KeySaved, CredentialError> {
        let candidate = candidate.trim();

        if candidate.is_empty() {
            self.options
                .delete_option(API_KEY_KEY)
                .await
                .map_err(|e| CredentialError::Persistence(format!("{e:#}")))?;
            info!("API key disconnected");
            return Ok(KeySaved::Disconnected);
        }

        if !is_valid_key_format(candidate) {
            return Err(ValidationError::InvalidKeyFormat.into());
        }

        self.options
            .set_option(API_KEY_KEY, candidate)
            .await
            .map_err(|e| CredentialError::Persistence(format!("{e:#}")))?;
        info!("API key saved");
        Ok(KeySaved::Saved)
    }

    /// Check `candidate` against the provider with one minimal request.
    pub async fn test(&self, candidate: &str) -> Result<(), CredentialError> {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return Err(ValidationError::MissingKey.into());
        }
        self.provider.check_key(candidate).await?;
        Ok(())
    }

    /// Generation-capable models for the stored key, in preference order.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, CredentialError> {
        let key = self
            .stored_key()
            .await
            .map_err(|e| CredentialError::Persistence(format!("{e:#}")))?
            .ok_or(ValidationError::NoKeyConfigured)?;
        let raw = self.provider.list_models(&key).await?;
        Ok(rank_models(raw))
    }

    pub(crate) async fn stored_key(&self) -> anyhow::Result<Option<String>> {
        Ok(self
            .options
            .get_option(API_KEY_KEY)
            .await?
            .filter(|k| !k.is_empty()))
    }
}
