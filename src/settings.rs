use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{SettingsError, ValidationError};
use crate::models::{ContentUnit, GenerationSettings, SizeRange};
use crate::platform::OptionsStore;

/// Option key of the single settings record.
pub const SETTINGS_KEY: &str = "fakepost_settings";

#[derive(Debug, Clone, serde::Serialize)]
pub struct SavedSettings {
    pub settings: GenerationSettings,
    /// Whether the stored record differed from the saved one.
    pub changed: bool,
}

/// Upper bounds on batch and per-post sizes, from `[content]` in the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub max_posts: u32,
    pub max_title_words: u32,
    pub max_content_words: u32,
    pub max_paragraphs: u32,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_posts: 50,
            max_title_words: 100,
            max_content_words: 5000,
            max_paragraphs: 100,
        }
    }
}

impl SizeLimits {
    /// Reject ranges whose upper end is past the configured limits.
    pub fn check(
        &self,
        posts: SizeRange,
        title_words: SizeRange,
        content: SizeRange,
        unit: ContentUnit,
    ) -> Result<(), ValidationError> {
        if posts.max > self.max_posts {
            return Err(ValidationError::TooManyPosts {
                requested: posts.max,
                limit: self.max_posts,
            });
        }
        at_most("title", title_words.max, self.max_title_words)?;
        match unit {
            ContentUnit::Words => at_most("content", content.max, self.max_content_words),
            ContentUnit::Paragraphs => at_most("content", content.max, self.max_paragraphs),
        }
    }
}

fn at_most(field: &'static str, value: u32, max: u32) -> Result<(), ValidationError> {
    if value > max {
        return Err(ValidationError::AboveMaximum { field, max, value });
    }
    Ok(())
}

#[derive(Clone)]
pub struct SettingsStore {
    options: Arc<dyn OptionsStore>,
    limits: SizeLimits,
}

impl SettingsStore {
    pub fn new(options: Arc<dyn OptionsStore>) -> Self {
        Self {
            options,
            limits: SizeLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SizeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Stored settings, or the defaults when nothing usable is stored.
    pub async fn get(&self) -> GenerationSettings {
        match self.options.get_option(SETTINGS_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(error = %e, "stored settings are corrupt, using defaults");
                    GenerationSettings::default()
                }
            },
            Ok(None) => GenerationSettings::default(),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "failed to read settings, using defaults");
                GenerationSettings::default()
            }
        }
    }

    /// Validate and overwrite the whole settings record.
    pub async fn save(&self, candidate: GenerationSettings) -> Result<SavedSettings, SettingsError> {
        validate_settings(&candidate, &self.limits)?;

        let previous = self.get().await;
        let raw = serde_json::to_string(&candidate).map_err(|e| SettingsError::Persistence(e.to_string()))?;

        self.options
            .set_option(SETTINGS_KEY, &raw)
            .await
            .map_err(|e| SettingsError::Persistence(format!("{e:#}")))?;

        // An unchanged write is still a success; only a read-back mismatch is a failure.
        let stored = self
            .options
            .get_option(SETTINGS_KEY)
            .await
            .map_err(|e| SettingsError::Persistence(format!("{e:#}")))?
            .and_then(|raw| serde_json::from_str::<GenerationSettings>(&raw).ok());
        if stored.as_ref() != Some(&candidate) {
            warn!("settings read-back does not match what was written");
            return Err(SettingsError::Persistence("stored value does not match".to_string()));
        }

        let changed = previous != candidate;
        info!(changed, "settings saved");
        Ok(SavedSettings {
            settings: candidate,
            changed,
        })
    }
}

pub fn validate_settings(settings: &GenerationSettings, limits: &SizeLimits) -> Result<(), ValidationError> {
    check_pair("posts", settings.posts_min, settings.posts_max)?;
    check_pair("title", settings.title_min, settings.title_max)?;
    check_pair("content", settings.content_min, settings.content_max)?;
    limits.check(
        SizeRange::new(settings.posts_min, settings.posts_max),
        SizeRange::new(settings.title_min, settings.title_max),
        SizeRange::new(settings.content_min, settings.content_max),
        settings.content_unit,
    )
}

/// A range pair must start at 1 or more and not be inverted.
pub fn check_pair(pair: &'static str, min: u32, max: u32) -> Result<(), ValidationError> {
    if min < 1 {
        return Err(ValidationError::BelowMinimum {
            field: pair,
            min: 1,
            value: min,
        });
    }
    if max < min {
        return Err(ValidationError::RangeInvalid { pair, min, max });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// In-memory options store with the same "unchanged write returns false" contract.
    #[derive(Default)]
    pub(crate) struct MemoryOptions {
        values: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl OptionsStore for MemoryOptions {
        async fn get_option(&self, key: &str) -> anyhow::Result<Option<String>> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn set_option(&self, key: &str, value: &str) -> anyhow::Result<bool> {
            let mut values = self.values.lock().unwrap();
            if values.get(key).map(String::as_str) == Some(value) {
                return Ok(false);
            }
            values.insert(key.to_string(), value.to_string());
            Ok(true)
        }

        async fn delete_option(&self, key: &str) -> anyhow::Result<bool> {
            Ok(self.values.lock().unwrap().remove(key).is_some())
        }
    }

    fn store() -> (Arc<MemoryOptions>, SettingsStore) {
        let options = Arc::new(MemoryOptions::default());
        (options.clone(), SettingsStore::new(options))
    }

    #[tokio::test]
    async fn get_returns_defaults_when_empty() {
        let (_, settings) = store();
        assert_eq!(settings.get().await, GenerationSettings::default());
    }

    #[tokio::test]
    async fn get_returns_defaults_when_corrupt() {
        let (options, settings) = store();
        options.set_option(SETTINGS_KEY, "{not json").await.unwrap();
        assert_eq!(settings.get().await, GenerationSettings::default());
    }

    #[tokio::test]
    async fn inverted_ranges_are_rejected_and_nothing_is_stored() {
        let (_, settings) = store();
        let good = GenerationSettings {
            posts_min: 2,
            posts_max: 4,
            ..Default::default()
        };
        settings.save(good.clone()).await.unwrap();

        let cases = [
            GenerationSettings {
                posts_min: 5,
                posts_max: 4,
                ..Default::default()
            },
            GenerationSettings {
                title_min: 9,
                title_max: 8,
                ..Default::default()
            },
            GenerationSettings {
                content_min: 101,
                content_max: 100,
                ..Default::default()
            },
        ];
        let expected_pairs = ["posts", "title", "content"];

        for (bad, pair) in cases.into_iter().zip(expected_pairs) {
            match settings.save(bad).await {
                Err(SettingsError::Validation(ValidationError::RangeInvalid { pair: p, .. })) => {
                    assert_eq!(p, pair)
                }
                other => panic!("expected RangeInvalid for {pair}, got {other:?}"),
            }
            assert_eq!(settings.get().await, good);
        }
    }

    #[tokio::test]
    async fn zero_minimum_is_rejected() {
        let (_, settings) = store();
        let bad = GenerationSettings {
            title_min: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.save(bad).await,
            Err(SettingsError::Validation(ValidationError::BelowMinimum { field: "title", .. }))
        ));
    }

    #[tokio::test]
    async fn oversized_ranges_are_rejected_and_nothing_is_stored() {
        let (options, _) = store();
        let settings = SettingsStore::new(options).with_limits(SizeLimits {
            max_posts: 10,
            max_title_words: 12,
            max_content_words: 500,
            max_paragraphs: 8,
        });

        let cases = [
            (
                GenerationSettings {
                    content_max: 4_000_000_000,
                    ..Default::default()
                },
                ValidationError::AboveMaximum {
                    field: "content",
                    max: 500,
                    value: 4_000_000_000,
                },
            ),
            (
                GenerationSettings {
                    title_max: 13,
                    ..Default::default()
                },
                ValidationError::AboveMaximum {
                    field: "title",
                    max: 12,
                    value: 13,
                },
            ),
            (
                GenerationSettings {
                    content_min: 5,
                    content_max: 9,
                    content_unit: ContentUnit::Paragraphs,
                    ..Default::default()
                },
                ValidationError::AboveMaximum {
                    field: "content",
                    max: 8,
                    value: 9,
                },
            ),
            (
                GenerationSettings {
                    posts_max: 11,
                    ..Default::default()
                },
                ValidationError::TooManyPosts {
                    requested: 11,
                    limit: 10,
                },
            ),
        ];

        for (bad, expected) in cases {
            match settings.save(bad).await {
                Err(SettingsError::Validation(e)) => assert_eq!(e, expected),
                other => panic!("expected {expected:?}, got {other:?}"),
            }
            assert_eq!(settings.get().await, GenerationSettings::default());
        }

        // Limits apply to the unit actually chosen.
        let words = GenerationSettings {
            content_max: 400,
            ..Default::default()
        };
        settings.save(words).await.unwrap();
    }

    #[tokio::test]
    async fn identical_save_succeeds_unchanged() {
        let (_, settings) = store();
        let candidate = GenerationSettings {
            credit: true,
            selected_categories: [4, 2].into_iter().collect(),
            ..Default::default()
        };
        let first = settings.save(candidate.clone()).await.unwrap();
        assert!(first.changed);
        let second = settings.save(candidate.clone()).await.unwrap();
        assert!(!second.changed);
        assert_eq!(second.settings, candidate);
        assert_eq!(settings.get().await, candidate);
    }

    #[tokio::test]
    async fn saving_defaults_first_time_is_unchanged() {
        let (_, settings) = store();
        let saved = settings.save(GenerationSettings::default()).await.unwrap();
        assert!(!saved.changed);
    }
}
