//! Batch post creation: resolve a request into a plan, draft each post, persist
//! it, fix up its categories, and aggregate per-item results.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::ai::{Style, ai_credit_block, build_prompt, parse_response};
use crate::credentials::CredentialManager;
use crate::error::{BatchError, ProviderError, ValidationError};
use crate::filler::{generate_content, generate_title, generate_word_budget_content};
use crate::gemini::TextProvider;
use crate::models::{
    ContentUnit, GeneratedPost, GenerationSettings, NewPost, PostDraft, SizeRange, SizeSpec, serialize_blocks,
};
use crate::platform::ContentStore;
use crate::settings::{SettingsStore, SizeLimits, check_pair};

/// Paragraph length assumed when a word budget is turned into a paragraph target.
const WORDS_PER_AI_PARAGRAPH: u32 = 30;

/// Sizing fields shared by both generation endpoints. Missing fields fall back
/// to the stored settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSizing {
    pub posts: Option<SizeSpec>,
    pub title_words: Option<SizeSpec>,
    pub content: Option<SizeSpec>,
    pub content_unit: Option<ContentUnit>,
    pub categories: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePostsParams {
    #[serde(flatten)]
    pub sizing: BatchSizing,
    /// Sample title words with replacement when more are asked for than the corpus holds.
    #[serde(default)]
    pub allow_repeats: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAiPostsParams {
    #[serde(default)]
    pub topic: String,
    pub style: Option<String>,
    pub model: Option<String>,
    #[serde(flatten)]
    pub sizing: BatchSizing,
}

/// A fully resolved, validated batch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub post_count: u32,
    pub title_words: SizeRange,
    pub content: SizeRange,
    pub content_unit: ContentUnit,
    pub categories: Vec<i64>,
    pub credit: bool,
}

/// Fill every missing field from `settings`, validate, and draw the post count.
pub fn resolve_plan(
    sizing: &BatchSizing,
    settings: &GenerationSettings,
    limits: &SizeLimits,
) -> Result<BatchPlan, ValidationError> {
    let posts = sizing
        .posts
        .map(SizeRange::from)
        .unwrap_or(SizeRange::new(settings.posts_min, settings.posts_max));
    let title_words = sizing
        .title_words
        .map(SizeRange::from)
        .unwrap_or(SizeRange::new(settings.title_min, settings.title_max));
    let content = sizing
        .content
        .map(SizeRange::from)
        .unwrap_or(SizeRange::new(settings.content_min, settings.content_max));

    check_pair("posts", posts.min, posts.max)?;
    check_pair("title", title_words.min, title_words.max)?;
    check_pair("content", content.min, content.max)?;
    let content_unit = sizing.content_unit.unwrap_or(settings.content_unit);
    limits.check(posts, title_words, content, content_unit)?;

    // Keep the first occurrence of each id, in request order.
    let mut seen = HashSet::new();
    let mut categories = sizing
        .categories
        .clone()
        .unwrap_or_else(|| settings.selected_categories.iter().copied().collect());
    categories.retain(|id| seen.insert(*id));

    let post_count = posts.draw(&mut rand::rng());

    Ok(BatchPlan {
        post_count,
        title_words,
        content,
        content_unit,
        categories,
        credit: settings.credit,
    })
}

/// Sizes for one post of a batch.
#[derive(Debug, Clone, Copy)]
pub struct ItemSpec {
    /// 1-based position in the batch.
    pub index: usize,
    pub total: usize,
    pub title_words: u32,
    pub content_size: u32,
    pub content_unit: ContentUnit,
}

/// Produces one post draft per batch item.
#[async_trait]
pub trait DraftSource: Send + Sync {
    async fn draft(&self, item: ItemSpec) -> Result<PostDraft, ProviderError>;
    /// Summary for a batch in which `count` posts were created.
    fn success_message(&self, count: usize, categories: &[String]) -> String;
    fn failure_message(&self) -> &'static str;
}

/// Lorem ipsum posts.
pub struct FillerSource {
    pub allow_repeats: bool,
    pub credit_url: Option<String>,
}

#[async_trait]
impl DraftSource for FillerSource {
    async fn draft(&self, item: ItemSpec) -> Result<PostDraft, ProviderError> {
        let mut rng = rand::rng();
        let credit = self.credit_url.as_deref();
        let title = generate_title(item.title_words as usize, self.allow_repeats, &mut rng);
        let blocks = match item.content_unit {
            ContentUnit::Paragraphs => generate_content(item.content_size as usize, credit, &mut rng),
            ContentUnit::Words => generate_word_budget_content(item.content_size, credit, &mut rng),
        };
        Ok(PostDraft { title, blocks })
    }

    fn success_message(&self, count: usize, categories: &[String]) -> String {
        let mut message = format!("Successfully created {count} post{}", plural(count));
        if !categories.is_empty() {
            message.push_str(&format!(" in categories: {}", categories.join(", ")));
        }
        message
    }

    fn failure_message(&self) -> &'static str {
        "Failed to create any posts."
    }
}

/// Provider-generated posts on one topic.
pub struct AiSource {
    pub provider: Arc<dyn TextProvider>,
    pub api_key: String,
    pub model: String,
    pub topic: String,
    pub style: Style,
    pub credit_url: Option<String>,
}

#[async_trait]
impl DraftSource for AiSource {
    async fn draft(&self, item: ItemSpec) -> Result<PostDraft, ProviderError> {
        let paragraphs = match item.content_unit {
            ContentUnit::Paragraphs => item.content_size,
            ContentUnit::Words => (item.content_size / WORDS_PER_AI_PARAGRAPH).max(1),
        };
        let prompt = build_prompt(
            &self.topic,
            self.style,
            item.title_words,
            paragraphs,
            item.index,
            item.total,
        );

        let text = self.provider.generate(&self.api_key, &self.model, &prompt).await?;
        let parsed = parse_response(&text);

        let mut blocks = parsed.blocks;
        if let Some(url) = &self.credit_url {
            blocks.push(ai_credit_block(url));
        }
        Ok(PostDraft {
            title: parsed.title,
            blocks,
        })
    }

    fn success_message(&self, count: usize, _categories: &[String]) -> String {
        format!(
            "Successfully generated {count} AI-powered post{} on topic \"{}\"",
            plural(count),
            self.topic
        )
    }

    fn failure_message(&self) -> &'static str {
        "Failed to generate any posts."
    }
}

#[derive(Debug, Error)]
enum ItemError {
    #[error(transparent)]
    Draft(#[from] ProviderError),
    #[error("{0}")]
    Persistence(String),
}

/// Aggregated outcome of a batch with at least one created post.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub created_posts: Vec<GeneratedPost>,
    pub success_count: usize,
    pub error_count: usize,
    pub errors: Vec<String>,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub message: String,
    pub result: BatchResult,
}

/// Run `plan.post_count` items strictly in order. Item failures are collected,
/// never retried, and never abort the batch.
pub async fn run_batch(
    store: &dyn ContentStore,
    source: &dyn DraftSource,
    plan: &BatchPlan,
) -> Result<BatchOutcome, BatchError> {
    let total = plan.post_count as usize;
    let default_category = if plan.categories.is_empty() {
        None
    } else {
        store.default_category().await.unwrap_or_else(|e| {
            warn!(error = %format!("{e:#}"), "failed to read default category");
            None
        })
    };

    let mut created = Vec::with_capacity(total);
    let mut errors = Vec::new();

    for index in 1..=total {
        // Sizes are drawn again for every item.
        let item = {
            let mut rng = rand::rng();
            ItemSpec {
                index,
                total,
                title_words: plan.title_words.draw(&mut rng),
                content_size: plan.content.draw(&mut rng),
                content_unit: plan.content_unit,
            }
        };

        match create_one(store, source, plan, default_category, item).await {
            Ok(post) => created.push(post),
            Err(e) => {
                warn!(index, error = %e, "post failed");
                errors.push(format!("Post {index}: {e}"));
            }
        }
    }

    if created.is_empty() {
        return Err(BatchError::NothingCreated(format!(
            "{} {}",
            source.failure_message(),
            errors.join("; ")
        )));
    }

    let categories = category_names(store, &plan.categories).await;

    let mut message = source.success_message(created.len(), &categories);
    if !errors.is_empty() {
        message.push_str(&format!(" ({} failed)", errors.len()));
    }

    info!(created = created.len(), failed = errors.len(), "batch finished");

    Ok(BatchOutcome {
        message,
        result: BatchResult {
            success_count: created.len(),
            error_count: errors.len(),
            created_posts: created,
            errors,
            categories,
        },
    })
}

async fn create_one(
    store: &dyn ContentStore,
    source: &dyn DraftSource,
    plan: &BatchPlan,
    default_category: Option<i64>,
    item: ItemSpec,
) -> Result<GeneratedPost, ItemError> {
    let draft = source.draft(item).await?;
    let content = serialize_blocks(&draft.blocks);

    let id = store
        .create_post(NewPost {
            title: draft.title.clone(),
            content: content.clone(),
            categories: plan.categories.clone(),
        })
        .await
        .map_err(|e| ItemError::Persistence(format!("{e:#}")))?;

    // The store may auto-assign its default category on create; reassert the
    // requested set and drop the default unless it was asked for.
    if !plan.categories.is_empty() {
        if let Err(e) = store.set_categories(id, &plan.categories).await {
            warn!(post_id = id, error = %format!("{e:#}"), "failed to assign categories");
        }
        if let Some(default) = default_category.filter(|d| !plan.categories.contains(d)) {
            if let Err(e) = store.remove_category(id, default).await {
                warn!(post_id = id, error = %format!("{e:#}"), "failed to remove default category");
            }
        }
    }

    let url = store.permalink(id).await.unwrap_or_else(|e| {
        warn!(post_id = id, error = %format!("{e:#}"), "failed to resolve permalink");
        String::new()
    });

    Ok(GeneratedPost {
        id,
        title: draft.title,
        content,
        url,
    })
}

/// Names of the requested categories, in request order.
async fn category_names(store: &dyn ContentStore, ids: &[i64]) -> Vec<String> {
    if ids.is_empty() {
        return Vec::new();
    }
    match store.list_categories().await {
        Ok(all) => ids
            .iter()
            .filter_map(|id| all.iter().find(|c| c.id == *id).map(|c| c.name.clone()))
            .collect(),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "failed to look up category names");
            Vec::new()
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

/// Limits and defaults applied to every batch.
#[derive(Debug, Clone)]
pub struct GenerationDefaults {
    pub limits: SizeLimits,
    pub default_model: String,
    pub credit_url: String,
}

/// Entry point for both generation modes, shared by the HTTP handlers and the CLI.
#[derive(Clone)]
pub struct PostService {
    pub content: Arc<dyn ContentStore>,
    pub settings: SettingsStore,
    pub credentials: CredentialManager,
    pub provider: Arc<dyn TextProvider>,
    pub defaults: GenerationDefaults,
}

impl PostService {
    pub async fn generate_filler(&self, params: GeneratePostsParams) -> Result<BatchOutcome, BatchError> {
        let settings = self.settings.get().await;
        let plan = self.plan(&params.sizing, &settings).await?;
        info!(posts = plan.post_count, mode = "filler", "starting batch");

        let source = FillerSource {
            allow_repeats: params.allow_repeats,
            credit_url: plan.credit.then(|| self.defaults.credit_url.clone()),
        };
        run_batch(self.content.as_ref(), &source, &plan).await
    }

    pub async fn generate_ai(&self, params: GenerateAiPostsParams) -> Result<BatchOutcome, BatchError> {
        let topic = params.topic.trim().to_string();
        if topic.is_empty() {
            return Err(ValidationError::MissingTopic.into());
        }

        let api_key = self
            .credentials
            .stored_key()
            .await
            .map_err(|e| BatchError::Store(format!("{e:#}")))?
            .ok_or(ValidationError::ApiKeyNotConfigured)?;

        let settings = self.settings.get().await;
        let plan = self.plan(&params.sizing, &settings).await?;

        let model = params
            .model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.defaults.default_model.clone());
        let style = Style::from_name(params.style.as_deref().unwrap_or_default());
        info!(posts = plan.post_count, model = %model, style = ?style, mode = "ai", "starting batch");

        let source = AiSource {
            provider: self.provider.clone(),
            api_key,
            model,
            topic,
            style,
            credit_url: plan.credit.then(|| self.defaults.credit_url.clone()),
        };
        run_batch(self.content.as_ref(), &source, &plan).await
    }

    async fn plan(&self, sizing: &BatchSizing, settings: &GenerationSettings) -> Result<BatchPlan, BatchError> {
        let plan = resolve_plan(sizing, settings, &self.defaults.limits)?;
        check_categories(self.content.as_ref(), &plan.categories).await?;
        Ok(plan)
    }
}

/// Every requested category must exist in the store.
pub async fn check_categories(store: &dyn ContentStore, ids: &[i64]) -> Result<(), BatchError> {
    if ids.is_empty() {
        return Ok(());
    }
    let known = store
        .list_categories()
        .await
        .map_err(|e| BatchError::Store(format!("{e:#}")))?;
    match ids.iter().find(|id| !known.iter().any(|c| c.id == **id)) {
        Some(missing) => Err(ValidationError::UnknownCategory(*missing).into()),
        None => Ok(()),
    }
}
