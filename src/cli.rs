use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::batch::BatchSizing;
use crate::models::{ContentUnit, SizeSpec};

#[derive(Parser)]
#[command(name = "fakepost", about = "Blog post generator: lorem ipsum filler and Gemini-backed posts")]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate the configuration file
    Validate,

    /// Create a batch of lorem ipsum posts
    Generate {
        #[command(flatten)]
        sizing: SizingArgs,

        /// Sample title words with replacement past the corpus size
        #[arg(long)]
        allow_repeats: bool,
    },

    /// Create a batch of posts with the Gemini API
    GenerateAi {
        /// Topic every post in the batch is about
        topic: String,

        /// informative, casual, professional, creative or technical
        #[arg(long)]
        style: Option<String>,

        /// Model id (defaults to [provider].default_model)
        #[arg(long)]
        model: Option<String>,

        #[command(flatten)]
        sizing: SizingArgs,
    },

    /// Manage the stored Gemini API key
    ApiKey {
        #[command(subcommand)]
        command: ApiKeyCommands,
    },

    /// List models available for the stored API key
    Models,

    /// List categories with post counts
    Categories,
}

#[derive(Subcommand)]
pub enum ApiKeyCommands {
    /// Store a key (prompted for when omitted)
    Set { key: Option<String> },
    /// Remove the stored key
    Clear,
    /// Show whether a key is stored
    Status,
    /// Check a key against the provider without storing it (prompted for when omitted)
    Test { key: Option<String> },
}

/// Batch sizing flags. Anything omitted falls back to the stored settings.
#[derive(Args)]
pub struct SizingArgs {
    /// Number of posts, e.g. "5" or "3-8"
    #[arg(long)]
    pub posts: Option<SizeSpec>,

    /// Title length in words, e.g. "6" or "3-8"
    #[arg(long)]
    pub title_words: Option<SizeSpec>,

    /// Content size in --unit, e.g. "4" or "30-100"
    #[arg(long)]
    pub content: Option<SizeSpec>,

    /// words or paragraphs
    #[arg(long, value_parser = parse_unit)]
    pub unit: Option<ContentUnit>,

    /// Comma-separated category ids
    #[arg(long, value_delimiter = ',')]
    pub categories: Vec<i64>,
}

impl SizingArgs {
    pub fn into_sizing(self) -> BatchSizing {
        BatchSizing {
            posts: self.posts,
            title_words: self.title_words,
            content: self.content,
            content_unit: self.unit,
            categories: (!self.categories.is_empty()).then_some(self.categories),
        }
    }
}

fn parse_unit(s: &str) -> Result<ContentUnit, String> {
    match s.to_lowercase().as_str() {
        "words" => Ok(ContentUnit::Words),
        "paragraphs" => Ok(ContentUnit::Paragraphs),
        other => Err(format!("unknown unit '{other}': expected words or paragraphs")),
    }
}
