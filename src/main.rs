mod ai;
mod batch;
mod catalog;
mod cli;
mod config;
mod credentials;
mod daemon;
mod db;
mod error;
mod filler;
mod gemini;
mod models;
mod platform;
mod server;
mod settings;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use crate::batch::{BatchOutcome, GenerateAiPostsParams, GeneratePostsParams};
use crate::cli::{ApiKeyCommands, Cli, Commands};
use crate::config::{Config, load_config, validate_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config).with_context(|| format!("loading config from {}", cli.config.display()))?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.fakepost.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(config_path = %cli.config.display(), "config loaded");

    validate_config(&config).context("config validation failed")?;
    info!("config validated successfully");

    match cli.command {
        Some(Commands::Validate) => {
            println!("Configuration is valid.");
        }
        Some(command) => {
            run_command(command, &config).await?;
        }
        None => {
            daemon::run(config).await?;
        }
    }

    Ok(())
}

/// One-shot commands against the database and provider.
async fn run_command(command: Commands, config: &Config) -> Result<()> {
    let (pool, service) = daemon::open_services(config).await?;

    match command {
        Commands::Validate => {}
        Commands::Generate { sizing, allow_repeats } => {
            let params = GeneratePostsParams {
                sizing: sizing.into_sizing(),
                allow_repeats,
            };
            print_outcome(&service.generate_filler(params).await?);
        }
        Commands::GenerateAi {
            topic,
            style,
            model,
            sizing,
        } => {
            let params = GenerateAiPostsParams {
                topic,
                style,
                model,
                sizing: sizing.into_sizing(),
            };
            print_outcome(&service.generate_ai(params).await?);
        }
        Commands::ApiKey { command } => match command {
            ApiKeyCommands::Set { key } => {
                let key = read_key(key)?;
                let saved = service.credentials.save(&key).await?;
                println!("{}", saved.message());
            }
            ApiKeyCommands::Clear => {
                let saved = service.credentials.save("").await?;
                println!("{}", saved.message());
            }
            ApiKeyCommands::Status => {
                let status = service.credentials.status().await?;
                println!("API key configured: {}", if status.has_key { "yes" } else { "no" });
            }
            ApiKeyCommands::Test { key } => {
                let key = read_key(key)?;
                service.credentials.test(&key).await?;
                println!("API key is valid");
            }
        },
        Commands::Models => {
            for model in service.credentials.list_models().await? {
                println!("{:<28} {:<28} {}", model.id, model.name, model.description);
            }
        }
        Commands::Categories => {
            for category in service.content.list_categories().await? {
                println!("{:>4}  {:<24} {:>5} posts", category.id, category.name, category.count);
            }
        }
    }

    pool.close().await;
    Ok(())
}

fn read_key(key: Option<String>) -> Result<String> {
    match key {
        Some(k) => Ok(k),
        None => rpassword::prompt_password_stdout("Gemini API key: ").context("reading API key"),
    }
}

fn print_outcome(outcome: &BatchOutcome) {
    println!("{}", outcome.message);
    for post in &outcome.result.created_posts {
        println!("  #{} {} {}", post.id, post.title, post.url);
    }
    for error in &outcome.result.errors {
        println!("  {error}");
    }
}
