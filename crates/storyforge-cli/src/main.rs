use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::PathBuf;
use storyforge_core::{
    ExpectedFormat, ModelResolver, ModelType, Orchestrator, ProviderRegistry, StandardAiRequest,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser)]
#[command(name = "storyforge")]
#[command(version)]
#[command(about = "StoryForge - AI provider orchestration for story writing")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send one request through the orchestrator and print the response
    Ask {
        /// The user prompt
        prompt: String,

        /// Logical operation (e.g. character-detail, plot-ideas)
        #[arg(short = 't', long, default_value = "general")]
        request_type: String,

        /// Model identifier; picked from the request type when omitted
        #[arg(short, long)]
        model: Option<String>,

        /// System prompt
        #[arg(short, long, default_value = "")]
        system: String,

        /// Expected response format: text, json or yaml
        #[arg(short, long, default_value = "text")]
        format: ExpectedFormat,

        #[arg(long)]
        temperature: Option<f32>,

        #[arg(long)]
        max_tokens: Option<u32>,

        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Extra context as a JSON object
        #[arg(long)]
        context: Option<String>,
    },

    /// Show which model and provider would serve a request
    Resolve {
        /// Model identifier to classify
        model: Option<String>,

        /// Request type to pick a default model for
        #[arg(short = 't', long)]
        request_type: Option<String>,
    },

    /// List providers and whether they are enabled
    Providers,

    /// Initialize config directory and default config
    Init,

    /// Show current configuration (secrets masked)
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask {
            prompt,
            request_type,
            model,
            system,
            format,
            temperature,
            max_tokens,
            timeout_ms,
            context,
        } => {
            let mut request = StandardAiRequest::new(request_type, system, prompt).with_format(format);
            request.model = model;
            request.options.temperature = temperature;
            request.options.max_tokens = max_tokens;
            request.options.timeout_ms = timeout_ms;
            if let Some(raw) = context {
                request.context = Some(parse_context(&raw)?);
            }
            cmd_ask(&cli.config, request).await
        }
        Commands::Resolve {
            model,
            request_type,
        } => cmd_resolve(&cli.config, model, request_type),
        Commands::Providers => cmd_providers(&cli.config),
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config),
    }
}

fn parse_context(raw: &str) -> Result<Map<String, Value>> {
    serde_json::from_str(raw).context("--context must be a JSON object")
}

async fn cmd_ask(config_path: &Option<PathBuf>, request: StandardAiRequest) -> Result<()> {
    let cfg = config::load(config_path)?;
    let orchestrator =
        Orchestrator::from_config(&cfg).context("Failed to build provider registry")?;

    let response = orchestrator.process_ai_request(request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_resolve(
    config_path: &Option<PathBuf>,
    model: Option<String>,
    request_type: Option<String>,
) -> Result<()> {
    let cfg = config::load(config_path)?;
    let resolver = ModelResolver::new(cfg.resolver);

    let model = match (model, request_type) {
        (Some(model), _) => model,
        (None, Some(request_type)) => resolver.resolve_default_model(&request_type),
        (None, None) => anyhow::bail!("Pass a model or --request-type"),
    };
    let provider = resolver.resolve_model_type(&model);

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "model": model,
            "provider": provider,
        }))?
    );
    Ok(())
}

fn cmd_providers(config_path: &Option<PathBuf>) -> Result<()> {
    let cfg = config::load(config_path)?;
    let registry = ProviderRegistry::from_config(&cfg)?;

    for provider in ModelType::ALL {
        let status = registry.status(provider);
        println!(
            "{:<10} {:<12} {}",
            provider.as_str(),
            status.as_str(),
            provider.credential_env_var()
        );
    }
    Ok(())
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config::default_config_path();
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&config_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }
        info!("Created default config at {}", config_path.display());
    }

    println!("StoryForge initialized at {}", config_dir.display());
    println!(
        "Edit {} or export provider API keys to get started.",
        config_path.display()
    );
    Ok(())
}

fn cmd_config(config_path: &Option<PathBuf>) -> Result<()> {
    let mut cfg = config::load(config_path)?;
    cfg.providers = cfg.providers.masked();
    println!("{}", toml::to_string_pretty(&cfg)?);
    Ok(())
}
