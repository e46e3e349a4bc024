use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::future::join_all;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use leadform::adapters::{self, FileStore, ReqwestTransport, SystemClock, TracingNotifier};
use leadform::config::LeadformConfig;
use leadform::submission::{
    CaptureForm, FormSchema, FormSnapshot, SubmissionCache, SubmissionController,
};

#[derive(Debug, Parser)]
#[command(name = "leadform", version, about = "Email capture form controller")]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Submit an email through the debounced capture form
    Submit {
        /// Email address to submit
        #[arg(long)]
        email: String,

        /// Extra field value, as name=value
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,

        /// Fire this many submit events back to back
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
    /// Show whether an email is suppressed by the local cache
    Status {
        /// Email address to look up
        #[arg(long)]
        email: String,
    },
    /// Validate configuration and the form schema
    CheckConfig,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = LeadformConfig::load(cli.config.as_deref())?;
    info!(version = env!("CARGO_PKG_VERSION"), "Configuration loaded");

    match cli.command {
        Command::Submit {
            email,
            fields,
            repeat,
        } => submit(&config, email, fields, repeat).await,
        Command::Status { email } => status(&config, &email),
        Command::CheckConfig => {
            let schema = FormSchema::from_config(&config.form)?;
            info!(
                method = %schema.method(),
                action = %schema.action(),
                fields = ?schema.fields(),
                "Configuration is valid"
            );
            Ok(())
        }
    }
}

fn load_cache(config: &LeadformConfig) -> anyhow::Result<SubmissionCache> {
    Ok(SubmissionCache::load(
        Arc::new(FileStore::new(&config.storage.path)),
        config.storage.key.clone(),
        config.record_ttl()?,
        Arc::new(SystemClock::new()),
    ))
}

async fn submit(
    config: &LeadformConfig,
    email: String,
    fields: Vec<(String, String)>,
    repeat: u32,
) -> anyhow::Result<()> {
    let schema = FormSchema::from_config(&config.form)?;
    let client = adapters::http_client(&config.http)?;
    let tokens = adapters::token_provider(&config.captcha, client.clone())?;

    let controller = SubmissionController::new(
        schema,
        load_cache(config)?,
        tokens,
        Arc::new(ReqwestTransport::new(client)),
        Arc::new(TracingNotifier::new(config.messages.clone())),
    )
    .with_captcha_action(config.captcha.action.clone())
    .with_messages(config.messages.clone());

    let form = CaptureForm::new(Arc::new(controller), config.debounce_delay());

    let mut snapshot: FormSnapshot = fields.into_iter().collect();
    snapshot.set(config.form.email_field.clone(), email);

    let events = (0..repeat.max(1))
        .map(|_| form.on_submit(snapshot.clone()))
        .collect::<Vec<_>>();
    info!(events = events.len(), "Submit events fired");

    match join_all(events).await.pop().flatten() {
        Some(Ok(outcome)) => {
            info!(?outcome, "Submission finished");
            Ok(())
        }
        Some(Err(e)) => {
            error!(error = %e, "Submission failed");
            Err(e.into())
        }
        None => anyhow::bail!("submission was dropped before completing"),
    }
}

fn status(config: &LeadformConfig, email: &str) -> anyhow::Result<()> {
    let cache = load_cache(config)?;
    let email = email.trim();
    let record = cache.get(email);

    info!(
        email = %email,
        has_record = cache.has_record(email),
        live = cache.is_live(email),
        expires_at = ?record.map(|r| r.expires_at),
        "Cache status"
    );
    Ok(())
}
