use anyhow::{bail, Context, Result};
use avatar_voice::{VoiceConfig, VoicePipeline};
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Speak an assistant reply: sanitize, synthesize and apply the avatar voice effects
#[derive(Parser, Debug)]
#[command(name = "avatar-voice", version, about)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "AVATAR_VOICE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for raw and processed audio (overrides the config file)
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Give up waiting for the processed file after this many seconds
    #[arg(long, default_value = "120")]
    timeout_secs: u64,

    /// Reply text; read from stdin when omitted
    text: Vec<String>,
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "avatar_voice=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => VoiceConfig::from_file(path)?,
        None => VoiceConfig::default(),
    };
    if let Some(dir) = cli.temp_dir {
        config = config.with_temp_dir(dir);
    }

    let text = if cli.text.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read reply text from stdin")?;
        buf
    } else {
        cli.text.join(" ")
    };
    if text.trim().is_empty() {
        bail!("no text to speak");
    }

    info!("Starting avatar voice pipeline");
    let mut pipeline = VoicePipeline::new(config)?;
    let mut session = pipeline.submit(text)?;

    let outcome = session
        .wait_timeout(Duration::from_secs(cli.timeout_secs))
        .with_context(|| format!("timed out after {}s", cli.timeout_secs))?;

    let result = match outcome {
        Ok(path) => {
            info!(
                "Processed audio ready (cache hit: {})",
                session.cache_hit().unwrap_or(false)
            );
            println!("{}", path.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            Err(anyhow::Error::new(e))
        }
    };

    pipeline.shutdown()?;
    result
}
