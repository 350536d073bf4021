use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use voice_relay::api::ApiServerBuilder;
use voice_relay::{Config, SessionPipeline};

/// Voice Relay - Spoken conversation relay for AI assistants
#[derive(Parser)]
#[command(name = "voice-relay", version, about)]
struct Cli {
    /// Port to listen on (overrides the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Path to the TOML config file
    #[arg(short, long, env = "VOICE_RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let filter = match cli.verbose {
        0 => "info,voice_relay=info",
        1 => "info,voice_relay=debug",
        2 => "debug",
        _ => "trace",
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    let port = cli.port.unwrap_or(config.server.port);

    let pipeline = SessionPipeline::from_config(&config)?;
    tracing::info!(
        port,
        output_dir = %config.server.output_dir.display(),
        model = %config.providers.llm_model,
        voice = %config.voice.tts_voice,
        "starting voice relay"
    );

    ApiServerBuilder::new(pipeline, port)
        .static_dir(config.server.static_dir.clone())
        .max_upload_bytes(config.server.max_upload_bytes)
        .build()
        .run()
        .await?;

    Ok(())
}
