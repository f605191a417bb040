use anyhow::{Result, bail};
use asrhub::asr::command::{CommandConfig, CommandTranscriber};
use asrhub::asr::detector::EnergyDetector;
use asrhub::audio::convert::SoxConverter;
use asrhub::config::Config;
use asrhub::hub::AsrHub;
use asrhub::server::{EventServer, HubHandler};
use asrhub::session::worker::{DetectorFactory, TranscriberFactory};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Streaming speech-transcription session hub
#[derive(Parser, Debug)]
#[command(name = "asrhubd", version, about = "Streaming speech-transcription session hub")]
struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Unix socket path for the event transport
    #[arg(long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// Restrict handling to these site ids (repeatable)
    #[arg(long = "site", value_name = "SITE")]
    sites: Vec<String>,

    /// External recognizer command (overrides [transcriber] command)
    #[arg(long, value_name = "CMD")]
    transcribe_command: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref());
    if !cli.sites.is_empty() {
        config.site.site_ids = cli.sites.clone();
    }
    if let Some(command) = cli.transcribe_command {
        config.transcriber.command = command;
    }
    if config.transcriber.command.is_empty() {
        bail!(
            "no recognizer configured; set [transcriber] command or pass --transcribe-command"
        );
    }

    let transcriber_factory: TranscriberFactory = {
        let command = CommandConfig::new(config.transcriber.command.clone())
            .with_args(config.transcriber.args.clone());
        Arc::new(move || Box::new(CommandTranscriber::new(command.clone())))
    };
    let detector_factory: DetectorFactory = {
        let detector_config = config.detector_config();
        Arc::new(move || Box::new(EnergyDetector::with_config(detector_config)))
    };
    let converter = Box::new(SoxConverter::new(config.converter.program.clone()));

    let hub = AsrHub::new(&config, transcriber_factory, detector_factory, converter);

    let socket_path = cli.socket.unwrap_or_else(EventServer::default_socket_path);
    eprintln!(
        "asrhubd {} listening on {}",
        asrhub::version_string(),
        socket_path.display()
    );

    let server = EventServer::new(socket_path)?;
    server.start(HubHandler::new(Arc::new(Mutex::new(hub)))).await?;
    Ok(())
}

fn load_config(path: Option<&Path>) -> Config {
    match path {
        Some(path) => Config::load_or_default(path),
        None => {
            let default_path = dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("asrhub/config.toml");
            Config::load_or_default(&default_path)
        }
    }
}
