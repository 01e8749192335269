//! `mapper` command line
//!
//! Reads a map request file, generates every window through an external
//! processing command and writes the consolidated map.
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mapper::{
    assembly::MapAssembler,
    catalog::imap_api::ImapApi,
    configuration::Configuration,
    consolidator::{Consolidator, RunOutcome},
    container::JsonContainer,
    engine::command::CommandEngineFactory,
    env_state::MapperEnv,
    mapper_errors::MapperError,
    resources::{DirectoryCleaner, GenerationResources, KernelManifest, WorkingDirectory},
};

/// Generate a consolidated ENA map
#[derive(Parser)]
#[command(name = "mapper")]
#[command(about = "Generate a consolidated ENA map from a request file", long_about = None)]
#[command(version)]
struct Cli {
    /// Request file (.yaml, .yml or .json)
    config_file: Utf8PathBuf,

    /// Base URL of the data access API
    #[arg(
        long,
        env = "IMAP_DATA_ACCESS_URL",
        default_value = "https://api.dev.imap-mission.com"
    )]
    data_access_url: String,

    /// API key of the data access API
    #[arg(long, env = "IMAP_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Local data directory (downloads and intermediate maps)
    #[arg(long, env = "IMAP_DATA_DIR")]
    data_dir: Option<Utf8PathBuf>,

    /// Processing executable invoked for every map
    #[arg(long, env = "MAPPER_ENGINE")]
    engine: Utf8PathBuf,

    /// Extra argument passed to the processing executable before the standard ones
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Log level
    #[arg(long, env = "MAPPER_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn run(cli: Cli) -> Result<RunOutcome, MapperError> {
    let config = Configuration::from_file(&cli.config_file)?;
    let request = config.map_request()?;

    let env = MapperEnv::new(cli.data_access_url, cli.api_key, cli.data_dir)?;
    let scratch_root = env.data_dir.clone();
    let api = ImapApi::new(env);
    let engines = CommandEngineFactory::new(cli.engine, cli.engine_args);

    let assembler =
        MapAssembler::new(&api, &api, &engines).with_custom_kernel(config.kernel_path.clone());
    let cleaner = DirectoryCleaner::new(scratch_root.clone());
    let consolidator = Consolidator::new(&assembler, &JsonContainer, &cleaner);

    let mut resources = GenerationResources::new(
        Box::new(KernelManifest::default()),
        WorkingDirectory::new(scratch_root),
    );
    Ok(consolidator.run(&request, &mut resources))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(cli) {
        Ok(RunOutcome::Done(_) | RunOutcome::Skipped(_)) => ExitCode::SUCCESS,
        Ok(RunOutcome::Failed(_)) => ExitCode::FAILURE,
        Err(err) => {
            error!("{}", err.report());
            ExitCode::FAILURE
        }
    }
}
