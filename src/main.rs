use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info};

use openlock_lib::app::App;
use openlock_lib::core::config::AppConfig;
use openlock_lib::core::steam::normalize_app_id;
use openlock_lib::core::tools::ToolKind;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ToolArg {
    Steamtools,
    Greenluma,
}

impl From<ToolArg> for ToolKind {
    fn from(arg: ToolArg) -> Self {
        match arg {
            ToolArg::Steamtools => ToolKind::SteamTools,
            ToolArg::Greenluma => ToolKind::GreenLuma,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "openlock", version, about = "Fetch depot manifests and keys, then configure a local unlock tool")]
struct Cli {
    /// App id to process. A "-dlc" style suffix is tolerated.
    app_id: String,

    /// Which unlock tool is installed locally.
    #[arg(long, value_enum, default_value = "steamtools")]
    tool: ToolArg,

    /// Pin every depot to its newest manifest id (SteamTools only).
    #[arg(long)]
    lock_version: bool,

    /// Path to the configuration file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (config, created) = match AppConfig::load_or_init(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    openlock_lib::init_tracing(config.debug);

    if created {
        info!(
            "generated default configuration at {}; set a token there if you use a proxy",
            cli.config.display()
        );
    }

    let Some(app_id) = normalize_app_id(&cli.app_id) else {
        error!("invalid app id: {}", cli.app_id);
        return ExitCode::FAILURE;
    };

    let app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match app.run(&app_id, cli.tool.into(), cli.lock_version).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
