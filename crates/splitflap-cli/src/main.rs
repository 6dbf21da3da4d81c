mod config;

use clap::Parser;
use splitflap_core::trigger::TriggerConfigLoader;

#[derive(Parser)]
#[command(name = "splitflapd", about = "Split-flap content orchestration core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show version information
    Version,
    /// Load and validate a core config file plus its trigger config
    Validate {
        #[arg(short, long)]
        config: String,
    },
    /// Call `validate_connection` on every configured AI provider
    CheckProviders {
        #[arg(short, long)]
        config: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Version => {
            println!("splitflapd {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Validate { config } => validate(config).await,
        Commands::CheckProviders { config } => check_providers(config).await,
    };

    if let Err(e) = result {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn validate(config_path: &str) -> Result<(), String> {
    let core_config = config::load_config(config_path)?;
    println!("config OK: preferred_provider={}", core_config.preferred_provider);
    println!("available providers: {}", core_config.available_provider_names().join(", "));

    let trigger_loader = TriggerConfigLoader::new(core_config.trigger_config_path.clone());
    let triggers = trigger_loader.load().await.map_err(|e| e.to_string())?;
    println!("trigger config OK: {} trigger(s)", triggers.triggers.len());
    Ok(())
}

async fn check_providers(config_path: &str) -> Result<(), String> {
    let core_config = config::load_config(config_path)?;
    let providers = config::build_providers(&core_config);

    if providers.is_empty() {
        return Err("no recognized providers configured".to_string());
    }

    for (name, provider) in providers {
        let reachable = provider.validate_connection().await;
        println!("{name}: {}", if reachable { "reachable" } else { "unreachable" });
    }
    Ok(())
}
