mod cli;
mod config;
mod research;

use clap::Parser;
use cli::{Cli, Command, ConfigCommand};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => anyhow::bail!("no subcommand given — run `dr research \"<query>\"` or `dr --help`"),
        Some(Command::Research { query, clarification, model, events }) => {
            init_tracing();
            let (cfg, _path) = config::load_config()?;
            let models = config::resolve_model_selection(&cfg, model.as_deref())?;
            let engine = research::build_engine(cfg);
            research::run(engine, query, clarification, models, events).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (cfg, path) = config::load_config()?;
            if !config::validate(&cfg, &path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (cfg, _path) = config::load_config()?;
            config::show(&cfg);
            Ok(())
        }
        Some(Command::Version) => {
            println!("dr {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}
