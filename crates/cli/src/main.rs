use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use lq_cli::cli::generate::GenerateArgs;
use lq_cli::cli::{self, Cli, Command, ConfigCommand};
use lq_domain::config::{LogFormat, ObservabilityConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, config_path) = cli::load_config(cli.config)?;

    match cli.command {
        Command::Generate {
            kind,
            prompt,
            files,
            images,
            system,
            tier,
            json,
        } => {
            init_tracing(&config.observability);
            let args = GenerateArgs {
                kind,
                prompt,
                files,
                images,
                system,
                tier,
                json,
            };
            cli::generate::run(config, args).await
        }
        Command::Upload { path, mime } => {
            init_tracing(&config.observability);
            cli::upload::run(&config, &path, mime).await
        }
        Command::Group { path, threshold } => {
            init_tracing(&config.observability);
            cli::group::run(&config, &path, threshold)
        }
        Command::Config(ConfigCommand::Validate) => {
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            print!("{}", cli::config::show(&config)?);
            Ok(())
        }
    }
}

/// Initialize tracing on stderr, keeping stdout for results.
///
/// `RUST_LOG` overrides the configured default filter.
fn init_tracing(obs: &ObservabilityConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&obs.default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    match obs.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}
