use clap::Parser;
use tracing_subscriber::EnvFilter;

use convertbot::bot;
use convertbot::cli::{Cli, Command, run_convert_command, run_doctor_command};

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("convertbot=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match &cli.command {
        Some(Command::Convert {
            kind,
            input,
            output,
        }) => run_convert_command(&cli, *kind, input, output.as_deref()).await,
        Some(Command::Doctor) => run_doctor_command(&cli).await,
        Some(Command::Run) | None => {
            tracing::info!(version = env!("CARGO_PKG_VERSION"), "convertbot starting");
            let ctx = bot::start(&cli).await?;

            tokio::select! {
                _ = bot::run_polling(ctx) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutting down");
                }
            }
            Ok(())
        }
    }
}
