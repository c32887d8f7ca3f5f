use anyhow::Context;
use clap::Parser;
use owo_colors::OwoColorize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lhfs_daemon::rpc::DriverRegistry;
use lhfs_daemon::AppState;

mod cli;

use cli::op::{Op, OpContext};
use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let state = AppState::load(args.config.clone()).context("failed to load configuration")?;

    // Held for the life of the process so buffered log lines get flushed.
    let _guard = init_tracing(&state);

    let ctx = OpContext {
        config_path: state.config_path.clone(),
        state,
        drivers: DriverRegistry::with_defaults(),
        master: args.master.clone(),
    };
    tracing::debug!(config = ?ctx.config_path, "configuration loaded");

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{output}");
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(state: &AppState) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let default_level = if state.config.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("lhfs={default_level},lhfs_daemon={default_level},common={default_level},warn")
            .into()
    });

    let (file_layer, guard) = match &state.config.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "lhfs.log".to_string());
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    guard
}
