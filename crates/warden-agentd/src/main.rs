#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]

//! Supervisor entrypoint. The wire transport is deliberately left out of
//! scope for the core — canonical command serialization is the sole
//! interoperability point — so this binary frames it as newline-delimited
//! JSON on stdin/stdout, one command and one receipt per line.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::AsyncBufReadExt;

use warden_agentd::{exit, intake, Supervisor};
use warden_config::Config;

#[derive(Parser, Debug)]
#[command(name = "warden-agentd", about = "Warden agent command acceptance & enforcement core")]
struct Opts {
    /// Path to the agent's TOML configuration file.
    #[arg(long, env = "WARDEN_CONFIG")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}

async fn run() -> i32 {
    if let Err(e) = warden_telemetry::init::init_tracing() {
        eprintln!("failed to initialize logging: {e}");
        return exit::STARTUP_ERROR;
    }

    let opts = Opts::parse();

    let config = match Config::load(&opts.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(target: "warden_agentd", error = %e, "configuration error");
            return exit::CONFIGURATION_ERROR;
        }
    };

    let supervisor = match Supervisor::startup(&config).await {
        Ok(supervisor) => Arc::new(supervisor),
        Err(e) => {
            tracing::error!(target: "warden_agentd", error = %e, "startup error");
            return exit::STARTUP_ERROR;
        }
    };

    let (intake, worker) = intake::spawn(Arc::clone(&supervisor), config.intake_channel_capacity);

    let telemetry_addr: std::net::SocketAddr = "127.0.0.1:9095"
        .parse()
        .unwrap_or_else(|_| std::net::SocketAddr::from(([127, 0, 0, 1], 9095)));
    tokio::spawn(warden_telemetry::http::run_server(telemetry_addr));

    let code = serve(&supervisor, intake).await;

    // Dropping `worker`'s sender half (owned by `intake`, consumed into
    // `serve`) closes the channel; the worker finishes any call already
    // in flight, then returns, draining in-flight executions.
    let _ = worker.await;

    tracing::info!(target: "warden_agentd", "shutdown complete");
    code
}

async fn serve(supervisor: &Supervisor, intake: intake::Intake) -> i32 {
    let stdin = tokio::io::stdin();
    let mut lines = tokio::io::BufReader::new(stdin).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                supervisor.begin_shutdown();
                break;
            }
            next = lines.next_line() => {
                match next {
                    Ok(Some(text)) => {
                        if text.trim().is_empty() || !supervisor.is_accepting() {
                            continue;
                        }
                        match intake.submit(text.into_bytes()).await {
                            Ok(receipt) => {
                                if let Ok(json) = serde_json::to_string(&receipt) {
                                    println!("{json}");
                                }
                            }
                            Err(e) => {
                                tracing::error!(target: "warden_agentd", error = %e, "fatal audit write failure");
                                return exit::FATAL;
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::error!(target: "warden_agentd", error = %e, "stdin read error");
                        return exit::RUNTIME_ERROR;
                    }
                }
            }
        }
    }
    exit::SUCCESS
}
