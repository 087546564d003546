mod api;
mod blockchain;
mod cli;
mod client;
mod config;
mod error;
mod miner;

use std::process::ExitCode;
use std::sync::atomic::Ordering;

use actix_web::{App, HttpServer, web};
use clap::Parser;
use dotenvy::dotenv;
use log::{error, info, warn};

use api::{AppState, MockSettings};
use cli::{Cli, Commands};
use client::{HttpVerifier, VerificationService};
use config::MinerConfig;
use error::{MinerError, Result};
use miner::{Miner, MiningEvent};

#[actix_web::main]
async fn main() -> ExitCode {
    let _ = dotenv();
    let cli = Cli::parse();

    let cfg = match MinerConfig::from_env() {
        Ok(cfg) => cli.apply(cfg),
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cfg.default_log_level()),
    )
    .init();

    match run(cli, cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, cfg: MinerConfig) -> Result<()> {
    match cli.command {
        Commands::Info => {
            let verifier = HttpVerifier::new(&cfg)?;
            let info = verifier.info().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&info).unwrap_or_else(|_| format!("{info:?}"))
            );
            Ok(())
        }
        Commands::Init => {
            let mut miner = Miner::new(HttpVerifier::new(&cfg)?);
            miner.init().await?;
            println!("⛓️ Genesis verified against {}", cfg.instance);
            Ok(())
        }
        Commands::Mine { count } => mine(&cfg, count).await,
        Commands::ServeMock {
            host,
            port,
            difficulty,
            min_leading_zeros,
            capacity,
        } => {
            let mut settings = MockSettings {
                difficulty,
                min_leading_zeros,
                capacity,
                ..MockSettings::default()
            };
            if let Some(auth) = cfg.auth.clone() {
                settings.credentials = auth;
            }
            serve_mock(&host, port, settings).await
        }
    }
}

async fn mine(cfg: &MinerConfig, count: u32) -> Result<()> {
    let mut miner = Miner::new(HttpVerifier::new(cfg)?);
    let mut events = miner.subscribe();

    let cancel = miner.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("MINER - interrupt received, stopping after the current step");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                MiningEvent::BlockFound(block) => {
                    println!("⛏️ block:found #{} {}", block.index, block.hash());
                }
                MiningEvent::Sequence(result) => {
                    println!(
                        "📦 mining:sequence {}/{} found, {} rejected, {:?}",
                        result.found, result.total, result.failed, result.elapsed
                    );
                }
            }
        }
    });

    miner.init().await?;
    let result = miner.mine(count).await?;
    if !miner.chain().is_valid_chain() {
        return Err(MinerError::InvariantViolation(
            "mined chain failed its audit".to_string(),
        ));
    }
    info!(
        "MINER - chain length {} (difficulty now {})",
        miner.chain().len(),
        miner.difficulty()
    );
    // Closing the event channels lets the printer drain and finish.
    drop(miner);
    printer.await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&result).unwrap_or_else(|_| format!("{result:?}"))
    );
    Ok(())
}

async fn serve_mock(host: &str, port: u16, settings: MockSettings) -> Result<()> {
    println!("⛓️ Starting mock verification service at http://{host}:{port}");
    info!(
        "MOCK - difficulty={} min_leading_zeros={} capacity={} id={}",
        settings.difficulty, settings.min_leading_zeros, settings.capacity, settings.credentials.id
    );

    let state = web::Data::new(AppState::new(settings));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((host, port))?
    .run()
    .await?;
    Ok(())
}
