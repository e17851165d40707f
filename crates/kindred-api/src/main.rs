//! Kindred CLI and REST API entry point.
//!
//! Binary name: `kindred`
//!
//! Parses CLI arguments, initializes database and services, then dispatches
//! to the appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use kindred_infra::config::load_config;
use kindred_infra::filesystem::resolve_data_dir;
use kindred_observe::tracing_setup::{
    TracingOptions, bootstrap_subscriber, init_tracing, shutdown_tracing,
};

use cli::{
    AssetCommand, CatalogCommand, CharacterCommand, Cli, Commands, KeyCommand, MemoryCommand,
    RoleCommand,
};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need logging or app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "kindred", &mut std::io::stdout());
        return Ok(());
    }

    let data_dir = resolve_data_dir();
    let config = {
        let _bootstrap = bootstrap_subscriber();
        tokio::fs::create_dir_all(&data_dir).await?;
        load_config(&data_dir).await
    };

    let serving = matches!(cli.command, Commands::Serve { .. });
    let level = match cli.verbose {
        0 if cli.quiet => "error".to_string(),
        0 if serving => config.logging.level.clone(),
        0 => "warn".to_string(),
        1 => "info,kindred_core=debug,kindred_infra=debug,kindred_api=debug".to_string(),
        _ => "trace".to_string(),
    };
    init_tracing(&TracingOptions {
        level,
        json: cli.json_logs || config.logging.json,
        otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!(e))?;

    let state = AppState::build(data_dir, config).await?;
    let result = run(cli, state).await;

    shutdown_tracing();
    result
}

async fn run(cli: Cli, state: AppState) -> anyhow::Result<()> {
    let json = cli.json;

    match cli.command {
        Commands::Serve { port, host } => serve(state, port, host).await?,

        Commands::Init => cli::setup::init(&state, json).await?,

        Commands::Character { action } => match action {
            CharacterCommand::Create {
                name,
                age,
                sex,
                hair_color,
                eye_color,
                height,
                body_type,
                personality,
                tags,
            } => {
                let args = cli::character::CreateArgs {
                    name,
                    age,
                    sex,
                    hair_color,
                    eye_color,
                    height,
                    body_type,
                    personality,
                    tags,
                };
                cli::character::create(&state, args, json).await?;
            }
            CharacterCommand::List => cli::character::list(&state, json).await?,
            CharacterCommand::Show { character } => {
                cli::character::show(&state, &character, json).await?;
            }
            CharacterCommand::Delete { character, force } => {
                cli::character::delete(&state, &character, force, json).await?;
            }
            CharacterCommand::Tag {
                character,
                tag,
                remove,
            } => {
                cli::character::tag(&state, &character, &tag, remove, json).await?;
            }
            CharacterCommand::Mood { character, mood } => {
                cli::character::mood(&state, &character, &mood, json).await?;
            }
        },

        Commands::Personality { action } => match action {
            CatalogCommand::List => cli::catalog::list_personalities(&state, json).await?,
            CatalogCommand::Templates => cli::catalog::personality_templates(&state, json).await?,
            CatalogCommand::Init => cli::catalog::init_personalities(&state, json).await?,
        },

        Commands::Role { action } => match action {
            RoleCommand::List => cli::catalog::list_roles(&state, json).await?,
            RoleCommand::Templates => cli::catalog::role_templates(&state, json).await?,
            RoleCommand::Init => cli::catalog::init_roles(&state, json).await?,
            RoleCommand::Suggest { traits } => {
                cli::catalog::suggest_roles(&state, &traits, json).await?;
            }
        },

        Commands::Chat { character, message } => {
            cli::chat::chat(&state, &character, message.as_deref(), json).await?;
        }

        Commands::Memory { action } => match action {
            MemoryCommand::Add {
                character,
                content,
                kind,
                importance,
            } => {
                cli::memory::add(&state, &character, &content, &kind, importance, json).await?;
            }
            MemoryCommand::Search { character, query, n } => {
                cli::memory::search(&state, &character, &query, n, json).await?;
            }
            MemoryCommand::Context { character, query } => {
                cli::memory::context(&state, &character, &query, json).await?;
            }
            MemoryCommand::Count { character } => {
                cli::memory::count(&state, character.as_deref(), json).await?;
            }
        },

        Commands::Asset { action } => match action {
            AssetCommand::List {
                asset_type,
                tags,
                limit,
            } => {
                cli::asset::list(&state, asset_type.as_deref(), tags, limit, json).await?;
            }
            AssetCommand::Stats => cli::asset::stats(&state, json).await?,
            AssetCommand::Orphans { asset_type } => {
                cli::asset::orphans(&state, asset_type.as_deref(), json).await?;
            }
        },

        Commands::Key { action } => match action {
            KeyCommand::Create { name } => cli::key::create(&state, &name, json).await?,
            KeyCommand::List => cli::key::list(&state, json).await?,
        },

        Commands::Status => cli::status::status(&state, json).await?,

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}

async fn serve(state: AppState, port: Option<u16>, host: Option<String>) -> anyhow::Result<()> {
    let port = port.unwrap_or(state.config.server.port);
    let host = host.unwrap_or_else(|| state.config.server.host.clone());

    // With auth on and no keys yet, nobody could call the API.
    if state.config.server.require_auth && state.api_keys.count().await? == 0 {
        let (key, _) = state.api_keys.create("default").await?;
        println!();
        println!(
            "  {} API key generated (save this -- it won't be shown again):",
            console::style("🔑").bold()
        );
        println!();
        println!("  {}", console::style(&key).yellow().bold());
        println!();
    }

    state.start_messenger().await?;

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} Kindred API listening on {}",
        console::style("💞").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let router = http::router::build_router(state.clone());
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if state.messenger.is_enabled().await {
        if let Err(e) = state.messenger.disable().await {
            tracing::warn!(error = %e, "failed to stop messenger");
        }
    }
    state.scenes.stop_all().await;
    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
