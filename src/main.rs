#![cfg_attr(not(test), deny(clippy::panic))]

use std::net::SocketAddr;
use std::sync::Arc;

use bomber_arena_server::auth::SessionOracle;
use bomber_arena_server::config::{self, Config};
use bomber_arena_server::db::PersistentStore;
use bomber_arena_server::gateway::{self, state::GatewayState};
use bomber_arena_server::lobby::RoomLobbyService;
use bomber_arena_server::logging;
use bomber_arena_server::match_sim::MatchManager;
use bomber_arena_server::metrics::ServerMetrics;
use bomber_arena_server::registry::RoomRegistry;
use bomber_arena_server::resume::ResumeService;
use bomber_arena_server::restart_vote::RestartVoteFsm;
use clap::Parser;

/// Authoritative server for real-time multiplayer grid-bomb matches.
#[derive(Parser, Debug)]
#[command(name = "bomber-arena-server")]
#[command(about = "Authoritative tick-synchronous server for real-time multiplayer grid-bomb matches")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = Arc::new(config::load());

    if cli.print_config {
        let json = serde_json::to_string_pretty(&*cfg)
            .map_err(|e| anyhow::anyhow!("failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = config::validate_config_security(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Tick rate: {}Hz", cfg.match_config.tick_rate_hz);
                println!("  World: {}x{}", cfg.match_config.world_width, cfg.match_config.world_height);
                println!("  Production mode: {}", cfg.is_production());
                println!("  Dev tgUserId fallback: {}", cfg.security.dev_allow_query_tguserid);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, "starting bomber-arena-server");

    let state = build_gateway_state(cfg.clone()).await?;

    tokio::spawn(gateway::run_sweep_task(state.clone()));

    let router = gateway::build_router(state);
    let make_service = router.into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening for /ws connections");

    axum::serve(listener, make_service).await?;

    Ok(())
}

/// Builds every service the gateway depends on and connects (and migrates)
/// the Postgres store. Startup validation has already guaranteed
/// `database_url` is present by the time this runs.
async fn build_gateway_state(cfg: Arc<Config>) -> anyhow::Result<Arc<GatewayState>> {
    let database_url = cfg
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("database_url missing after startup validation"))?;

    let postgres = bomber_arena_server::db::PostgresStore::connect(database_url).await?;
    postgres.migrate().await?;
    let store: Arc<dyn PersistentStore> = Arc::new(postgres);

    let sessions = Arc::new(SessionOracle::new(store.clone(), cfg.security.effective_session_ttl_seconds()));
    let lobby = Arc::new(RoomLobbyService::new(store.clone(), cfg.lobby.clone()));
    let matches = Arc::new(MatchManager::new());
    let resume = Arc::new(ResumeService::new(cfg.resume.ttl_secs));
    let restart_votes = Arc::new(RestartVoteFsm::new(
        cfg.restart_vote.timeout_secs,
        cfg.restart_vote.cooldown_secs,
        cfg.restart_vote.spam_strikes,
    ));
    let registry = Arc::new(RoomRegistry::new());
    let metrics = Arc::new(ServerMetrics::new());

    Ok(Arc::new(GatewayState::new(
        cfg, store, sessions, lobby, matches, resume, restart_votes, registry, metrics,
    )))
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn test_cli_default_no_flags() {
        let cli = Cli::try_parse_from(["bomber-arena-server"]).unwrap();
        assert!(!cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_long() {
        let cli = Cli::try_parse_from(["bomber-arena-server", "--validate-config"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_validate_config_short() {
        let cli = Cli::try_parse_from(["bomber-arena-server", "-c"]).unwrap();
        assert!(cli.validate_config);
        assert!(!cli.print_config);
    }

    #[test]
    fn test_cli_print_config() {
        let cli = Cli::try_parse_from(["bomber-arena-server", "--print-config"]).unwrap();
        assert!(!cli.validate_config);
        assert!(cli.print_config);
    }

    #[test]
    fn test_cli_validate_and_print_config_conflict() {
        let result = Cli::try_parse_from(["bomber-arena-server", "--validate-config", "--print-config"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("cannot be used with"));
    }

    #[test]
    fn test_cli_help_contains_flags() {
        let result = Cli::try_parse_from(["bomber-arena-server", "--help"]);
        assert!(result.is_err());
        let err = result.unwrap_err();
        let help_text = err.to_string();
        assert!(help_text.contains("--validate-config"));
        assert!(help_text.contains("--print-config"));
        assert!(help_text.contains("-c"));
    }

    #[test]
    fn test_cli_version() {
        let result = Cli::try_parse_from(["bomber-arena-server", "--version"]);
        assert!(result.is_err());
    }
}
