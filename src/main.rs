use bridge::{BridgeBot, BridgeState};
use chat_log::ChatLog;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use config::ConnectArgs;
use minecraft_server::MinecraftServer;
use rmcp::ServiceExt;
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing_subscriber::{self, EnvFilter};
mod block_info;
mod bot;
mod bridge;
mod chat_log;
mod config;
mod error;
mod flight;
mod install;
mod minecraft_server;
mod scan;
mod tools;

/// MCP server that lets a language model drive a Minecraft bot
/// Run without a subcommand to serve MCP over stdio
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    connect: ConnectArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Run the MCP server using stdio transport
    #[command(alias = "stdio")]
    Server,
    /// Register this server with Claude Desktop, Cursor and LM Studio
    Install {
        /// Install to every supported client without prompting
        #[arg(long)]
        all: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    match args.command {
        None | Some(Command::Server) => run_server(args.connect).await,
        Some(Command::Install { all: true }) => install::install_all(&args.connect),
        Some(Command::Install { all: false }) => install::interactive_install(&args.connect),
    }
}

async fn run_server(connect: ConnectArgs) -> Result<()> {
    tracing::debug!("Debug MCP tracing enabled");

    let listener = match bind_bridge_listener((Ipv4Addr::LOCALHOST, connect.bridge_port)).await {
        Ok(BindOutcome::Listener(listener)) => listener,
        Ok(BindOutcome::AddrInUse) => {
            return Err(eyre!(
                "Bridge port {} is already in use; another instance is probably driving a bot",
                connect.bridge_port
            ));
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to bind TCP listener");
            return Err(err.into());
        }
    };

    let chat_log = ChatLog::shared();
    let (disconnect_tx, disconnect_rx) = tokio::sync::oneshot::channel();
    let bridge_state =
        BridgeState::new(connect.session(), Arc::clone(&chat_log), disconnect_tx).packed();

    let (close_tx, close_rx) = tokio::sync::oneshot::channel::<()>();
    let app = bridge::router(Arc::clone(&bridge_state));
    tracing::info!(
        "Bridge listening on {} for the bot runtime",
        connect.bridge_port
    );
    let server_handle = tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                _ = close_rx.await;
            })
            .await;
        if let Err(err) = served {
            tracing::error!("Bridge server failed: {err}");
        }
    });

    let bot = Arc::new(BridgeBot::new(bridge_state, connect.timeouts()));
    let service = MinecraftServer::new(bot, chat_log, connect.flight_timeout())
        .serve(rmcp::transport::stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("serving error: {:?}", e);
        })?;

    let disconnected = tokio::select! {
        quit = service.waiting() => {
            quit?;
            None
        }
        reason = disconnect_rx => Some(reason.unwrap_or_else(|_| "bridge closed".to_string())),
    };

    close_tx.send(()).ok();
    tracing::info!("Waiting for bridge to gracefully shutdown");
    server_handle.await.ok();

    if let Some(reason) = disconnected {
        tracing::error!("Bot disconnected ({reason}), exiting");
        // A pending stdin read would otherwise hold the runtime open.
        std::process::exit(1);
    }
    tracing::info!("Bye!");
    Ok(())
}

enum BindOutcome {
    Listener(tokio::net::TcpListener),
    AddrInUse,
}

async fn bind_bridge_listener(addr: (Ipv4Addr, u16)) -> Result<BindOutcome, std::io::Error> {
    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => Ok(BindOutcome::Listener(listener)),
        Err(err) if err.kind() == io::ErrorKind::AddrInUse => Ok(BindOutcome::AddrInUse),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::net::TcpListener as StdTcpListener;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn game_version_flag_coexists_with_version() {
        temp_env::with_vars_unset(["MINECRAFT_VERSION"], || {
            let args = Args::try_parse_from(["minecraft-mcp", "--mc-version", "1.20.4"])
                .expect("parse");
            assert!(args.command.is_none());
            assert_eq!(args.connect.mc_version.as_deref(), Some("1.20.4"));
        });
    }

    #[tokio::test]
    async fn bind_bridge_listener_returns_addr_in_use() {
        let std_listener =
            StdTcpListener::bind((Ipv4Addr::LOCALHOST, 0)).expect("bind test listener");
        let port = std_listener.local_addr().expect("port").port();

        let outcome = bind_bridge_listener((Ipv4Addr::LOCALHOST, port))
            .await
            .expect("bind outcome");

        match outcome {
            BindOutcome::AddrInUse => {}
            BindOutcome::Listener(_) => panic!("expected AddrInUse, got listener"),
        }
    }

    #[tokio::test]
    async fn bind_bridge_listener_propagates_other_errors() {
        let result = bind_bridge_listener((Ipv4Addr::new(203, 0, 113, 1), 0)).await;

        match result {
            Ok(BindOutcome::Listener(_)) => {
                panic!("expected bind failure, but listener was created");
            }
            Ok(BindOutcome::AddrInUse) => {
                panic!("expected bind failure, but port reported as in use");
            }
            Err(err) => {
                assert_eq!(err.kind(), io::ErrorKind::AddrNotAvailable);
            }
        }
    }

    #[test]
    fn install_subcommand_takes_connection_flags() {
        temp_env::with_vars_unset(["MINECRAFT_HOST", "MINECRAFT_USERNAME"], || {
            let args = Args::try_parse_from([
                "minecraft-mcp",
                "install",
                "--all",
                "--host",
                "play.example.org",
            ])
            .expect("parse");
            assert!(matches!(args.command, Some(Command::Install { all: true })));
            assert_eq!(args.connect.host, "play.example.org");
        });
    }
}
