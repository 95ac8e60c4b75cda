//! SQLCache server entry point: configuration, database pool, accept
//! loop and shutdown.

use anyhow::Context;
use sqlcache::commands::CommandHandler;
use sqlcache::config::Config;
use sqlcache::connection::handle_connection;
use sqlcache::router::MappingRouter;
use sqlcache::stats::Stats;
use sqlx::mysql::MySqlPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Command-line arguments.
struct Args {
    /// Path to the TOML config file.
    config: PathBuf,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: PathBuf::from("config.toml"),
        }
    }
}

impl Args {
    /// Parse arguments from the command line.
    fn from_args() -> Self {
        let mut parsed = Args::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    if i + 1 < args.len() {
                        parsed.config = PathBuf::from(&args[i + 1]);
                        i += 2;
                    } else {
                        eprintln!("Error: --config requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("sqlcache version {}", sqlcache::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        parsed
    }
}

fn print_help() {
    println!(
        r#"
SQLCache - A Memcached Gateway for MySQL Tables

USAGE:
    sqlcache [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to the config file (default: config.toml)
    -v, --version          Print version information
        --help             Print this help message

CONNECTING:
    Use any memcached client, or telnet:
    $ printf 'get @@users.42\r\n' | nc localhost 11211
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::from_args();

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;

    let mut pool_options = MySqlPoolOptions::new().max_lifetime(config.mysql.conn_max_lifetime);
    if config.mysql.max_open_conns > 0 {
        pool_options = pool_options.max_connections(config.mysql.max_open_conns as u32);
    }
    if config.mysql.max_idle_conns > 0 {
        pool_options = pool_options.min_connections(config.mysql.max_idle_conns as u32);
    }

    // Connecting acquires and pings one connection, so a bad DSN or an
    // unreachable server fails startup here.
    let pool = pool_options
        .connect(&config.mysql.url())
        .await
        .context("could not connect to the mysql server")?;
    info!(
        host = %config.mysql.host,
        port = config.mysql.port,
        "connected to mysql"
    );

    let router = Arc::new(
        MappingRouter::connect(pool, &config.mapping)
            .await
            .context("failed to prepare mappings")?,
    );
    info!(mappings = router.len(), "mapping router ready");

    let stats = Arc::new(Stats::new());
    let noreply_tasks = TaskTracker::new();
    let commands = CommandHandler::new(Arc::clone(&stats), noreply_tasks.clone())
        .with_getter(router.clone())
        .with_setter(router.clone())
        .with_deleter(router);

    let listener = TcpListener::bind(config.server.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr()))?;
    info!(addr = %config.server.bind_addr(), "listening");

    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
        info!("shutdown signal received, stopping server");
    };

    tokio::select! {
        _ = accept_loop(listener, commands) => {}
        _ = shutdown => {}
    }

    // Give outstanding noreply sets a moment to finish; they are best
    // effort and may be dropped past the deadline.
    noreply_tasks.close();
    if tokio::time::timeout(Duration::from_secs(5), noreply_tasks.wait())
        .await
        .is_err()
    {
        warn!("dropping unfinished noreply set tasks");
    }

    info!("server shutdown complete");
    Ok(())
}

/// Accepts connections forever, one handler task each.
async fn accept_loop(listener: TcpListener, commands: CommandHandler) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tokio::spawn(handle_connection(stream, addr, commands.clone()));
            }
            Err(e) => {
                error!(error = %e, "failed to accept connection");
            }
        }
    }
}
