use std::sync::Arc;

use clap::{CommandFactory, Parser};
use tso::cli::{self, Cli, Command};
use tso::error::Result;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::init_logging(&cli.log);
    let cfg = cli::resolve_config(&cli)?;

    match cli.command {
        Command::Serve { port } => run_serve(cfg, port),
        Command::Status { json } => cli::run_status(&cfg, json),
        Command::Bench {
            requests,
            concurrency,
        } => cli::run_bench(&cfg, requests, concurrency),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    }
}

#[cfg(feature = "net")]
fn run_serve(mut cfg: tso::config::Config, port: Option<u16>) -> Result<()> {
    if let Some(port) = port {
        cfg.port = port;
    }
    let cfg = Arc::new(cfg);
    let pipeline = Arc::new(tso::pipeline::Pipeline::start(&cfg)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(tso::error::OracleError::Io)?;

    runtime.block_on(async {
        let app = tso::net::router(Arc::clone(&pipeline), Arc::clone(&cfg));
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.port));
        tracing::info!(%addr, "serving");
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(tso::error::OracleError::Io)?;
        axum::serve(listener, app)
            .await
            .map_err(tso::error::OracleError::Io)
    })
}

#[cfg(not(feature = "net"))]
fn run_serve(_cfg: tso::config::Config, _port: Option<u16>) -> Result<()> {
    Err(tso::error::OracleError::Config(
        "this binary was built without the `net` feature; rebuild with --features net to use `serve`".into(),
    ))
}
