use clap::Parser;
use engine::net::Server;
use engine::reporter::{LogSink, OutcomeReporter};
use engine::router::{EngineConfig, Router};
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to bind the UDP transport to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Tick rate (simulation updates per second)
    #[clap(short, long, default_value = "30")]
    tick_rate: u32,
    /// Points needed to win a game
    #[clap(short, long, default_value = "5")]
    win_score: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = EngineConfig {
        tick: Duration::from_secs_f32(1.0 / args.tick_rate as f32),
        win_score: args.win_score,
        ..EngineConfig::default()
    };

    // No collaborators are wired up in the standalone binary; outcomes are
    // logged. Embedders provide their own `OutcomeSink`.
    let reporter = OutcomeReporter::spawn(Arc::new(LogSink));
    let router = Router::new(config, reporter);

    let addr = format!("{}:{}", args.host, args.port);
    let mut server = Server::bind(&addr, router).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
        }
    }

    Ok(())
}
