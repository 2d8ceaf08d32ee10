use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jukebox_scheduler::{
    config::Config,
    database::Database,
    player::NullPlayer,
    remote::YouTubeFetcher,
    repositories::SqlitePacketStore,
    scheduler::Scheduler,
    web::WebServer,
};

#[derive(Parser)]
#[command(name = "jukebox-scheduler")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Fair-share GPS packet scheduler for a multi-user media jukebox")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address (overrides config file)
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port (overrides config file)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Seeds a couple of demo votes at startup if the queue is empty, for
    /// local manual testing. Off by default.
    #[arg(long)]
    seed_demo_queue: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("jukebox_scheduler={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting jukebox scheduler v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    info!("Using database: {}", config.database.url);
    let database = Database::new(&config.database).await?;
    database.migrate().await?;
    info!("Database connection established and migrations applied");

    let store: Arc<dyn jukebox_scheduler::repositories::PacketStore> =
        Arc::new(SqlitePacketStore::new(database.pool().clone()));
    let player = Arc::new(NullPlayer::new());
    let fetcher = Arc::new(YouTubeFetcher::new(
        config.remote.youtube_api_key.clone(),
        std::time::Duration::from_millis(config.remote.fetch_timeout_ms),
    ));

    let scheduler = Arc::new(
        Scheduler::new(
            store.clone(),
            player.clone(),
            fetcher,
            config.player.player_name.clone(),
            config.remote.allowed_hosts.clone(),
            config.player.dont_repeat_for,
            config.player.max_dont_repeat_for,
        )
        .await?,
    );

    if cli.seed_demo_queue && scheduler.num_queued().await? == 0 {
        if let Ok(Some(song)) = store.random_song(&[]).await {
            info!(song_id = song.id, "seeding demo queue");
            let _ = scheduler.vote("demo-user", Some(song.id), None).await;
        }
    }

    let (_stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let tick_interval = std::time::Duration::from_millis(config.scheduler.tick_interval_ms);
    scheduler.clone().start(tick_interval, Some(stop_rx));
    info!(tick_ms = config.scheduler.tick_interval_ms, "scheduler ticker started");

    let web_server = WebServer::new(&config, scheduler)?;
    info!("Starting web server on {}:{}", web_server.host(), web_server.port());
    web_server.serve().await?;

    Ok(())
}
