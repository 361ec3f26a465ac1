// ABOUTME: Main entry point for the chat-platform to inference-proxy bridge
// ABOUTME: Initializes logging, config, live-marker watcher, and supervises one platform adapter

use anyhow::Result;
use bridge_core::config::Config;
use bridge_core::live::LiveStatus;
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vtuber_bridge::marker::spawn_marker_watch;

/// Delay between adapter restarts after a crash or disconnect.
const RESTART_DELAY: Duration = Duration::from_secs(5);

const MARKER_POLL_PERIOD: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "vtuber-bridge", about = "Bridge chat platforms to a local inference proxy")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the Discord adapter
    Discord,
    /// Run the Twitch adapter
    Twitch,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Set up panic hook to log panics before they crash the process
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\nPANIC! Bridge crashed with the following error:\n");
        eprintln!("{}", panic_info);
        eprintln!("\nBacktrace:");
        eprintln!("{:?}", std::backtrace::Backtrace::force_capture());
    }));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting vtuber-bridge");

    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!(
        proxy_url = %config.proxy.url,
        discord = config.discord.is_some(),
        twitch = config.twitch.is_some(),
        "Configuration loaded"
    );

    let live = LiveStatus::new();
    if let Some(marker_path) = config.live.marker_path.clone() {
        tracing::info!(marker = %marker_path.display(), "Watching live marker file");
        // Detached; the watcher runs for the life of the process.
        let _ = spawn_marker_watch(marker_path, live.clone(), MARKER_POLL_PERIOD);
    }

    match cli.command {
        #[cfg(feature = "discord")]
        Command::Discord => run_discord(&config, live).await,
        #[cfg(feature = "twitch")]
        Command::Twitch => run_twitch(&config, live).await,
        #[allow(unreachable_patterns)]
        _ => anyhow::bail!("support for this platform was not compiled in"),
    }
}

#[cfg(feature = "discord")]
async fn run_discord(config: &Config, live: LiveStatus) -> Result<()> {
    // Fail fast on missing config before entering the supervisor loop.
    config.discord_config()?;
    loop {
        match run_discord_once(config, live.clone()).await {
            Ok(()) => tracing::warn!(platform = "discord", "Adapter exited"),
            Err(e) => tracing::error!(platform = "discord", error = %e, "Adapter failed"),
        }
        tracing::info!(
            platform = "discord",
            delay_secs = RESTART_DELAY.as_secs(),
            "Restarting adapter"
        );
        tokio::time::sleep(RESTART_DELAY).await;
    }
}

#[cfg(feature = "discord")]
async fn run_discord_once(config: &Config, live: LiveStatus) -> Result<()> {
    use bridge_core::link::ProxyLink;
    use vtuber_bridge::platform::discord;

    let discord_config = config.discord_config()?.clone();
    let (events, sink, bot_user_id) = discord::client::start(&discord_config).await?;
    let link = ProxyLink::new(&config.proxy.url);
    let adapter = discord::DiscordAdapter::new(discord_config, sink, link, live, bot_user_id);
    adapter.run(events).await
}

#[cfg(feature = "twitch")]
async fn run_twitch(config: &Config, live: LiveStatus) -> Result<()> {
    config.twitch_config()?;
    loop {
        match run_twitch_once(config, live.clone()).await {
            Ok(()) => tracing::warn!(platform = "twitch", "Adapter exited"),
            Err(e) => tracing::error!(platform = "twitch", error = %e, "Adapter failed"),
        }
        tracing::info!(
            platform = "twitch",
            delay_secs = RESTART_DELAY.as_secs(),
            "Restarting adapter"
        );
        tokio::time::sleep(RESTART_DELAY).await;
    }
}

#[cfg(feature = "twitch")]
async fn run_twitch_once(config: &Config, live: LiveStatus) -> Result<()> {
    use bridge_core::link::ProxyLink;
    use vtuber_bridge::platform::twitch;

    let twitch_config = config.twitch_config()?.clone();
    let (events, sink) = twitch::client::start(&twitch_config)?;
    let link = ProxyLink::new(&config.proxy.url);
    let adapter = twitch::TwitchAdapter::new(twitch_config, sink, link, live);
    adapter.run(events).await
}
