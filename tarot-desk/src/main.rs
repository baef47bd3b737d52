// Tarot desk entry point.
//
// Startup sequence:
// 1. Parse arguments
// 2. Initialize tracing (log to file, not terminal)
// 3. Load config
// 4. `models` subcommand: print the model listing and exit
// 5. Open the history store, index card art
// 6. Create mpsc channels, spawn the app logic task
// 7. Run the TUI until the user quits

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use tarot_desk::app;
use tarot_desk::cli::{self, Cli, Command};
use tarot_desk::config::{self, Config};
use tarot_desk::history;
use tarot_desk::llm::client::LlmClient;
use tarot_desk::market::{MarketClient, MarketSource};
use tarot_desk::protocol::UserCommand;
use tarot_desk::tarot::art::CardArtIndex;
use tarot_desk::tui;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing()?;
    info!("Tarot desk starting up");

    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: model={}, deck={:?}, storage={:?}",
        config.llm.model, config.reading.deck, config.storage.backend
    );

    if cli.command == Some(Command::Models) {
        return list_models(&config).await;
    }

    let store = history::open_store(&config.storage).context("failed to open history store")?;
    info!("History store at {}", config.storage.resolved_path().display());

    let art = match &config.art.local_dir {
        Some(dir) => CardArtIndex::scan(Path::new(dir), config.art.remote_base_url.clone()),
        None => CardArtIndex::new(config.art.remote_base_url.clone()),
    };
    info!("Indexed {} local card images", art.local_count());

    let market: Arc<dyn MarketSource> = Arc::new(MarketClient::new(&config.market));

    let (llm_tx, llm_rx) = mpsc::channel(256);
    let (market_tx, market_rx) = mpsc::channel(16);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    let llm_client = LlmClient::from_config(&config);
    match &llm_client {
        LlmClient::Active(client) => info!("LLM client initialized (model {})", client.model()),
        LlmClient::Disabled => info!("LLM client disabled (no API key)"),
    }

    let app_state = app::AppState::new(
        config,
        store,
        art,
        llm_client,
        market,
        llm_tx,
        market_tx,
    );

    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(llm_rx, market_rx, cmd_rx, ui_tx, app_state).await {
            error!("Application loop error: {}", e);
        }
    });

    if let Some(nickname) = cli.nickname {
        let _ = cmd_tx.send(UserCommand::Login(nickname)).await;
    }

    // Blocks until the user quits.
    if let Err(e) = tui::run(ui_rx, cmd_tx).await {
        error!("TUI error: {}", e);
    }

    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;

    info!("Tarot desk shut down cleanly");
    Ok(())
}

/// Print the models that support content generation.
async fn list_models(config: &Config) -> anyhow::Result<()> {
    let LlmClient::Active(client) = LlmClient::from_config(config) else {
        anyhow::bail!(
            "no Gemini API key configured (set {} or config/credentials.toml)",
            config::API_KEY_ENV
        );
    };

    let models = client.list_models().await.context("failed to list models")?;
    if models.is_empty() {
        warn!("Model listing returned no usable models");
        eprintln!("No models available for content generation with this key.");
        return Ok(());
    }
    print!("{}", cli::format_model_list(&models));
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which is used by the TUI).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("tarot-desk.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tarot_desk=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
