// Application state and orchestration logic.
//
// The central event loop that coordinates user commands from the TUI,
// market-data results, and model streaming events. Owns the session, the
// deck, and the history store, and pushes UI updates to the TUI render loop.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::history::{HistoryRecord, HistoryStore, InteractionKind};
use crate::llm::client::LlmClient;
use crate::llm::{prompt, summary};
use crate::market::{compute_indicators, normalize_symbol, MarketSnapshot, MarketSource};
use crate::protocol::{
    DrawnCard, LlmEvent, LlmStatus, MarketEvent, Notice, UiUpdate, UserCommand,
};
use crate::tarot::art::CardArtIndex;
use crate::tarot::deck::{self, Card};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Reading text shown when the model call fails.
pub const ANALYSIS_UNAVAILABLE: &str = "analysis unavailable";

/// Sensitivity slider bounds and step.
pub const SENSITIVITY_MIN: f32 = 0.0;
pub const SENSITIVITY_MAX: f32 = 1.0;
pub const SENSITIVITY_STEP: f32 = 0.1;

/// Clamp to the slider range and snap to the nearest step.
pub fn clamp_sensitivity(value: f32) -> f32 {
    if !value.is_finite() {
        return SENSITIVITY_MIN;
    }
    let clamped = value.clamp(SENSITIVITY_MIN, SENSITIVITY_MAX);
    (clamped / SENSITIVITY_STEP).round() * SENSITIVITY_STEP
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// The interaction currently in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReading {
    pub kind: InteractionKind,
    pub nickname: String,
    pub query: String,
    /// Normalized ticker for stock readings.
    pub symbol: Option<String>,
    pub cards: Vec<Card>,
}

impl PendingReading {
    /// Query text as stored in history: `SYMBOL: question` for stock readings.
    pub fn stored_query(&self) -> String {
        match &self.symbol {
            Some(symbol) if self.query.trim().is_empty() => symbol.clone(),
            Some(symbol) => format!("{symbol}: {}", self.query.trim()),
            None => self.query.trim().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn HistoryStore>,
    pub art: CardArtIndex,
    pub deck: Vec<Card>,
    pub rng: StdRng,
    /// Logged-in nickname. No authentication: any non-blank name is accepted.
    pub nickname: Option<String>,
    /// Sampling temperature for the next model call.
    pub sensitivity: f32,
    pub llm_client: Arc<LlmClient>,
    pub market: Arc<dyn MarketSource>,
    /// Senders cloned into spawned tasks.
    pub llm_tx: mpsc::Sender<LlmEvent>,
    pub market_tx: mpsc::Sender<MarketEvent>,
    /// The single in-flight background task (market fetch or model stream).
    pub current_task: Option<tokio::task::JoinHandle<()>>,
    /// Incremented for every interaction; events from older ones are dropped.
    pub generation: u64,
    pub pending: Option<PendingReading>,
    pub reading_text: String,
    pub reading_status: LlmStatus,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        store: Arc<dyn HistoryStore>,
        art: CardArtIndex,
        llm_client: LlmClient,
        market: Arc<dyn MarketSource>,
        llm_tx: mpsc::Sender<LlmEvent>,
        market_tx: mpsc::Sender<MarketEvent>,
    ) -> Self {
        let deck = deck::build_deck(config.reading.deck);
        let sensitivity = clamp_sensitivity(config.llm.temperature);

        AppState {
            config,
            store,
            art,
            deck,
            rng: StdRng::from_entropy(),
            nickname: None,
            sensitivity,
            llm_client: Arc::new(llm_client),
            market,
            llm_tx,
            market_tx,
            current_task: None,
            generation: 0,
            pending: None,
            reading_text: String::new(),
            reading_status: LlmStatus::Idle,
        }
    }

    /// Abort the in-flight background task, if any.
    pub fn cancel_task(&mut self) {
        if let Some(handle) = self.current_task.take() {
            handle.abort();
            info!("Cancelled previous task");
        }
    }

    /// Start a new interaction: cancel the old one, draw cards, and bump the
    /// generation. Returns the drawn cards with their art.
    fn begin_reading(
        &mut self,
        kind: InteractionKind,
        nickname: String,
        query: String,
        symbol: Option<String>,
    ) -> Result<Vec<DrawnCard>, deck::DeckError> {
        self.cancel_task();
        let count = self.config.reading.cards_per_draw;
        let cards = deck::draw(&self.deck, count, &mut self.rng)?;

        self.generation += 1;
        self.reading_text.clear();
        self.reading_status = LlmStatus::Idle;

        let drawn = cards
            .iter()
            .map(|card| DrawnCard {
                card: *card,
                art: self.art.lookup(card),
            })
            .collect();
        self.pending = Some(PendingReading {
            kind,
            nickname,
            query,
            symbol,
            cards,
        });
        Ok(drawn)
    }

    /// Recent records for the prompt. A failing store degrades to no history.
    fn recent_history(&self, nickname: &str) -> (Vec<HistoryRecord>, Option<Notice>) {
        match self
            .store
            .recent_for_user(nickname, self.config.reading.history_context)
        {
            Ok(records) => (records, None),
            Err(e) => {
                warn!("Failed to load history for prompt: {:#}", e);
                (
                    Vec::new(),
                    Some(Notice::warning("History unavailable; reading without it")),
                )
            }
        }
    }

    /// Spawn the model streaming task for the current generation.
    fn spawn_llm(&mut self, user_content: String) {
        let system = prompt::system_prompt();
        let client = Arc::clone(&self.llm_client);
        let tx = self.llm_tx.clone();
        let temperature = self.sensitivity;
        let max_tokens = self.config.llm.max_output_tokens;
        let generation = self.generation;

        self.reading_status = LlmStatus::Streaming;
        let handle = tokio::spawn(async move {
            if let Err(e) = client
                .stream_message(&system, &user_content, temperature, max_tokens, tx, generation)
                .await
            {
                warn!("LLM task failed: {}", e);
            }
        });
        self.current_task = Some(handle);
        info!(
            "Started reading (gen: {}, temperature: {:.1})",
            generation, temperature
        );
    }

    /// Spawn the market fetch task for the current generation.
    fn spawn_market_fetch(&mut self, symbol: String) {
        let source = Arc::clone(&self.market);
        let tx = self.market_tx.clone();
        let generation = self.generation;

        self.reading_status = LlmStatus::Fetching;
        let handle = tokio::spawn(async move {
            let event = match source.fetch(&symbol).await {
                Ok(snapshot) => MarketEvent::Fetched {
                    symbol,
                    snapshot,
                    generation,
                },
                Err(e) => MarketEvent::Failed {
                    symbol,
                    message: format!("{e:#}"),
                    generation,
                },
            };
            let _ = tx.send(event).await;
        });
        self.current_task = Some(handle);
    }

    /// The user's full history, or `None` when nobody is logged in. Store
    /// failures are reported as a notice.
    fn user_history(&self) -> Option<Result<Vec<HistoryRecord>, Notice>> {
        let nickname = self.nickname.as_deref()?;
        Some(self.store.for_user(nickname).map_err(|e| {
            warn!("Failed to load history for {}: {:#}", nickname, e);
            Notice::warning("Could not load history")
        }))
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

/// Run the application event loop.
///
/// Listens on three channels using `tokio::select!`:
/// 1. Model streaming events
/// 2. Market fetch results
/// 3. User commands from the TUI
///
/// Pushes UI updates through `ui_tx` for the TUI render loop.
pub async fn run(
    mut llm_rx: mpsc::Receiver<LlmEvent>,
    mut market_rx: mpsc::Receiver<MarketEvent>,
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut state: AppState,
) -> anyhow::Result<()> {
    info!("Application event loop started");

    let _ = ui_tx.send(UiUpdate::SensitivityChanged(state.sensitivity)).await;
    if !state.llm_client.is_active() {
        let _ = ui_tx
            .send(UiUpdate::Notice(Notice::warning(
                "No Gemini API key configured; readings are unavailable",
            )))
            .await;
    }

    // When a channel closes its branch is disabled so select! never spins.
    let mut llm_open = true;
    let mut market_open = true;

    loop {
        tokio::select! {
            llm_event = llm_rx.recv(), if llm_open => {
                match llm_event {
                    Some(event) => handle_llm_event(&mut state, event, &ui_tx).await,
                    None => {
                        info!("LLM channel closed");
                        llm_open = false;
                    }
                }
            }

            market_event = market_rx.recv(), if market_open => {
                match market_event {
                    Some(event) => handle_market_event(&mut state, event, &ui_tx).await,
                    None => {
                        info!("Market channel closed");
                        market_open = false;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit command received, shutting down");
                        break;
                    }
                    Some(cmd) => handle_user_command(&mut state, cmd, &ui_tx).await,
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    state.cancel_task();
    info!("Application event loop exiting");
    Ok(())
}

// ---------------------------------------------------------------------------
// User commands
// ---------------------------------------------------------------------------

async fn handle_user_command(
    state: &mut AppState,
    cmd: UserCommand,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    match cmd {
        UserCommand::Login(raw) => {
            let nickname = raw.trim().to_string();
            if nickname.is_empty() {
                let _ = ui_tx
                    .send(UiUpdate::Notice(Notice::warning("Enter a nickname to log in")))
                    .await;
                return;
            }
            info!("Logged in as {}", nickname);
            state.nickname = Some(nickname.clone());
            let _ = ui_tx
                .send(UiUpdate::SessionChanged {
                    nickname: Some(nickname.clone()),
                })
                .await;
            let _ = ui_tx
                .send(UiUpdate::Notice(Notice::info(format!("Welcome, {nickname}"))))
                .await;
            send_history(state, ui_tx).await;
        }
        UserCommand::Logout => {
            state.cancel_task();
            state.pending = None;
            state.reading_status = LlmStatus::Idle;
            if let Some(nickname) = state.nickname.take() {
                info!("Logged out {}", nickname);
            }
            let _ = ui_tx.send(UiUpdate::SessionChanged { nickname: None }).await;
            let _ = ui_tx.send(UiUpdate::History(Vec::new())).await;
        }
        UserCommand::DrawTarot { query } => {
            let Some(nickname) = require_session(state, ui_tx).await else {
                return;
            };
            let drawn = match state.begin_reading(
                InteractionKind::Tarot,
                nickname.clone(),
                query.clone(),
                None,
            ) {
                Ok(drawn) => drawn,
                Err(e) => {
                    warn!("Card draw failed: {}", e);
                    let _ = ui_tx.send(UiUpdate::Notice(Notice::error(e.to_string()))).await;
                    return;
                }
            };
            let cards: Vec<Card> = drawn.iter().map(|d| d.card).collect();
            let _ = ui_tx
                .send(UiUpdate::CardsDrawn {
                    kind: InteractionKind::Tarot,
                    cards: drawn,
                })
                .await;

            let (history, notice) = state.recent_history(&nickname);
            if let Some(notice) = notice {
                let _ = ui_tx.send(UiUpdate::Notice(notice)).await;
            }
            let user_content = prompt::build_tarot_prompt(&nickname, &query, &cards, &history);
            state.spawn_llm(user_content);
            let _ = ui_tx.send(UiUpdate::ReadingStatus(LlmStatus::Streaming)).await;
        }
        UserCommand::AnalyzeStock { symbol, query } => {
            let Some(nickname) = require_session(state, ui_tx).await else {
                return;
            };
            let Some(symbol) = normalize_symbol(&symbol) else {
                let _ = ui_tx
                    .send(UiUpdate::Notice(Notice::warning("Enter a valid ticker symbol")))
                    .await;
                return;
            };
            let drawn = match state.begin_reading(
                InteractionKind::Stock,
                nickname,
                query,
                Some(symbol.clone()),
            ) {
                Ok(drawn) => drawn,
                Err(e) => {
                    warn!("Card draw failed: {}", e);
                    let _ = ui_tx.send(UiUpdate::Notice(Notice::error(e.to_string()))).await;
                    return;
                }
            };
            let _ = ui_tx
                .send(UiUpdate::CardsDrawn {
                    kind: InteractionKind::Stock,
                    cards: drawn,
                })
                .await;
            info!("Fetching market data for {} via {}", symbol, state.market.name());
            state.spawn_market_fetch(symbol);
            let _ = ui_tx.send(UiUpdate::ReadingStatus(LlmStatus::Fetching)).await;
        }
        UserCommand::SetSensitivity(value) => {
            state.sensitivity = clamp_sensitivity(value);
            debug!("Sensitivity set to {:.1}", state.sensitivity);
            let _ = ui_tx
                .send(UiUpdate::SensitivityChanged(state.sensitivity))
                .await;
        }
        UserCommand::RefreshHistory => {
            if state.nickname.is_none() {
                let _ = ui_tx
                    .send(UiUpdate::Notice(Notice::warning("Log in to see your history")))
                    .await;
                return;
            }
            send_history(state, ui_tx).await;
        }
        UserCommand::Quit => {
            // Handled in the main loop
        }
    }
}

/// The logged-in nickname, or a warning to the UI when there is none.
async fn require_session(state: &AppState, ui_tx: &mpsc::Sender<UiUpdate>) -> Option<String> {
    if state.nickname.is_none() {
        let _ = ui_tx
            .send(UiUpdate::Notice(Notice::warning("Log in with a nickname first")))
            .await;
    }
    state.nickname.clone()
}

async fn send_history(state: &AppState, ui_tx: &mpsc::Sender<UiUpdate>) {
    match state.user_history() {
        Some(Ok(records)) => {
            let _ = ui_tx.send(UiUpdate::History(records)).await;
        }
        Some(Err(notice)) => {
            let _ = ui_tx.send(UiUpdate::Notice(notice)).await;
        }
        None => {}
    }
}

// ---------------------------------------------------------------------------
// Market events
// ---------------------------------------------------------------------------

async fn handle_market_event(
    state: &mut AppState,
    event: MarketEvent,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    if event.generation() != state.generation {
        debug!(
            "Discarding stale market event (event gen: {}, current gen: {})",
            event.generation(),
            state.generation
        );
        return;
    }
    let Some(pending) = state.pending.clone() else {
        debug!("Market event with no pending reading, discarding");
        return;
    };

    let (symbol, snapshot): (String, Option<MarketSnapshot>) = match event {
        MarketEvent::Fetched {
            symbol, snapshot, ..
        } => {
            if snapshot.is_none() {
                info!("No market data for {}", symbol);
                let _ = ui_tx
                    .send(UiUpdate::Notice(Notice::info(format!("No market data for {symbol}"))))
                    .await;
            }
            (symbol, snapshot)
        }
        MarketEvent::Failed {
            symbol, message, ..
        } => {
            warn!("Market fetch for {} failed: {}", symbol, message);
            let _ = ui_tx
                .send(UiUpdate::Notice(Notice::warning(format!(
                    "Market data unavailable for {symbol}"
                ))))
                .await;
            (symbol, None)
        }
    };

    let indicators = snapshot
        .as_ref()
        .map(|snap| compute_indicators(snap, &state.config.market));
    let _ = ui_tx
        .send(UiUpdate::MarketData {
            symbol: symbol.clone(),
            snapshot: snapshot.clone().map(Box::new),
            indicators: indicators.clone(),
        })
        .await;

    let (history, notice) = state.recent_history(&pending.nickname);
    if let Some(notice) = notice {
        let _ = ui_tx.send(UiUpdate::Notice(notice)).await;
    }
    let user_content = prompt::build_stock_prompt(
        &pending.nickname,
        &symbol,
        &pending.query,
        &pending.cards,
        snapshot.as_ref(),
        indicators.as_ref(),
        &history,
    );
    state.spawn_llm(user_content);
    let _ = ui_tx.send(UiUpdate::ReadingStatus(LlmStatus::Streaming)).await;
}

// ---------------------------------------------------------------------------
// LLM events
// ---------------------------------------------------------------------------

/// Handle a streaming event from the model task.
///
/// A `Complete` persists one history record for the pending interaction; an
/// `Error` shows the degraded text and persists nothing. Either way the
/// pending interaction is cleared, so late events hit the discard path.
async fn handle_llm_event(
    state: &mut AppState,
    event: LlmEvent,
    ui_tx: &mpsc::Sender<UiUpdate>,
) {
    if event.generation() != state.generation {
        debug!(
            "Discarding stale LLM event (event gen: {}, current gen: {})",
            event.generation(),
            state.generation
        );
        return;
    }
    if state.pending.is_none() {
        debug!("Received LLM event with no pending reading, discarding");
        return;
    }

    match event {
        LlmEvent::Token { text, .. } => {
            state.reading_text.push_str(&text);
            state.reading_status = LlmStatus::Streaming;
            let _ = ui_tx.send(UiUpdate::ReadingToken(text)).await;
        }
        LlmEvent::Complete {
            full_text,
            input_tokens,
            output_tokens,
            stop_reason,
            ..
        } => {
            let Some(pending) = state.pending.take() else {
                return;
            };
            info!(
                "Reading complete ({} in / {} out tokens)",
                input_tokens, output_tokens
            );
            let summary =
                summary::extract_summary(&full_text, state.config.reading.summary_max_chars);
            let text = if stop_reason.as_deref() == Some("MAX_TOKENS") {
                format!("{full_text}\n\n[Response truncated due to token limit]")
            } else {
                full_text
            };
            state.reading_text = text.clone();
            state.reading_status = LlmStatus::Complete;

            let record = HistoryRecord::now(
                &pending.nickname,
                pending.kind,
                &pending.stored_query(),
                deck::cards_to_list_string(&pending.cards),
                summary.clone(),
            );
            if let Err(e) = state.store.append(&record) {
                warn!("Failed to save history record: {:#}", e);
                let _ = ui_tx
                    .send(UiUpdate::Notice(Notice::warning(
                        "Reading not saved to history",
                    )))
                    .await;
            }

            let _ = ui_tx
                .send(UiUpdate::ReadingComplete {
                    text,
                    summary: Some(summary),
                })
                .await;
            send_history(state, ui_tx).await;
        }
        LlmEvent::Error { message, .. } => {
            warn!("LLM reading error: {}", message);
            state.pending = None;
            state.reading_text = ANALYSIS_UNAVAILABLE.to_string();
            state.reading_status = LlmStatus::Error;
            let _ = ui_tx
                .send(UiUpdate::Notice(Notice::error(format!(
                    "Reading failed: {message}"
                ))))
                .await;
            let _ = ui_tx
                .send(UiUpdate::ReadingComplete {
                    text: ANALYSIS_UNAVAILABLE.to_string(),
                    summary: None,
                })
                .await;
            let _ = ui_tx.send(UiUpdate::ReadingStatus(LlmStatus::Error)).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
