// Integration tests for the tarot desk.
//
// These drive the app event loop end-to-end through the library crate's
// public API, with local TCP servers standing in for the Gemini and market
// data endpoints and a temporary directory holding config and history.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tarot_desk::app::{self, AppState, ANALYSIS_UNAVAILABLE};
use tarot_desk::config::{ensure_config_files, load_config_from, Config, StorageBackend};
use tarot_desk::history::{self, HistoryStore, InteractionKind, SheetHistory, SqliteHistory};
use tarot_desk::llm::client::LlmClient;
use tarot_desk::market::{MarketClient, MarketSource};
use tarot_desk::protocol::{LlmStatus, NoticeLevel, UiUpdate, UserCommand};
use tarot_desk::tarot::art::CardArtIndex;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

// ===========================================================================
// Test helpers
// ===========================================================================

const CHART: &str = r#"{
    "chart": {
        "result": [{
            "meta": { "currency": "USD", "symbol": "AAPL", "chartPreviousClose": 180.0 },
            "timestamp": [1772409600, 1772496000],
            "indicators": { "quote": [{
                "open":   [181.0, 183.0],
                "high":   [184.0, 186.5],
                "low":    [179.5, 182.0],
                "close":  [182.5, 185.0],
                "volume": [5000000, 6100000]
            }]}
        }],
        "error": null
    }
}"#;

/// Accept one connection, read the full request, answer with `response`.
/// The join handle yields the raw request text.
async fn serve_once(response: String) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + content_length {
                    break;
                }
            }
        }
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.flush().await.unwrap();
        let _ = socket.shutdown().await;
        String::from_utf8_lossy(&request).into_owned()
    });
    (format!("http://{addr}"), handle)
}

fn sse_response(chunks: &[&str]) -> String {
    let mut out = String::from(
        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\n\r\n",
    );
    for chunk in chunks {
        out.push_str("data: ");
        out.push_str(chunk);
        out.push_str("\r\n\r\n");
    }
    out
}

fn json_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// A successful two-chunk reading ending in a summary section.
fn reading_stream() -> String {
    sse_response(&[
        r#"{"candidates":[{"content":{"parts":[{"text":"The Star brings hope.\n"}]}}]}"#,
        r####"{"candidates":[{"content":{"parts":[{"text":"### Summary\nA hopeful turn."}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":120,"candidatesTokenCount":14}}"####,
    ])
}

/// Write config/app.toml and config/credentials.toml into `dir` and load them.
fn write_config(dir: &Path, llm_url: &str, market_url: &str, backend: &str) -> Config {
    let config_dir = dir.join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    let history_file = match backend {
        "sheet" => "history.csv",
        _ => "history.db",
    };
    let app = format!(
        r#"
[llm]
model = "gemini-test"
temperature = 0.4
max_output_tokens = 256
base_url = "{llm_url}"

[reading]
deck = "full"
cards_per_draw = 3
history_context = 3
summary_max_chars = 80

[market]
base_url = "{market_url}"
range = "6mo"
interval = "1d"
sma_short = 2
sma_long = 5
rsi_period = 14

[storage]
backend = "{backend}"
path = "{}"
"#,
        dir.join(history_file).display()
    );
    std::fs::write(config_dir.join("app.toml"), app).unwrap();
    std::fs::write(
        config_dir.join("credentials.toml"),
        "gemini_api_key = \"test-key\"\n",
    )
    .unwrap();
    load_config_from(dir).expect("test config should load")
}

struct Running {
    cmd_tx: mpsc::Sender<UserCommand>,
    ui_rx: mpsc::Receiver<UiUpdate>,
    app: tokio::task::JoinHandle<anyhow::Result<()>>,
    store: Arc<dyn HistoryStore>,
}

fn start(config: Config) -> Running {
    let store = history::open_store(&config.storage).unwrap();
    let market: Arc<dyn MarketSource> = Arc::new(MarketClient::new(&config.market));
    let llm_client = LlmClient::from_config(&config);

    let (llm_tx, llm_rx) = mpsc::channel(64);
    let (market_tx, market_rx) = mpsc::channel(8);
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    let state = AppState::new(
        config,
        Arc::clone(&store),
        CardArtIndex::new(Some("https://art.example/cards".into())),
        llm_client,
        market,
        llm_tx,
        market_tx,
    );
    let app = tokio::spawn(app::run(llm_rx, market_rx, cmd_rx, ui_tx, state));
    Running {
        cmd_tx,
        ui_rx,
        app,
        store,
    }
}

/// Receive updates until a `ReadingComplete` arrives (inclusive).
async fn until_complete(ui_rx: &mut mpsc::Receiver<UiUpdate>) -> Vec<UiUpdate> {
    let mut updates = Vec::new();
    loop {
        let update = tokio::time::timeout(Duration::from_secs(10), ui_rx.recv())
            .await
            .expect("timed out waiting for the reading")
            .expect("ui channel closed early");
        let done = matches!(update, UiUpdate::ReadingComplete { .. });
        updates.push(update);
        if done {
            return updates;
        }
    }
}

/// Quit the app and collect whatever it sent after `until_complete`.
async fn shutdown(mut running: Running) -> (Vec<UiUpdate>, Arc<dyn HistoryStore>) {
    running.cmd_tx.send(UserCommand::Quit).await.unwrap();
    running.app.await.unwrap().unwrap();
    let mut rest = Vec::new();
    while let Some(update) = running.ui_rx.recv().await {
        rest.push(update);
    }
    (rest, running.store)
}

// ===========================================================================
// Tarot readings
// ===========================================================================

#[tokio::test]
async fn tarot_reading_streams_and_persists_to_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let (llm_url, llm_server) = serve_once(reading_stream()).await;
    let config = write_config(dir.path(), &llm_url, "http://127.0.0.1:9", "sheet");
    assert_eq!(config.storage.backend, StorageBackend::Sheet);

    let mut running = start(config);
    running
        .cmd_tx
        .send(UserCommand::Login("ana".into()))
        .await
        .unwrap();
    running
        .cmd_tx
        .send(UserCommand::DrawTarot {
            query: "Will the project ship?".into(),
        })
        .await
        .unwrap();

    let updates = until_complete(&mut running.ui_rx).await;

    let cards = updates
        .iter()
        .find_map(|u| match u {
            UiUpdate::CardsDrawn { kind, cards } => Some((*kind, cards.clone())),
            _ => None,
        })
        .expect("cards drawn");
    assert_eq!(cards.0, InteractionKind::Tarot);
    assert_eq!(cards.1.len(), 3);

    let streamed: String = updates
        .iter()
        .filter_map(|u| match u {
            UiUpdate::ReadingToken(t) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed, "The Star brings hope.\n### Summary\nA hopeful turn.");
    assert!(matches!(
        updates.last(),
        Some(UiUpdate::ReadingComplete { summary: Some(s), .. }) if s == "A hopeful turn."
    ));

    let request = llm_server.await.unwrap();
    assert!(request.contains("streamGenerateContent?alt=sse"));
    assert!(request.contains("x-goog-api-key: test-key"));
    assert!(request.contains("Will the project ship?"));
    assert!(request.contains("\"temperature\":0.4"));

    let (rest, _) = shutdown(running).await;
    assert!(rest
        .iter()
        .any(|u| matches!(u, UiUpdate::History(records) if records.len() == 1)));

    let records = SheetHistory::new(dir.path().join("history.csv"))
        .load_all()
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].nickname, "ana");
    assert_eq!(records[0].kind, InteractionKind::Tarot);
    assert_eq!(records[0].query, "Will the project ship?");
    assert_eq!(records[0].summary, "A hopeful turn.");
    assert_eq!(records[0].card_names().len(), 3);
}

#[tokio::test]
async fn failed_model_call_shows_degraded_text_and_saves_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (llm_url, _server) = serve_once(json_response(
        "429 Too Many Requests",
        r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#,
    ))
    .await;
    let config = write_config(dir.path(), &llm_url, "http://127.0.0.1:9", "sqlite");

    let mut running = start(config);
    running
        .cmd_tx
        .send(UserCommand::Login("ana".into()))
        .await
        .unwrap();
    running
        .cmd_tx
        .send(UserCommand::DrawTarot { query: "q".into() })
        .await
        .unwrap();

    let updates = until_complete(&mut running.ui_rx).await;
    assert!(matches!(
        updates.last(),
        Some(UiUpdate::ReadingComplete { text, summary: None }) if text == ANALYSIS_UNAVAILABLE
    ));
    assert!(updates.iter().any(|u| matches!(
        u,
        UiUpdate::Notice(n) if n.level == NoticeLevel::Error
    )));

    let (rest, store) = shutdown(running).await;
    assert!(rest.contains(&UiUpdate::ReadingStatus(LlmStatus::Error)));
    assert!(store.load_all().unwrap().is_empty());
}

#[tokio::test]
async fn reading_without_login_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "http://127.0.0.1:9", "http://127.0.0.1:9", "sqlite");

    let running = start(config);
    running
        .cmd_tx
        .send(UserCommand::DrawTarot { query: "q".into() })
        .await
        .unwrap();

    let (rest, store) = shutdown(running).await;
    assert!(rest.iter().any(|u| matches!(
        u,
        UiUpdate::Notice(n) if n.level == NoticeLevel::Warning
    )));
    assert!(!rest
        .iter()
        .any(|u| matches!(u, UiUpdate::CardsDrawn { .. })));
    assert!(store.load_all().unwrap().is_empty());
}

// ===========================================================================
// Stock readings
// ===========================================================================

#[tokio::test]
async fn stock_reading_fetches_market_data_then_reads() {
    let dir = tempfile::tempdir().unwrap();
    let (market_url, market_server) = serve_once(json_response("200 OK", CHART)).await;
    let (llm_url, llm_server) = serve_once(reading_stream()).await;
    let config = write_config(dir.path(), &llm_url, &market_url, "sqlite");

    let mut running = start(config);
    running
        .cmd_tx
        .send(UserCommand::Login("ana".into()))
        .await
        .unwrap();
    running
        .cmd_tx
        .send(UserCommand::AnalyzeStock {
            symbol: "aapl".into(),
            query: "hold or sell?".into(),
        })
        .await
        .unwrap();

    let updates = until_complete(&mut running.ui_rx).await;

    let (symbol, snapshot, indicators) = updates
        .iter()
        .find_map(|u| match u {
            UiUpdate::MarketData {
                symbol,
                snapshot,
                indicators,
            } => Some((symbol.clone(), snapshot.clone(), indicators.clone())),
            _ => None,
        })
        .expect("market data update");
    assert_eq!(symbol, "AAPL");
    let snapshot = snapshot.expect("snapshot");
    assert_eq!(snapshot.close, 185.0);
    let indicators = indicators.expect("indicators");
    assert!((indicators.change_pct.unwrap() - (185.0 - 182.5) / 182.5 * 100.0).abs() < 1e-9);
    assert_eq!(indicators.sma_short, Some((182.5 + 185.0) / 2.0));

    let market_request = market_server.await.unwrap();
    assert!(market_request.starts_with("GET /AAPL?"));

    let llm_request = llm_server.await.unwrap();
    assert!(llm_request.contains("AAPL"));
    assert!(llm_request.contains("hold or sell?"));
    assert!(llm_request.contains("close 185.00 USD"));

    let (_, store) = shutdown(running).await;
    let records = store.load_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, InteractionKind::Stock);
    assert_eq!(records[0].query, "AAPL: hold or sell?");
}

#[tokio::test]
async fn unknown_symbol_still_gets_a_reading() {
    let dir = tempfile::tempdir().unwrap();
    let (market_url, _market) = serve_once(json_response(
        "404 Not Found",
        r#"{"chart":{"result":null,"error":{"code":"Not Found"}}}"#,
    ))
    .await;
    let (llm_url, llm_server) = serve_once(reading_stream()).await;
    let config = write_config(dir.path(), &llm_url, &market_url, "sqlite");

    let mut running = start(config);
    running
        .cmd_tx
        .send(UserCommand::Login("ana".into()))
        .await
        .unwrap();
    running
        .cmd_tx
        .send(UserCommand::AnalyzeStock {
            symbol: "zzzz".into(),
            query: String::new(),
        })
        .await
        .unwrap();

    let updates = until_complete(&mut running.ui_rx).await;
    assert!(updates.contains(&UiUpdate::MarketData {
        symbol: "ZZZZ".into(),
        snapshot: None,
        indicators: None,
    }));
    let llm_request = llm_server.await.unwrap();
    assert!(llm_request.contains("No market data available for this symbol."));

    let (_, store) = shutdown(running).await;
    assert_eq!(store.load_all().unwrap()[0].query, "ZZZZ");
}

// ===========================================================================
// History across sessions
// ===========================================================================

#[tokio::test]
async fn earlier_readings_feed_the_next_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("history.db");
    {
        let store = SqliteHistory::open(db_path.to_str().unwrap()).unwrap();
        let record = history::HistoryRecord {
            nickname: "ana".into(),
            timestamp: "2026-01-02 03:04:05".into(),
            kind: InteractionKind::Tarot,
            query: "Should I move?".into(),
            cards: r#"["The Tower"]"#.into(),
            summary: "Big change coming.".into(),
        };
        store.append(&record).unwrap();
        let mut other = record.clone();
        other.nickname = "bo".into();
        other.query = "Not yours".into();
        store.append(&other).unwrap();
    }

    let (llm_url, llm_server) = serve_once(reading_stream()).await;
    let config = write_config(dir.path(), &llm_url, "http://127.0.0.1:9", "sqlite");
    let mut running = start(config);
    running
        .cmd_tx
        .send(UserCommand::Login("ana".into()))
        .await
        .unwrap();
    running
        .cmd_tx
        .send(UserCommand::DrawTarot {
            query: "And now?".into(),
        })
        .await
        .unwrap();
    until_complete(&mut running.ui_rx).await;

    let request = llm_server.await.unwrap();
    assert!(request.contains("Should I move?"));
    assert!(request.contains("Big change coming."));
    assert!(!request.contains("Not yours"));

    let (_, store) = shutdown(running).await;
    assert_eq!(store.for_user("ana").unwrap().len(), 2);
    assert_eq!(store.for_user("bo").unwrap().len(), 1);
}

// ===========================================================================
// Shipped defaults
// ===========================================================================

#[test]
fn shipped_defaults_load_and_validate() {
    let dir = tempfile::tempdir().unwrap();
    let defaults = dir.path().join("defaults");
    std::fs::create_dir_all(&defaults).unwrap();
    for file in ["app.toml", "credentials.toml.example"] {
        std::fs::copy(Path::new("defaults").join(file), defaults.join(file)).unwrap();
    }

    let copied = ensure_config_files(dir.path()).unwrap();
    assert_eq!(copied.len(), 1);
    assert!(!dir.path().join("config/credentials.toml.example").exists());

    let config = load_config_from(dir.path()).unwrap();
    assert_eq!(config.reading.cards_per_draw, 3);
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert!(config.credentials.gemini_api_key.is_none());
}

#[test]
fn credentials_example_is_valid_toml() {
    let content = std::fs::read_to_string("defaults/credentials.toml.example")
        .expect("defaults/credentials.toml.example should exist");
    let parsed: Result<toml::Value, _> = toml::from_str(&content);
    assert!(parsed.is_ok(), "credentials example is not valid TOML: {:?}", parsed.err());
}
