use anyhow::Context;
use clap::Parser;
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

mod agent;
mod app;
mod config;
mod error;
mod llm_client;
mod market_data;
mod session;
mod tool_registry;
mod tools;
mod types;
mod ui;

#[cfg(test)]
mod mocks;
#[cfg(test)]
mod tests;

use agent::{Agent, AgentOptions};
use app::{AppEvent, ChatApp, NO_API_KEY};
use config::{Cli, Config};
use llm_client::LlmClient;
use market_data::{MarketData, YahooFinance};
use session::ConversationStore;
use tool_registry::ToolRegistry;
use tools::StockOptionsTool;
use ui::{TuiApp, UiEvent};

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;

    // The full-screen UI owns the terminal, so logs go to a file there.
    let writer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(config.log_file.is_none())
        .init();
    Ok(())
}

fn build_app(config: &Config, store: ConversationStore) -> anyhow::Result<ChatApp> {
    let market: Option<Arc<dyn MarketData>> = match &config.market_data_url {
        Some(url) => {
            let yahoo: Arc<dyn MarketData> =
                Arc::new(YahooFinance::new(url.clone(), config.request_timeout)?);
            Some(yahoo)
        }
        None => {
            tracing::warn!("market data provider disabled; get_stock_options will report it as unavailable");
            None
        }
    };

    let registry = ToolRegistry::new(StockOptionsTool::new(market));
    let llm = LlmClient::new(config.base_url.clone(), config.request_timeout)?;
    // The HTTP timeout fires first; this only guards a stalled body read.
    let opts = AgentOptions {
        step_timeout: config.request_timeout + Duration::from_secs(5),
    };
    let agent = Agent::new(Box::new(llm), registry, opts);

    Ok(ChatApp::new(
        agent,
        store,
        config.api_key.clone(),
        config.model,
        config.temperature,
    ))
}

async fn run_tui(mut app: ChatApp) -> anyhow::Result<()> {
    let (mut tui, ui_tx) = TuiApp::new(app.topic(), app.saved_topics(), app.model().as_str());
    if !app.has_api_key() {
        let _ = ui_tx.send(UiEvent::App(AppEvent::Failure(NO_API_KEY.to_string())));
    }

    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<String>();

    // Single worker: each input is fully handled before the next is read.
    let worker = tokio::spawn(async move {
        while let Some(input) = input_rx.recv().await {
            for event in app.handle_input(&input).await {
                if ui_tx.send(UiEvent::App(event)).is_err() {
                    return;
                }
            }
            let _ = ui_tx.send(UiEvent::Complete);
        }
    });

    let result = tui.run_with_input_callback(input_tx).await;
    worker.abort();
    result
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_cli(Cli::parse())?;
    let store = ConversationStore::open(&config.conversations_dir)?;
    init_logging(&config)?;

    tracing::info!(
        model = %config.model,
        temperature = config.temperature,
        base_url = %config.base_url,
        conversations = %store.dir().display(),
        "starting ticker-chat"
    );

    let mut app = build_app(&config, store)?;
    if config.plain {
        ui::plain::run(&mut app).await
    } else {
        run_tui(app).await
    }
}
