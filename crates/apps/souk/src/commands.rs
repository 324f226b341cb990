//! Subcommand implementations

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{info, warn};

use chat::remote::api::MessageDto;
use chat::{
    Assistant, AssistantClient, AssistantMessage, ChatConfig, ChatStore, GeoPoint,
    HttpStoreFetcher, InMemoryRemote, MainQueue, Message, MessageRepository, Origin, Product,
    ResolveSummary, SearchArea, Session, Settings, SqliteChatStore, StoreId, StoreResolver, UserId,
};

const DB_FILE: &str = "chat.db";
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);

fn open_store(db: Option<PathBuf>) -> Result<Arc<SqliteChatStore>> {
    let path = match db {
        Some(path) => path,
        None => config::data_dir()
            .context("Could not determine data directory")?
            .join(DB_FILE),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    info!("Opening {}", path.display());
    Ok(Arc::new(SqliteChatStore::new(&path)?))
}

/// Repository without a reachable backend; merges and reads only
fn offline_repository(store: Arc<SqliteChatStore>) -> MessageRepository {
    MessageRepository::new(store, Arc::new(InMemoryRemote::offline()))
}

/// `--user`, else the signed-in user from settings
fn current_user(user: Option<String>, settings: &Settings) -> UserId {
    match user {
        Some(user) => UserId::new(user),
        None => settings.user().unwrap_or_else(|| UserId::new("local")),
    }
}

fn format_price(product: &Product) -> String {
    format!(
        "{}.{:02} {}",
        product.price / 100,
        (product.price % 100).abs(),
        product.currency
    )
}

fn format_time(timestamp: i64) -> String {
    DateTime::from_timestamp_millis(timestamp)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn import(db: Option<PathBuf>, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
    let records: Vec<MessageDto> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse snapshot: {}", path.display()))?;

    let repository = offline_repository(open_store(db)?);
    repository.load_local()?;
    let stats = repository.apply_remote_snapshot(records.into_iter().map(Message::from).collect());

    println!(
        "{} received, {} new, {} already stored, {} failed",
        stats.received, stats.inserted, stats.skipped, stats.errors
    );
    Ok(())
}

pub fn list(db: Option<PathBuf>, user: Option<String>, resolve: bool) -> Result<()> {
    let repository = offline_repository(open_store(db)?);
    repository.load_local()?;
    let messages = repository.messages();

    let queue = MainQueue::new();
    let user = current_user(user, &Settings::load()?);
    let session = Arc::new(Session::new(user, queue.handle()));

    if resolve {
        resolve_stores(&session, &queue, chat::store_ids(&messages))?;
    }

    let summaries = chat::list_conversations(&messages, session.directory());
    if summaries.is_empty() {
        println!("No conversations");
        return Ok(());
    }

    for summary in &summaries {
        let conversation = &summary.conversation;
        let when = conversation
            .last_timestamp()
            .map(format_time)
            .unwrap_or_default();
        let badge = match conversation.unread_count {
            0 => String::new(),
            n => format!(" ({} unread)", n),
        };
        println!("{:<28} {}{}", summary.title(), when, badge);
        if let Some(preview) = summary.preview() {
            println!("    {}", preview);
        }
    }
    Ok(())
}

fn resolve_stores(session: &Arc<Session>, queue: &MainQueue, ids: Vec<StoreId>) -> Result<()> {
    let config = ChatConfig::load()?;
    let fetcher = HttpStoreFetcher::new(config.base_url.as_str(), config.request_timeout)?;
    let resolver = StoreResolver::new(Arc::new(fetcher), session.clone());

    let done = Arc::new(AtomicBool::new(false));
    let summary = Arc::new(Mutex::new(ResolveSummary::default()));
    let (flag, sink) = (done.clone(), summary.clone());
    resolver.resolve_stores(ids, |_| {}, move |s| {
        *sink.lock().unwrap() = s;
        flag.store(true, Ordering::SeqCst);
    });

    if !queue.run_until(RESOLVE_TIMEOUT, || done.load(Ordering::SeqCst)) {
        warn!("Timed out waiting for store profiles");
        return Ok(());
    }

    let summary = summary.lock().unwrap();
    if summary.failed > 0 {
        warn!("{} of {} stores could not be resolved", summary.failed, summary.requested);
    }
    Ok(())
}

pub fn show(db: Option<PathBuf>, store_id: &str) -> Result<()> {
    let store = open_store(db)?;
    let messages = store.list_messages()?;
    let Some(conversation) = chat::conversation_for_store(&messages, &StoreId::new(store_id))
    else {
        println!("No messages with {}", store_id);
        return Ok(());
    };

    for message in &conversation.messages {
        let who = match message.origin {
            Origin::User => "you",
            Origin::Counterparty => "store",
        };
        println!(
            "[{}] {:<5} {} ({})",
            format_time(message.timestamp),
            who,
            message.text,
            message.status.as_str()
        );
    }
    Ok(())
}

pub fn unread(db: Option<PathBuf>) -> Result<()> {
    let store = open_store(db)?;
    let conversations = chat::group_and_sort(&store.list_messages()?);
    println!("{}", chat::total_unread(&conversations));
    Ok(())
}

fn print_assistant_message(message: &AssistantMessage) {
    let who = if message.is_user { "you" } else { "assistant" };
    println!(
        "[{}] {}: {}",
        format_time(message.timestamp),
        who,
        message.first_text
    );
    for product in &message.products {
        println!("    - {} ({})", product.name, format_price(product));
    }
    if let Some(text) = &message.second_text {
        println!("    {}", text);
    }
    for product in &message.optional_products {
        println!("    ~ {} ({})", product.name, format_price(product));
    }
}

/// Ask the shopping assistant, searching around the saved position
pub fn ask(db: Option<PathBuf>, user: Option<String>, query: &str) -> Result<()> {
    let store = open_store(db)?;
    let settings = Settings::load()?;
    let config = ChatConfig::load()?;

    let client = AssistantClient::new(config.base_url.as_str(), config.request_timeout)?;
    let assistant = Assistant::new(Arc::new(client), store).with_client_key(config.client_key);
    if settings.location().is_none() {
        warn!("No saved position; searching around (0, 0)");
    }

    let reply = assistant.ask(
        &current_user(user, &settings),
        query,
        SearchArea::from_settings(&settings),
    )?;
    print_assistant_message(&reply);
    Ok(())
}

pub fn assistant_log(db: Option<PathBuf>) -> Result<()> {
    let store = open_store(db)?;
    let log = store.list_assistant_messages()?;
    if log.is_empty() {
        println!("No assistant messages");
    }
    for message in &log {
        print_assistant_message(message);
    }
    Ok(())
}

pub fn purge_assistant(db: Option<PathBuf>) -> Result<()> {
    let store = open_store(db)?;
    let removed = store.delete_assistant_messages()?;
    println!("Removed {} assistant messages", removed);
    Ok(())
}

pub fn settings(
    distance: Option<u32>,
    location: Option<(f64, f64)>,
    user_id: Option<String>,
) -> Result<()> {
    let mut settings = Settings::load()?;
    let changed = distance.is_some() || location.is_some() || user_id.is_some();

    if let Some(distance) = distance {
        settings.distance_km = distance;
    }
    if let Some((latitude, longitude)) = location {
        settings.set_location(GeoPoint::new(latitude, longitude));
    }
    if let Some(user_id) = user_id {
        settings.user_id = Some(user_id);
    }
    if changed {
        settings.save()?;
    }

    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
