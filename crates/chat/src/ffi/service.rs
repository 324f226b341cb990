//! ChatService facade for UniFFI export
//!
//! This provides a high-level, FFI-friendly API that wraps the internal
//! storage, sync, store resolution, status, assistant and cart
//! functionality.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use anyhow::Context;
use log::info;
use url::Url;

use crate::actions::{Assistant, SearchArea};
use crate::config::ChatConfig;
use crate::ffi::logging;
use crate::ffi::types::*;
use crate::models::{Cart, GeoPoint, MessageId, MessageStatus, StoreId, UserId};
use crate::query;
use crate::remote::{
    AssistantClient, HttpStoreFetcher, MessageFilter, RemoteMessages, RemoteRecord, StoreFetcher,
};
use crate::session::Session;
use crate::settings::DEFAULT_DISTANCE_KM;
use crate::storage::{ChatStore, SqliteChatStore};
use crate::sync::{MainQueue, MessageRepository, StoreResolver};

/// Adapts the host's backend callback to [`RemoteMessages`]
struct CallbackRemote {
    callback: Box<dyn RemoteMessagesCallback>,
}

impl RemoteMessages for CallbackRemote {
    fn add_message(&self, message: &crate::models::Message) -> anyhow::Result<()> {
        self.callback.add_message(message.clone().into())?;
        Ok(())
    }

    fn find_message(&self, filter: &MessageFilter) -> anyhow::Result<Option<RemoteRecord>> {
        let document_id = self.callback.find_message(
            filter.client_id.0.clone(),
            filter.store_id.0.clone(),
            filter.timestamp,
        )?;
        Ok(document_id.map(|document_id| RemoteRecord { document_id }))
    }

    fn update_status(&self, record: &RemoteRecord, status: MessageStatus) -> anyhow::Result<()> {
        self.callback
            .update_status(record.document_id.clone(), status.into())?;
        Ok(())
    }
}

/// Backend settings; `souk.json` is only read when no URL is given
fn resolve_config(
    base_url: Option<String>,
    load: impl FnOnce() -> anyhow::Result<ChatConfig>,
) -> Result<ChatConfig, ChatError> {
    match base_url {
        Some(url) => Ok(ChatConfig {
            base_url: Url::parse(&url).map_err(|e| ChatError::InvalidArgument {
                message: format!("Invalid base URL {}: {}", url, e),
            })?,
            ..ChatConfig::default()
        }),
        None => Ok(load()?),
    }
}

fn invalid_url(e: anyhow::Error) -> ChatError {
    ChatError::InvalidArgument {
        message: format!("{:#}", e),
    }
}

/// Main service object for chat operations
///
/// This is the primary entry point for Swift/Kotlin code. Results of
/// background work (store profiles) are delivered when the host calls
/// [`ChatService::pump`] from its main thread.
#[derive(uniffi::Object)]
pub struct ChatService {
    store: Arc<SqliteChatStore>,
    repository: Arc<MessageRepository>,
    fetcher: Arc<dyn StoreFetcher>,
    assistant: Assistant,
    cart: Mutex<Cart>,
    session: RwLock<Arc<Session>>,
    queue: Mutex<MainQueue>,
}

impl ChatService {
    fn current_session(&self) -> Arc<Session> {
        self.session.read().unwrap().clone()
    }
}

#[uniffi::export]
impl ChatService {
    /// Create a new ChatService
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `user_id` - The signed-in user
    /// * `base_url` - Backend base URL; `None` loads it from config
    /// * `client_key` - API key for product searches; `None` uses config
    /// * `remote` - Backend write endpoints implemented by the host SDK
    #[uniffi::constructor]
    pub fn new(
        db_path: String,
        user_id: String,
        base_url: Option<String>,
        client_key: Option<String>,
        remote: Box<dyn RemoteMessagesCallback>,
    ) -> Result<Arc<Self>, ChatError> {
        if let Some(parent) = PathBuf::from(&db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| ChatError::Database {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let store = Arc::new(SqliteChatStore::new(&db_path).map_err(|e| {
            ChatError::Database {
                message: format!("Failed to open database: {:#}", e),
            }
        })?);

        let config = resolve_config(base_url, ChatConfig::load)?;
        let fetcher = HttpStoreFetcher::new(config.base_url.as_str(), config.request_timeout)
            .map_err(invalid_url)?;
        let search = AssistantClient::new(config.base_url.as_str(), config.request_timeout)
            .map_err(invalid_url)?;
        let assistant = Assistant::new(Arc::new(search), store.clone())
            .with_client_key(client_key.or(config.client_key));

        let remote: Arc<dyn RemoteMessages> = Arc::new(CallbackRemote { callback: remote });
        let repository = Arc::new(MessageRepository::new(store.clone(), remote));
        let queue = MainQueue::new();
        let session = Arc::new(Session::new(UserId::new(user_id), queue.handle()));

        Ok(Arc::new(Self {
            store,
            repository,
            fetcher: Arc::new(fetcher),
            assistant,
            cart: Mutex::new(Cart::new()),
            session: RwLock::new(session),
            queue: Mutex::new(queue),
        }))
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Seed the message view from the local database
    pub fn load_local(&self) -> Result<u32, ChatError> {
        Ok(self.repository.load_local()? as u32)
    }

    /// Merge a snapshot delivered by the host's backend listener
    pub fn apply_snapshot(&self, messages: Vec<FfiMessage>) -> FfiMergeStats {
        let incoming = messages.into_iter().map(Into::into).collect();
        self.repository.apply_remote_snapshot(incoming).into()
    }

    /// Current message view, in delivery order
    pub fn messages(&self) -> Vec<FfiMessage> {
        self.repository
            .messages()
            .into_iter()
            .map(FfiMessage::from)
            .collect()
    }

    /// Store a message locally and submit it to the backend
    pub fn send_message(&self, message: FfiMessage) -> Result<FfiSendOutcome, ChatError> {
        if message.id.is_empty() {
            return Err(ChatError::InvalidArgument {
                message: "Message ID must not be empty".to_string(),
            });
        }
        Ok(self.repository.send(message.into())?.into())
    }

    /// Mark a stored message as read
    pub fn mark_as_read(&self, message_id: String) -> Result<FfiStatusOutcome, ChatError> {
        let message = self
            .store
            .get_message(&MessageId::new(message_id.clone()))?
            .ok_or(ChatError::NotFound {
                resource: format!("message {}", message_id),
            })?;
        Ok(self.repository.mark_read(&message).into())
    }

    /// Mark a stored message as delivered
    pub fn mark_as_delivered(&self, message_id: String) -> Result<FfiStatusOutcome, ChatError> {
        let message = self
            .store
            .get_message(&MessageId::new(message_id.clone()))?
            .ok_or(ChatError::NotFound {
                resource: format!("message {}", message_id),
            })?;
        Ok(self.repository.mark_delivered(&message).into())
    }

    /// Re-attempt failed sends and read receipts
    pub fn retry_failed(&self) -> FfiRetryReport {
        self.repository.retry_failed().into()
    }

    pub fn pending_retries(&self) -> Vec<FfiRetryEntry> {
        self.repository
            .pending_retries()
            .into_iter()
            .map(FfiRetryEntry::from)
            .collect()
    }

    // ========================================================================
    // Conversations
    // ========================================================================

    /// Conversations, most recent first, with store profiles attached
    pub fn list_conversations(&self) -> Vec<FfiConversation> {
        let session = self.current_session();
        query::list_conversations(&self.repository.messages(), session.directory())
            .into_iter()
            .map(FfiConversation::from)
            .collect()
    }

    /// Unread store messages across all conversations
    pub fn total_unread(&self) -> u32 {
        let conversations = query::group_and_sort(&self.repository.messages());
        query::total_unread(&conversations) as u32
    }

    // ========================================================================
    // Store Resolution
    // ========================================================================

    /// Fetch store profiles not yet requested this session
    ///
    /// Returns the IDs actually fetched. Results arrive through `callback`
    /// during later calls to [`ChatService::pump`].
    pub fn resolve_stores(
        &self,
        store_ids: Vec<String>,
        callback: Box<dyn StoreResolutionCallback>,
    ) -> Vec<String> {
        let resolver = StoreResolver::new(self.fetcher.clone(), self.current_session());
        let callback: Arc<dyn StoreResolutionCallback> = Arc::from(callback);
        let on_store = callback.clone();

        resolver
            .resolve_stores(
                store_ids.into_iter().map(StoreId::new),
                move |profile| on_store.on_store(profile.clone().into()),
                move |summary| callback.on_complete(summary.into()),
            )
            .into_iter()
            .map(|id| id.0)
            .collect()
    }

    /// Resolve the store of every conversation in the message view
    pub fn resolve_conversation_stores(
        &self,
        callback: Box<dyn StoreResolutionCallback>,
    ) -> Vec<String> {
        let ids = query::store_ids(&self.repository.messages())
            .into_iter()
            .map(|id| id.0)
            .collect();
        self.resolve_stores(ids, callback)
    }

    /// Run queued background results on the calling thread
    ///
    /// Hosts call this from their main thread; returns how many jobs ran.
    pub fn pump(&self) -> u32 {
        self.queue.lock().unwrap().run_pending() as u32
    }

    // ========================================================================
    // Assistant
    // ========================================================================

    /// Ask the shopping assistant for products, returning its logged reply
    ///
    /// Blocks on the network; call it off the main thread. A failed search
    /// yields a reply carrying the error rather than an `Err`.
    pub fn send_assistant_query(
        &self,
        query: String,
        distance_km: Option<u32>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<FfiAssistantMessage, ChatError> {
        if query.trim().is_empty() {
            return Err(ChatError::InvalidArgument {
                message: "Query must not be empty".to_string(),
            });
        }
        let area = SearchArea {
            center: latitude
                .zip(longitude)
                .map(|(latitude, longitude)| GeoPoint::new(latitude, longitude)),
            distance_km: distance_km.unwrap_or(DEFAULT_DISTANCE_KM),
        };
        let user = self.current_session().user_id().clone();
        Ok(self.assistant.ask(&user, &query, area)?.into())
    }

    /// Assistant log, oldest first
    pub fn assistant_log(&self) -> Result<Vec<FfiAssistantMessage>, ChatError> {
        Ok(self
            .assistant
            .log()?
            .into_iter()
            .map(FfiAssistantMessage::from)
            .collect())
    }

    /// Remove every assistant conversation entry
    pub fn purge_assistant_log(&self) -> Result<u32, ChatError> {
        Ok(self.assistant.purge()? as u32)
    }

    // ========================================================================
    // Cart
    // ========================================================================

    pub fn add_to_cart(&self, product: FfiProduct) {
        self.cart.lock().unwrap().add(product.into());
    }

    /// Remove the items at `offsets` (positions before any removal)
    pub fn remove_from_cart(&self, offsets: Vec<u32>) {
        let offsets: Vec<usize> = offsets.into_iter().map(|o| o as usize).collect();
        self.cart.lock().unwrap().remove_at(&offsets);
    }

    pub fn cart_items(&self) -> Vec<FfiProduct> {
        self.cart
            .lock()
            .unwrap()
            .items()
            .iter()
            .cloned()
            .map(FfiProduct::from)
            .collect()
    }

    /// Cart totals per currency
    pub fn cart_totals(&self) -> Vec<FfiCartTotal> {
        self.cart
            .lock()
            .unwrap()
            .totals()
            .into_iter()
            .map(|(currency, amount)| FfiCartTotal { currency, amount })
            .collect()
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// End the session: cancel store fetches and wipe local data
    pub fn logout(&self) -> Result<(), ChatError> {
        self.current_session().teardown();
        self.repository.reset();
        self.cart.lock().unwrap().clear();
        self.store.clear().context("Failed to clear local data")?;
        Ok(())
    }

    /// Start a fresh session for `user_id`, replacing the current one
    pub fn start_session(&self, user_id: String) {
        let handle = self.queue.lock().unwrap().handle();
        let session = Arc::new(Session::new(UserId::new(user_id), handle));
        let previous = std::mem::replace(&mut *self.session.write().unwrap(), session);
        previous.teardown();
        info!("Started session for {}", self.current_session().user_id().as_str());
    }
}

// ============================================================================
// Logging
// ============================================================================

/// Install the callback logger; call once at startup
#[uniffi::export]
pub fn initialize_logging(callback: Box<dyn LogCallback>, max_level: FfiLogLevel) {
    let level = log::Level::from(max_level);
    // Fails only if a logger is already installed; the callback still updates
    let _ = logging::init_ffi_logger(level);
    logging::set_log_callback(Some(Arc::from(callback)));
    logging::set_log_level(level);
}

/// Change the maximum level forwarded to the log callback
#[uniffi::export]
pub fn update_log_level(level: FfiLogLevel) {
    logging::set_log_level(level.into());
}

/// Stop forwarding log records to the host
#[uniffi::export]
pub fn clear_log_callback() {
    logging::set_log_callback(None);
}
