//! SQLite-based chat storage

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rusqlite_migration::{M, Migrations};

use super::traits::ChatStore;
use crate::models::{AssistantMessage, Message, MessageId, MessageStatus, Origin, StoreId, UserId};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            -- Store conversation messages
            CREATE TABLE messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                text TEXT NOT NULL,
                origin TEXT NOT NULL,
                client_id TEXT NOT NULL,
                store_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                status TEXT NOT NULL,
                product TEXT
            );

            CREATE INDEX idx_messages_timestamp ON messages(timestamp ASC, seq ASC);
            CREATE INDEX idx_messages_store_id ON messages(store_id);

            -- Assistant log, purged in bulk only
            CREATE TABLE assistant_messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                is_user INTEGER NOT NULL,
                timestamp INTEGER NOT NULL,
                first_text TEXT NOT NULL,
                products TEXT NOT NULL DEFAULT '[]',
                second_text TEXT,
                optional_products TEXT NOT NULL DEFAULT '[]'
            );
            "#,
        ),
    ])
}

const MESSAGE_COLUMNS: &str = "id, text, origin, client_id, store_id, timestamp, status, product";

/// Raw message row before enum columns are parsed
type MessageRow = (String, String, String, String, String, i64, String, Option<String>);

fn read_message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn origin_to_str(origin: Origin) -> &'static str {
    match origin {
        Origin::User => "user",
        Origin::Counterparty => "counterparty",
    }
}

fn message_from_row(row: MessageRow) -> Result<Message> {
    let (id, text, origin, client_id, store_id, timestamp, status, product) = row;

    let origin = match origin.as_str() {
        "user" => Origin::User,
        "counterparty" => Origin::Counterparty,
        other => return Err(anyhow!("Unknown origin '{}' for message {}", other, id)),
    };
    let status = MessageStatus::parse(&status)
        .with_context(|| format!("Unknown status '{}' for message {}", status, id))?;

    Ok(Message {
        id: MessageId::new(id),
        text,
        origin,
        client_id: UserId::new(client_id),
        store_id: StoreId::new(store_id),
        timestamp,
        status,
        product,
    })
}

/// SQLite-based chat storage
pub struct SqliteChatStore {
    conn: Mutex<Connection>,
}

impl SqliteChatStore {
    /// Open (or create) a chat database at `db_path`
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        // WAL lets the UI read while a snapshot merge is writing
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ChatStore for SqliteChatStore {
    fn list_messages(&self) -> Result<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM messages ORDER BY timestamp ASC, seq ASC",
            MESSAGE_COLUMNS
        ))?;

        let rows = stmt
            .query_map([], read_message_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(message_from_row).collect()
    }

    fn get_message(&self, id: &MessageId) -> Result<Option<Message>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM messages WHERE id = ?", MESSAGE_COLUMNS),
                [id.as_str()],
                read_message_row,
            )
            .optional()?;

        row.map(message_from_row).transpose()
    }

    fn has_message(&self, id: &MessageId) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM messages WHERE id = ?)",
            [id.as_str()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn insert_message(&self, message: Message) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "INSERT INTO messages (id, text, origin, client_id, store_id, timestamp, status, product)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
            params![
                message.id.as_str(),
                message.text,
                origin_to_str(message.origin),
                message.client_id.as_str(),
                message.store_id.as_str(),
                message.timestamp,
                message.status.as_str(),
                message.product,
            ],
        )?;
        Ok(changed > 0)
    }

    fn update_message_status(&self, id: &MessageId, status: MessageStatus) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE messages SET status = ? WHERE id = ?",
            params![status.as_str(), id.as_str()],
        )?;
        Ok(changed > 0)
    }

    fn count_messages(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn insert_assistant_message(&self, message: AssistantMessage) -> Result<()> {
        let products = serde_json::to_string(&message.products)?;
        let optional_products = serde_json::to_string(&message.optional_products)?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO assistant_messages
             (id, is_user, timestamp, first_text, products, second_text, optional_products)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
            params![
                message.id,
                message.is_user,
                message.timestamp,
                message.first_text,
                products,
                message.second_text,
                optional_products,
            ],
        )?;
        Ok(())
    }

    fn list_assistant_messages(&self) -> Result<Vec<AssistantMessage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, is_user, timestamp, first_text, products, second_text, optional_products
             FROM assistant_messages ORDER BY timestamp ASC, seq ASC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, bool>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, is_user, timestamp, first_text, products, second_text, optional_products)| {
                    Ok(AssistantMessage {
                        products: serde_json::from_str(&products)
                            .with_context(|| format!("Corrupt products for {}", id))?,
                        optional_products: serde_json::from_str(&optional_products)
                            .with_context(|| format!("Corrupt optional products for {}", id))?,
                        id,
                        is_user,
                        timestamp,
                        first_text,
                        second_text,
                    })
                },
            )
            .collect()
    }

    fn delete_assistant_messages(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute("DELETE FROM assistant_messages", [])?;
        Ok(removed)
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            DELETE FROM messages;
            DELETE FROM assistant_messages;
            "#,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Product;
    use tempfile::tempdir;

    fn create_test_store() -> (SqliteChatStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        // Use .test.sqlite extension to clearly distinguish from production databases
        let db_path = dir.path().join("chat.test.sqlite");
        let store = SqliteChatStore::new(&db_path).unwrap();
        (store, dir)
    }

    fn make_test_message(id: &str, store: &str, timestamp: i64) -> Message {
        Message::builder(MessageId::new(id), StoreId::new(store))
            .text("Is this still available?")
            .origin(Origin::Counterparty)
            .client_id(UserId::new("u1"))
            .timestamp(timestamp)
            .product(r#"{"id":"p1"}"#)
            .build()
    }

    #[test]
    fn test_insert_and_get_roundtrip() {
        let (store, _dir) = create_test_store();
        let message = make_test_message("m1", "s1", 100);

        assert!(store.insert_message(message.clone()).unwrap());

        let loaded = store.get_message(&MessageId::new("m1")).unwrap().unwrap();
        assert_eq!(loaded, message);
        assert!(store.has_message(&MessageId::new("m1")).unwrap());
        assert!(!store.has_message(&MessageId::new("m2")).unwrap());
    }

    #[test]
    fn test_duplicate_insert_is_ignored() {
        let (store, _dir) = create_test_store();

        assert!(store.insert_message(make_test_message("m1", "s1", 100)).unwrap());
        assert!(!store.insert_message(make_test_message("m1", "s1", 100)).unwrap());
        assert_eq!(store.count_messages().unwrap(), 1);
    }

    #[test]
    fn test_list_orders_by_timestamp_then_insertion() {
        let (store, _dir) = create_test_store();
        store.insert_message(make_test_message("late", "s1", 300)).unwrap();
        store.insert_message(make_test_message("tie-a", "s2", 200)).unwrap();
        store.insert_message(make_test_message("early", "s1", 100)).unwrap();
        store.insert_message(make_test_message("tie-b", "s1", 200)).unwrap();

        let ids: Vec<_> = store
            .list_messages()
            .unwrap()
            .into_iter()
            .map(|m| m.id.0)
            .collect();
        assert_eq!(ids, vec!["early", "tie-a", "tie-b", "late"]);
    }

    #[test]
    fn test_update_status_persists() {
        let (store, dir) = create_test_store();
        store.insert_message(make_test_message("m1", "s1", 100)).unwrap();
        assert!(store
            .update_message_status(&MessageId::new("m1"), MessageStatus::Read)
            .unwrap());
        drop(store);

        // Reopen to make sure the change hit disk
        let reopened = SqliteChatStore::new(dir.path().join("chat.test.sqlite")).unwrap();
        let loaded = reopened.get_message(&MessageId::new("m1")).unwrap().unwrap();
        assert_eq!(loaded.status, MessageStatus::Read);
    }

    #[test]
    fn test_assistant_log_roundtrip_and_purge() {
        let (store, _dir) = create_test_store();
        let product = Product {
            id: "p1".to_string(),
            name: "Grinder".to_string(),
            price: 4999,
            currency: "EUR".to_string(),
            image_url: String::new(),
            store_id: StoreId::new("s1"),
        };

        store
            .insert_assistant_message(AssistantMessage::prompt("a1", "a burr grinder"))
            .unwrap();
        store
            .insert_assistant_message(AssistantMessage::reply(
                "a2",
                "Here is one nearby",
                vec![product.clone()],
                None,
                Vec::new(),
            ))
            .unwrap();
        store.insert_message(make_test_message("m1", "s1", 100)).unwrap();

        let log = store.list_assistant_messages().unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].products, vec![product]);

        assert_eq!(store.delete_assistant_messages().unwrap(), 2);
        assert!(store.list_assistant_messages().unwrap().is_empty());
        assert_eq!(store.count_messages().unwrap(), 1);
    }

    #[test]
    fn test_clear() {
        let (store, _dir) = create_test_store();
        store.insert_message(make_test_message("m1", "s1", 100)).unwrap();
        store.clear().unwrap();
        assert_eq!(store.count_messages().unwrap(), 0);
    }
}
