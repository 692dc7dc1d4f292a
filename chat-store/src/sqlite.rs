//! SQLite storage backend.
//!
//! Rows hold MessagePack-encoded model payloads keyed by their natural
//! id; the SQL layer never interprets the payload beyond the columns it
//! indexes on. Uses WAL mode for concurrent reads/writes.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tokio::sync::watch;

use chat_types::{
    Channel, ChannelConfig, Cid, Filter, Message, QuerySpecSnapshot, SortSpec, SyncState, User,
    UserId,
};

use crate::error::StoreError;
use crate::provider::RepositoryFactory;
use crate::repos::{
    ChannelConfigRepository, ChannelRepository, MessageRepository, QuerySpecRepository,
    SyncStateRepository, UserRepository,
};

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    rmp_serde::to_vec(value).map_err(StoreError::Encode)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    rmp_serde::from_slice(bytes).map_err(StoreError::Decode)
}

/// SQLite-backed store implementing every repository trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    users_tx: Arc<watch::Sender<HashMap<UserId, User>>>,
    // The feed mirrors inserts made through this store instance.
    users_view: Arc<Mutex<HashMap<UserId, User>>>,
}

impl SqliteStore {
    /// Open (creating if missing) a database file.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path.to_str().unwrap_or("backchat.db"))
            .map_err(StoreError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(StoreError::Database)?;

        tracing::debug!(path = %path.display(), "opened chat database");
        Self::from_pool(pool).await
    }

    /// Create an in-memory database (for testing).
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StoreError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(StoreError::Database)?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let (users_tx, _) = watch::channel(HashMap::new());
        let store = Self {
            pool,
            users_tx: Arc::new(users_tx),
            users_view: Arc::new(Mutex::new(HashMap::new())),
        };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                payload BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channels (
                cid TEXT PRIMARY KEY,
                payload BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                cid TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                payload BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_states (
                user_id TEXT PRIMARY KEY,
                payload BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS query_specs (
                key BLOB PRIMARY KEY,
                payload BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS channel_configs (
                channel_type TEXT PRIMARY KEY,
                payload BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_cid_created ON messages(cid, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        Ok(())
    }

    /// The (filter, sort) pair encoded as the query-spec row key.
    fn spec_key(filter: &Filter, sort: &SortSpec) -> Result<Vec<u8>, StoreError> {
        encode(&(filter, sort))
    }
}

#[async_trait]
impl UserRepository for SqliteStore {
    async fn select_user(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT payload FROM users WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Database)?;

        row.map(|r| decode(r.get::<Vec<u8>, _>(0).as_slice()))
            .transpose()
    }

    async fn select_users(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.select_user(id).await? {
                users.push(user);
            }
        }
        Ok(users)
    }

    async fn insert_users(&self, users: &[User]) -> Result<(), StoreError> {
        for user in users {
            sqlx::query("INSERT OR REPLACE INTO users (id, payload) VALUES (?1, ?2)")
                .bind(user.id.as_str())
                .bind(encode(user)?)
                .execute(&self.pool)
                .await
                .map_err(StoreError::Database)?;
        }
        let view = {
            let mut view = self.users_view.lock().unwrap();
            for user in users {
                view.insert(user.id.clone(), user.clone());
            }
            view.clone()
        };
        self.users_tx.send_replace(view);
        Ok(())
    }

    fn observe_latest_users(&self) -> watch::Receiver<HashMap<UserId, User>> {
        self.users_tx.subscribe()
    }
}

#[async_trait]
impl ChannelRepository for SqliteStore {
    async fn select_channel(&self, cid: &Cid) -> Result<Option<Channel>, StoreError> {
        let row = sqlx::query("SELECT payload FROM channels WHERE cid = ?1")
            .bind(cid.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Database)?;

        row.map(|r| decode(r.get::<Vec<u8>, _>(0).as_slice()))
            .transpose()
    }

    async fn select_channels(&self, cids: &[Cid]) -> Result<Vec<Channel>, StoreError> {
        let mut channels = Vec::with_capacity(cids.len());
        for cid in cids {
            if let Some(channel) = self.select_channel(cid).await? {
                channels.push(channel);
            }
        }
        Ok(channels)
    }

    async fn upsert_channels(&self, channels: &[Channel]) -> Result<(), StoreError> {
        for channel in channels {
            sqlx::query("INSERT OR REPLACE INTO channels (cid, payload) VALUES (?1, ?2)")
                .bind(channel.cid.to_string())
                .bind(encode(channel)?)
                .execute(&self.pool)
                .await
                .map_err(StoreError::Database)?;
        }
        Ok(())
    }

    async fn delete_channel(&self, cid: &Cid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM channels WHERE cid = ?1")
            .bind(cid.to_string())
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)?;
        sqlx::query("DELETE FROM messages WHERE cid = ?1")
            .bind(cid.to_string())
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)?;
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for SqliteStore {
    async fn select_message(&self, id: &str) -> Result<Option<Message>, StoreError> {
        let row = sqlx::query("SELECT payload FROM messages WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Database)?;

        row.map(|r| decode(r.get::<Vec<u8>, _>(0).as_slice()))
            .transpose()
    }

    async fn select_messages_for_channel(
        &self,
        cid: &Cid,
        limit: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT payload FROM messages
            WHERE cid = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(cid.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        rows.iter()
            .map(|r| decode(r.get::<Vec<u8>, _>(0).as_slice()))
            .collect()
    }

    async fn upsert_messages(&self, messages: &[Message]) -> Result<(), StoreError> {
        for message in messages {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO messages (id, cid, created_at, payload)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(&message.id)
            .bind(message.cid.to_string())
            .bind(message.created_at.millis())
            .bind(encode(message)?)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)?;
        }
        Ok(())
    }

    async fn delete_message(&self, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM messages WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)?;
        Ok(())
    }
}

#[async_trait]
impl SyncStateRepository for SqliteStore {
    async fn select_sync_state(&self, user_id: &UserId) -> Result<Option<SyncState>, StoreError> {
        let row = sqlx::query("SELECT payload FROM sync_states WHERE user_id = ?1")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Database)?;

        row.map(|r| decode(r.get::<Vec<u8>, _>(0).as_slice()))
            .transpose()
    }

    async fn insert_sync_state(&self, state: &SyncState) -> Result<(), StoreError> {
        sqlx::query("INSERT OR REPLACE INTO sync_states (user_id, payload) VALUES (?1, ?2)")
            .bind(state.user_id().as_str())
            .bind(encode(state)?)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)?;
        Ok(())
    }
}

#[async_trait]
impl QuerySpecRepository for SqliteStore {
    async fn select_query_spec(
        &self,
        filter: &Filter,
        sort: &SortSpec,
    ) -> Result<Option<QuerySpecSnapshot>, StoreError> {
        let row = sqlx::query("SELECT payload FROM query_specs WHERE key = ?1")
            .bind(Self::spec_key(filter, sort)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Database)?;

        row.map(|r| decode(r.get::<Vec<u8>, _>(0).as_slice()))
            .transpose()
    }

    async fn insert_query_spec(&self, snapshot: &QuerySpecSnapshot) -> Result<(), StoreError> {
        sqlx::query("INSERT OR REPLACE INTO query_specs (key, payload) VALUES (?1, ?2)")
            .bind(Self::spec_key(&snapshot.filter, &snapshot.sort)?)
            .bind(encode(snapshot)?)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)?;
        Ok(())
    }
}

#[async_trait]
impl ChannelConfigRepository for SqliteStore {
    async fn select_channel_config(
        &self,
        channel_type: &str,
    ) -> Result<Option<ChannelConfig>, StoreError> {
        let row = sqlx::query("SELECT payload FROM channel_configs WHERE channel_type = ?1")
            .bind(channel_type)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Database)?;

        row.map(|r| decode(r.get::<Vec<u8>, _>(0).as_slice()))
            .transpose()
    }

    async fn select_channel_configs(&self) -> Result<Vec<ChannelConfig>, StoreError> {
        let rows = sqlx::query("SELECT payload FROM channel_configs")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Database)?;

        rows.iter()
            .map(|r| decode(r.get::<Vec<u8>, _>(0).as_slice()))
            .collect()
    }

    async fn insert_channel_configs(
        &self,
        configs: &[ChannelConfig],
    ) -> Result<(), StoreError> {
        for config in configs {
            sqlx::query(
                "INSERT OR REPLACE INTO channel_configs (channel_type, payload) VALUES (?1, ?2)",
            )
            .bind(&config.channel_type)
            .bind(encode(config)?)
            .execute(&self.pool)
            .await
            .map_err(StoreError::Database)?;
        }
        Ok(())
    }
}

/// Factory vending repositories backed by one shared [`SqliteStore`].
#[derive(Clone)]
pub struct SqliteRepositoryFactory {
    store: Arc<SqliteStore>,
}

impl SqliteRepositoryFactory {
    /// Wrap an opened store.
    pub fn new(store: SqliteStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

impl RepositoryFactory for SqliteRepositoryFactory {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.store.clone()
    }

    fn channels(&self) -> Arc<dyn ChannelRepository> {
        self.store.clone()
    }

    fn messages(&self) -> Arc<dyn MessageRepository> {
        self.store.clone()
    }

    fn sync_state(&self) -> Arc<dyn SyncStateRepository> {
        self.store.clone()
    }

    fn query_specs(&self) -> Arc<dyn QuerySpecRepository> {
        self.store.clone()
    }

    fn channel_configs(&self) -> Arc<dyn ChannelConfigRepository> {
        self.store.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_types::{QueryId, Timestamp};

    fn channel(id: &str, team: &str) -> Channel {
        let mut ch = Channel::new(Cid::new("messaging", id), Timestamp::from_millis(1));
        ch.team = team.to_string();
        ch
    }

    fn message(id: &str, cid: &Cid, at: i64) -> Message {
        Message {
            id: id.to_string(),
            cid: cid.clone(),
            user_id: UserId::new("jo"),
            text: "hello".to_string(),
            created_at: Timestamp::from_millis(at),
            deleted_at: None,
            shadowed: false,
        }
    }

    #[tokio::test]
    async fn users_roundtrip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut user = User::new("jo");
        user.name = "Jo".to_string();
        user.online = true;

        store.insert_users(std::slice::from_ref(&user)).await.unwrap();
        let got = store.select_user(&user.id).await.unwrap().unwrap();
        assert_eq!(got, user);
    }

    #[tokio::test]
    async fn channels_roundtrip_with_extra_fields() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut ch = channel("general", "red");
        ch.extra.insert(
            "color".to_string(),
            chat_types::FieldValue::Str("blue".into()),
        );

        store.upsert_channels(std::slice::from_ref(&ch)).await.unwrap();
        let got = store.select_channel(&ch.cid).await.unwrap().unwrap();
        assert_eq!(got, ch);
    }

    #[tokio::test]
    async fn messages_newest_first_with_limit() {
        let store = SqliteStore::in_memory().await.unwrap();
        let cid = Cid::new("messaging", "general");
        store
            .upsert_messages(&[
                message("m1", &cid, 10),
                message("m2", &cid, 30),
                message("m3", &cid, 20),
            ])
            .await
            .unwrap();

        let got = store.select_messages_for_channel(&cid, 2).await.unwrap();
        let ids: Vec<&str> = got.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m3"]);
    }

    #[tokio::test]
    async fn delete_channel_drops_its_messages() {
        let store = SqliteStore::in_memory().await.unwrap();
        let ch = channel("general", "red");
        store.upsert_channels(std::slice::from_ref(&ch)).await.unwrap();
        store
            .upsert_messages(&[message("m1", &ch.cid, 10)])
            .await
            .unwrap();

        store.delete_channel(&ch.cid).await.unwrap();
        assert!(store.select_channel(&ch.cid).await.unwrap().is_none());
        assert!(store.select_message("m1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sync_state_roundtrip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut state = SyncState::new(UserId::new("jo"));
        state.mark_synced(Timestamp::from_millis(99));
        state.add_active_channel(Cid::new("messaging", "a"));

        store.insert_sync_state(&state).await.unwrap();
        let got = store
            .select_sync_state(&UserId::new("jo"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, state);
    }

    #[tokio::test]
    async fn query_specs_keyed_by_filter_and_sort() {
        let store = SqliteStore::in_memory().await.unwrap();
        let snapshot = QuerySpecSnapshot {
            id: QueryId::random(),
            filter: Filter::eq("team", "red"),
            sort: SortSpec::default(),
            cids: vec![Cid::new("messaging", "a")],
        };

        store.insert_query_spec(&snapshot).await.unwrap();
        let got = store
            .select_query_spec(&snapshot.filter, &snapshot.sort)
            .await
            .unwrap();
        assert_eq!(got, Some(snapshot.clone()));

        let other = Filter::eq("team", "blue");
        assert!(store
            .select_query_spec(&other, &snapshot.sort)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn user_feed_observes_inserts() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut feed = store.observe_latest_users();

        store.insert_users(&[User::new("jo")]).await.unwrap();
        feed.changed().await.unwrap();
        assert!(feed.borrow().contains_key(&UserId::new("jo")));
    }

    #[tokio::test]
    async fn on_disk_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.db");

        let snapshot = QuerySpecSnapshot {
            id: QueryId::random(),
            filter: Filter::eq("team", "red"),
            sort: SortSpec::default(),
            cids: vec![Cid::new("messaging", "a"), Cid::new("messaging", "b")],
        };

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store.upsert_channels(&[channel("a", "red")]).await.unwrap();
            store.insert_query_spec(&snapshot).await.unwrap();
        }

        let store = SqliteStore::open(&path).await.unwrap();
        let got = store
            .select_query_spec(&snapshot.filter, &snapshot.sort)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, snapshot);
        assert!(store
            .select_channel(&Cid::new("messaging", "a"))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn configs_roundtrip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let config = ChannelConfig {
            channel_type: "messaging".to_string(),
            typing_events: true,
            read_events: false,
            mutes: true,
            replies: false,
        };
        store
            .insert_channel_configs(std::slice::from_ref(&config))
            .await
            .unwrap();

        assert_eq!(
            store.select_channel_config("messaging").await.unwrap(),
            Some(config)
        );
    }
}
