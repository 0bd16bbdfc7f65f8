use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use watchlist_core::{
    transition, CatalogProvider, CatalogRef, ListEntry, ListId, PersistedId, PersistedItem,
    StoreError, Vote, WatchList, WatchlistStore,
};

use crate::event::StoreEvent;

/// One row of [`SqliteWatchlistStore::list_lists`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSummary {
    pub id: ListId,
    pub name: String,
    pub entries: usize,
}

/// SQLite-backed implementation of the WatchlistStore trait.
///
/// Every handle acts on behalf of one user. Handles made with
/// [`as_user`](Self::as_user) share the connection and the event channel.
pub struct SqliteWatchlistStore {
    conn: Arc<Mutex<Connection>>,
    user: String,
    event_tx: Sender<StoreEvent>,
    event_rx: Arc<Mutex<Option<Receiver<StoreEvent>>>>,
}

type ItemRow = (String, String, String, String);

impl SqliteWatchlistStore {
    /// Open (or create) a database at the given path.
    pub fn open(path: &Path, user: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(storage("open"))?;
        Self::init_with_connection(conn, user)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory(user: &str) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(storage("open_in_memory"))?;
        Self::init_with_connection(conn, user)
    }

    fn init_with_connection(conn: Connection, user: &str) -> Result<Self, StoreError> {
        Self::init_schema(&conn)?;
        let (tx, rx) = mpsc::channel();
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            user: user.to_string(),
            event_tx: tx,
            event_rx: Arc::new(Mutex::new(Some(rx))),
        })
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                external_id TEXT NOT NULL,
                title TEXT NOT NULL,
                created INTEGER NOT NULL,
                UNIQUE (provider, external_id)
            );

            CREATE TABLE IF NOT EXISTS lists (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS list_entries (
                list_id TEXT NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
                item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
                added INTEGER NOT NULL,
                PRIMARY KEY (list_id, item_id)
            );

            CREATE TABLE IF NOT EXISTS votes (
                list_id TEXT NOT NULL,
                item_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                vote TEXT NOT NULL CHECK (vote IN ('up', 'down')),
                PRIMARY KEY (list_id, item_id, user_id),
                FOREIGN KEY (list_id, item_id)
                    REFERENCES list_entries(list_id, item_id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_entries_item ON list_entries(item_id);
            ",
        )
        .map_err(storage("init_schema"))
    }

    /// A handle on the same database acting for another user.
    pub fn as_user(&self, user: &str) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
            user: user.to_string(),
            event_tx: self.event_tx.clone(),
            event_rx: Arc::clone(&self.event_rx),
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn create_list(&self, name: &str) -> Result<ListId, StoreError> {
        let id = ListId::new_v4();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO lists (id, name, created) VALUES (?1, ?2, ?3)",
            params![id.to_string(), name, Utc::now().timestamp_millis()],
        )
        .map_err(storage("create list"))?;
        tracing::info!(list_id = %id, name, "list created");
        Ok(id)
    }

    pub fn list_lists(&self) -> Result<Vec<ListSummary>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT l.id, l.name, COUNT(e.item_id)
                 FROM lists l LEFT JOIN list_entries e ON e.list_id = l.id
                 GROUP BY l.id
                 ORDER BY l.created, l.name",
            )
            .map_err(storage("prepare lists"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .map_err(storage("query lists"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage("read lists"))?;

        rows.into_iter()
            .map(|(id, name, entries)| {
                Ok(ListSummary {
                    id: ListId(parse_uuid(&id)?),
                    name,
                    entries: usize::try_from(entries).unwrap_or(0),
                })
            })
            .collect()
    }

    /// Take the receiving end of the change feed. Only one subscriber is
    /// supported across all handles on the database.
    pub fn subscribe(&self) -> Result<Receiver<StoreEvent>, StoreError> {
        self.event_rx
            .lock()
            .map_err(|e| StoreError::Storage(e.to_string()))?
            .take()
            .ok_or_else(|| StoreError::Storage("subscribe: receiver already taken".to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|e| StoreError::Storage(e.to_string()))
    }

    fn emit(&self, event: StoreEvent) {
        // Ignore send errors (receiver may be dropped)
        let _ = self.event_tx.send(event);
    }

    fn require_list(conn: &Connection, list_id: ListId) -> Result<(), StoreError> {
        let found = conn
            .query_row(
                "SELECT 1 FROM lists WHERE id = ?1",
                params![list_id.to_string()],
                |_| Ok(()),
            )
            .optional()
            .map_err(storage("find list"))?;
        found.ok_or(StoreError::ListNotFound(list_id))
    }

    fn load_item(conn: &Connection, item_id: PersistedId) -> Result<PersistedItem, StoreError> {
        let row = conn
            .query_row(
                "SELECT id, provider, external_id, title FROM items WHERE id = ?1",
                params![item_id.to_string()],
                item_row,
            )
            .optional()
            .map_err(storage("load item"))?;
        match row {
            Some(row) => to_item(row),
            None => Err(StoreError::ItemNotFound(item_id)),
        }
    }

    fn is_member(conn: &Connection, list_id: ListId, item_id: PersistedId) -> Result<bool, StoreError> {
        conn.query_row(
            "SELECT 1 FROM list_entries WHERE list_id = ?1 AND item_id = ?2",
            params![list_id.to_string(), item_id.to_string()],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
        .map_err(storage("find entry"))
    }

    fn user_vote(
        conn: &Connection,
        list_id: ListId,
        item_id: PersistedId,
        user: &str,
    ) -> Result<Option<Vote>, StoreError> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT vote FROM votes WHERE list_id = ?1 AND item_id = ?2 AND user_id = ?3",
                params![list_id.to_string(), item_id.to_string(), user],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage("load vote"))?;
        raw.map(|v| v.parse::<Vote>().map_err(StoreError::Storage))
            .transpose()
    }

    /// Authoritative entry for `item` as seen by `user`.
    fn entry_for(
        conn: &Connection,
        list_id: ListId,
        item: &PersistedItem,
        user: &str,
    ) -> Result<ListEntry, StoreError> {
        let (up, down): (i64, i64) = conn
            .query_row(
                "SELECT COALESCE(SUM(vote = 'up'), 0), COALESCE(SUM(vote = 'down'), 0)
                 FROM votes WHERE list_id = ?1 AND item_id = ?2",
                params![list_id.to_string(), item.id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(storage("count votes"))?;
        Ok(ListEntry {
            upvotes: to_count(up),
            downvotes: to_count(down),
            user_vote: Self::user_vote(conn, list_id, item.id, user)?,
            ..ListEntry::new(list_id, item.identity())
        })
    }
}

#[async_trait]
impl WatchlistStore for SqliteWatchlistStore {
    async fn find_or_create_item(
        &self,
        catalog_ref: &CatalogRef,
        title: Option<&str>,
    ) -> Result<PersistedItem, StoreError> {
        let conn = self.lock()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO items (id, provider, external_id, title, created)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    PersistedId::new_v4().to_string(),
                    catalog_ref.provider.tag(),
                    catalog_ref.external_id,
                    // Blank titles never take part in title matching
                    title.unwrap_or_default(),
                    Utc::now().timestamp_millis(),
                ],
            )
            .map_err(storage("insert item"))?;
        let row = conn
            .query_row(
                "SELECT id, provider, external_id, title FROM items
                 WHERE provider = ?1 AND external_id = ?2",
                params![catalog_ref.provider.tag(), catalog_ref.external_id],
                item_row,
            )
            .map_err(storage("select item"))?;
        let item = to_item(row)?;
        drop(conn);

        if inserted > 0 {
            tracing::debug!(%catalog_ref, id = %item.id, "item created");
            self.emit(StoreEvent::ItemCreated(item.clone()));
        }
        Ok(item)
    }

    async fn apply_vote(
        &self,
        list_id: ListId,
        item_id: PersistedId,
        action: Vote,
    ) -> Result<ListEntry, StoreError> {
        let conn = self.lock()?;
        Self::require_list(&conn, list_id)?;
        if !Self::is_member(&conn, list_id, item_id)? {
            return Err(StoreError::NotAMember);
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(storage("begin tx"))?;
        let current = Self::user_vote(&tx, list_id, item_id, &self.user)?;
        let next = transition(current, action).new_vote;
        let recorded = match next {
            Some(vote) => tx.execute(
                "INSERT OR REPLACE INTO votes (list_id, item_id, user_id, vote)
                 VALUES (?1, ?2, ?3, ?4)",
                params![list_id.to_string(), item_id.to_string(), self.user, vote.to_string()],
            ),
            None => tx.execute(
                "DELETE FROM votes WHERE list_id = ?1 AND item_id = ?2 AND user_id = ?3",
                params![list_id.to_string(), item_id.to_string(), self.user],
            ),
        };
        recorded.map_err(storage("record vote"))?;
        tx.commit().map_err(storage("commit"))?;

        let item = Self::load_item(&conn, item_id)?;
        let entry = Self::entry_for(&conn, list_id, &item, &self.user)?;
        drop(conn);

        tracing::debug!(%list_id, %item_id, user = %self.user, ?current, ?next, "vote recorded");
        self.emit(StoreEvent::VoteRecorded {
            list_id,
            item_id,
            user: self.user.clone(),
            vote: next,
        });
        Ok(entry)
    }

    async fn add_item(&self, list_id: ListId, item_id: PersistedId) -> Result<ListEntry, StoreError> {
        let conn = self.lock()?;
        Self::require_list(&conn, list_id)?;
        let item = Self::load_item(&conn, item_id)?;

        conn.execute(
            "INSERT INTO list_entries (list_id, item_id, added) VALUES (?1, ?2, ?3)",
            params![list_id.to_string(), item_id.to_string(), Utc::now().timestamp_millis()],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                return StoreError::AlreadyAMember;
            }
            StoreError::Storage(format!("add entry: {}", e))
        })?;
        let entry = Self::entry_for(&conn, list_id, &item, &self.user)?;
        drop(conn);

        tracing::debug!(%list_id, %item_id, "entry added");
        self.emit(StoreEvent::EntryAdded { list_id, item_id });
        Ok(entry)
    }

    async fn remove_item(&self, list_id: ListId, item_id: PersistedId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        Self::require_list(&conn, list_id)?;

        // Foreign key CASCADE clears the entry's votes
        let rows = conn
            .execute(
                "DELETE FROM list_entries WHERE list_id = ?1 AND item_id = ?2",
                params![list_id.to_string(), item_id.to_string()],
            )
            .map_err(storage("remove entry"))?;
        if rows == 0 {
            return Err(StoreError::NotAMember);
        }
        drop(conn);

        tracing::debug!(%list_id, %item_id, "entry removed");
        self.emit(StoreEvent::EntryRemoved { list_id, item_id });
        Ok(())
    }

    async fn fetch_list(&self, list_id: ListId) -> Result<WatchList, StoreError> {
        let conn = self.lock()?;
        let name: Option<String> = conn
            .query_row(
                "SELECT name FROM lists WHERE id = ?1",
                params![list_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage("load list"))?;
        let name = name.ok_or(StoreError::ListNotFound(list_id))?;

        let mut stmt = conn
            .prepare(
                "SELECT i.id, i.provider, i.external_id, i.title
                 FROM list_entries e JOIN items i ON i.id = e.item_id
                 WHERE e.list_id = ?1
                 ORDER BY e.added, e.rowid",
            )
            .map_err(storage("prepare entries"))?;
        let rows = stmt
            .query_map(params![list_id.to_string()], item_row)
            .map_err(storage("query entries"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(storage("read entries"))?;

        let mut list = WatchList::new(list_id, &name);
        for row in rows {
            let item = to_item(row)?;
            list.entries
                .push(Self::entry_for(&conn, list_id, &item, &self.user)?);
        }
        Ok(list)
    }
}

fn storage(context: &'static str) -> impl Fn(rusqlite::Error) -> StoreError {
    move |e| StoreError::Storage(format!("{}: {}", context, e))
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn item_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ItemRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn to_item((id, provider, external_id, title): ItemRow) -> Result<PersistedItem, StoreError> {
    let provider = CatalogProvider::from_tag(&provider)
        .ok_or_else(|| StoreError::Storage(format!("unknown provider in items table: {}", provider)))?;
    Ok(PersistedItem {
        id: PersistedId(parse_uuid(&id)?),
        title,
        external_ref: Some(CatalogRef::new(provider, external_id)),
    })
}

fn parse_uuid(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Storage(format!("bad id {:?}: {}", raw, e)))
}

fn to_count(n: i64) -> u32 {
    u32::try_from(n).unwrap_or(0)
}
