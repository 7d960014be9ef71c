use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info, trace};

use crate::database::schema::{SCHEMA, WIPE};
use crate::error::{StoreError, StoreResult};
use crate::library::entities::{
    normalize_key, ContentType, HierarchyEntry, HierarchyNode, Tag, TagMap, Track,
};

/// A row identified by a natural key. Implementors say how to look the key
/// up and how to insert it; [`find_or_create`] does the rest.
pub trait UniqueRow {
    const TABLE: &'static str;

    fn find(&self, conn: &Connection) -> StoreResult<Option<i64>>;
    fn insert(&self, conn: &Connection) -> StoreResult<i64>;
}

/// Returns the id of the row matching `row`'s unique key, inserting it first
/// if absent. Insert failures (constraint or foreign key violations) are
/// returned as-is.
pub fn find_or_create<R: UniqueRow>(conn: &Connection, row: &R) -> StoreResult<i64> {
    if let Some(id) = row.find(conn)? {
        return Ok(id);
    }

    let id = row.insert(conn)?;
    trace!(table = R::TABLE, id, "created row");
    Ok(id)
}

pub struct TagKey<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

impl UniqueRow for TagKey<'_> {
    const TABLE: &'static str = "tag";

    fn find(&self, conn: &Connection) -> StoreResult<Option<i64>> {
        let mut st = conn.prepare_cached("SELECT id FROM tag WHERE key = ?1 AND value = ?2")?;
        Ok(st
            .query_row(params![self.key, self.value], |row| row.get(0))
            .optional()?)
    }

    fn insert(&self, conn: &Connection) -> StoreResult<i64> {
        let mut st = conn.prepare_cached("INSERT INTO tag (key, value) VALUES (?1, ?2)")?;
        st.execute(params![self.key, self.value])?;
        Ok(conn.last_insert_rowid())
    }
}

pub struct TagLink {
    pub track_id: i64,
    pub tag_id: i64,
}

impl UniqueRow for TagLink {
    const TABLE: &'static str = "tag_in_track";

    fn find(&self, conn: &Connection) -> StoreResult<Option<i64>> {
        let mut st =
            conn.prepare_cached("SELECT id FROM tag_in_track WHERE track_id = ?1 AND tag_id = ?2")?;
        Ok(st
            .query_row(params![self.track_id, self.tag_id], |row| row.get(0))
            .optional()?)
    }

    fn insert(&self, conn: &Connection) -> StoreResult<i64> {
        let mut st =
            conn.prepare_cached("INSERT INTO tag_in_track (track_id, tag_id) VALUES (?1, ?2)")?;
        st.execute(params![self.track_id, self.tag_id])?;
        Ok(conn.last_insert_rowid())
    }
}

/// The (parent, node, tag, track) coordinates of a hierarchy entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryKey {
    pub parent_id: Option<i64>,
    pub node_id: i64,
    pub tag_id: Option<i64>,
    pub track_id: Option<i64>,
}

impl UniqueRow for EntryKey {
    const TABLE: &'static str = "hierarchy_entry";

    fn find(&self, conn: &Connection) -> StoreResult<Option<i64>> {
        // `IS` so that a NULL coordinate matches a NULL column
        let mut st = conn.prepare_cached(
            "SELECT id FROM hierarchy_entry
             WHERE parent_id IS ?1 AND node_id = ?2 AND tag_id IS ?3 AND track_id IS ?4",
        )?;
        Ok(st
            .query_row(
                params![self.parent_id, self.node_id, self.tag_id, self.track_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn insert(&self, conn: &Connection) -> StoreResult<i64> {
        let mut st = conn.prepare_cached(
            "INSERT INTO hierarchy_entry (parent_id, node_id, tag_id, track_id)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        st.execute(params![self.parent_id, self.node_id, self.tag_id, self.track_id])?;
        Ok(conn.last_insert_rowid())
    }
}

pub fn insert_track(conn: &Connection, uri: &str) -> StoreResult<Track> {
    conn.execute("INSERT INTO track (uri) VALUES (?1)", params![uri])?;
    let id = conn.last_insert_rowid();
    debug!(id, uri, "created track");
    Ok(Track {
        id,
        uri: uri.to_string(),
    })
}

/// Stores every (key, value) in `tags`, deduplicated globally, and links each
/// one to the track. Returns one representative tag per key: the first value
/// the extractor reported for it.
pub fn persist_tags(
    conn: &Connection,
    track_id: i64,
    tags: &TagMap,
) -> StoreResult<HashMap<String, Tag>> {
    let mut representatives = HashMap::new();

    for (raw_key, values) in tags {
        let key = normalize_key(raw_key);
        if key.is_empty() {
            continue;
        }

        for value in values.iter().filter(|v| !v.is_empty()) {
            let tag_id = find_or_create(conn, &TagKey { key: &key, value })?;
            find_or_create(conn, &TagLink { track_id, tag_id })?;

            representatives.entry(key.clone()).or_insert_with(|| Tag {
                id: tag_id,
                key: key.clone(),
                value: value.clone(),
            });
        }
    }

    Ok(representatives)
}

pub fn insert_node(
    conn: &Connection,
    parent_id: Option<i64>,
    content_type: ContentType,
    name: &str,
) -> StoreResult<i64> {
    conn.execute(
        "INSERT INTO hierarchy_node (parent_id, content_type, name) VALUES (?1, ?2, ?3)",
        params![parent_id, content_type as i64, name],
    )?;
    Ok(conn.last_insert_rowid())
}

fn node_from_row(row: &Row) -> rusqlite::Result<HierarchyNode> {
    let content_type: i64 = row.get(2)?;
    Ok(HierarchyNode {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        content_type: ContentType::from_i64(content_type)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(2, content_type))?,
        name: row.get(3)?,
    })
}

/// All node definitions, in insertion order.
pub fn nodes(conn: &Connection) -> StoreResult<Vec<HierarchyNode>> {
    let mut st =
        conn.prepare("SELECT id, parent_id, content_type, name FROM hierarchy_node ORDER BY id")?;
    let rows = st.query_map([], node_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn entries(conn: &Connection) -> StoreResult<Vec<HierarchyEntry>> {
    let mut st = conn.prepare(
        "SELECT id, parent_id, node_id, tag_id, track_id FROM hierarchy_entry ORDER BY id",
    )?;
    let rows = st.query_map([], |row| {
        Ok(HierarchyEntry {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            node_id: row.get(2)?,
            tag_id: row.get(3)?,
            track_id: row.get(4)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn count(conn: &Connection, table: &str) -> StoreResult<i64> {
    Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?)
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        info!("using '{}'", path.display());
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {:?}", path))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        conn.execute_batch(SCHEMA).context("Failed to initialize schema")?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Drops every track, tag and hierarchy entry. Node definitions survive.
    pub fn wipe(&mut self) -> StoreResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(WIPE)?;
        tx.commit()?;
        debug!("library wiped");
        Ok(())
    }

    /// Runs `unit` in one transaction: committed if it returns `Ok`, rolled
    /// back otherwise.
    pub fn run_in_transaction<T, E, F>(&mut self, unit: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&Transaction) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let tx = self.conn.transaction().map_err(StoreError::from)?;
        let value = unit(&tx)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }
}
