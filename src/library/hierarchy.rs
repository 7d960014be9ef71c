use std::fmt;

use rusqlite::Connection;
use tracing::info;

use crate::database::repo;
use crate::error::{StoreError, StoreResult};
use crate::library::entities::{normalize_key, ContentType, HierarchyNode};

/// Name given to the terminal node; the leaf entry carries the track's
/// value for this key.
pub const LEAF_NAME: &str = "title";

/// In-memory snapshot of the configured node tree. Loaded once per scan and
/// never written while indexing.
#[derive(Debug, Clone, Default)]
pub struct HierarchySchema {
    nodes: Vec<HierarchyNode>,
}

impl HierarchySchema {
    pub fn load(conn: &Connection) -> StoreResult<Self> {
        Ok(Self {
            nodes: repo::nodes(conn)?,
        })
    }

    /// Children of `parent` in definition order; `None` gives the root level.
    pub fn children_of(&self, parent: Option<i64>) -> impl Iterator<Item = &HierarchyNode> {
        self.nodes.iter().filter(move |n| n.parent_id == parent)
    }

    pub fn node(&self, id: i64) -> StoreResult<&HierarchyNode> {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .ok_or(StoreError::UnknownNode(id))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    fn fmt_level(&self, f: &mut fmt::Formatter, parent: Option<i64>, depth: usize) -> fmt::Result {
        for node in self.children_of(parent) {
            let kind = match node.content_type {
                ContentType::Tag => "tag",
                ContentType::Track => "track",
            };
            writeln!(f, "{:indent$}{} ({})", "", node.name, kind, indent = depth * 2)?;
            self.fmt_level(f, Some(node.id), depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for HierarchySchema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.fmt_level(f, None, 0)
    }
}

/// Seeds a chain schema (`levels[0]` → `levels[1]` → ... → track leaf) if no
/// node exists yet. Returns whether anything was written.
pub fn provision(conn: &Connection, levels: &[String]) -> StoreResult<bool> {
    if repo::count(conn, "hierarchy_node")? > 0 {
        return Ok(false);
    }

    let mut parent = None;
    for level in levels {
        let name = normalize_key(level);
        if name.is_empty() {
            continue;
        }
        parent = Some(repo::insert_node(conn, parent, ContentType::Tag, &name)?);
    }
    repo::insert_node(conn, parent, ContentType::Track, LEAF_NAME)?;

    info!("provisioned hierarchy: {} > {}", levels.join(" > "), LEAF_NAME);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repo::Store;

    fn levels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_provision_builds_chain() {
        let store = Store::open_in_memory().unwrap();
        assert!(provision(store.connection(), &levels(&["Artist", "album"])).unwrap());

        let schema = HierarchySchema::load(store.connection()).unwrap();
        assert_eq!(schema.len(), 3);

        let root: Vec<_> = schema.children_of(None).collect();
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].name, "artist");
        assert_eq!(root[0].content_type, ContentType::Tag);

        let album: Vec<_> = schema.children_of(Some(root[0].id)).collect();
        assert_eq!(album[0].name, "album");

        let leaf: Vec<_> = schema.children_of(Some(album[0].id)).collect();
        assert_eq!(leaf[0].content_type, ContentType::Track);
        assert_eq!(leaf[0].name, LEAF_NAME);
    }

    #[test]
    fn test_provision_is_noop_when_schema_exists() {
        let store = Store::open_in_memory().unwrap();
        provision(store.connection(), &levels(&["artist"])).unwrap();
        assert!(!provision(store.connection(), &levels(&["genre", "artist"])).unwrap());
        assert_eq!(HierarchySchema::load(store.connection()).unwrap().len(), 2);
    }

    #[test]
    fn test_children_keep_definition_order() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.connection();
        let artist = repo::insert_node(conn, None, ContentType::Tag, "artist").unwrap();
        repo::insert_node(conn, Some(artist), ContentType::Tag, "album").unwrap();
        repo::insert_node(conn, Some(artist), ContentType::Tag, "year").unwrap();

        let schema = HierarchySchema::load(conn).unwrap();
        let names: Vec<_> = schema.children_of(Some(artist)).map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["album", "year"]);
        assert!(schema.node(999).is_err());
    }

    #[test]
    fn test_display_indents_levels() {
        let store = Store::open_in_memory().unwrap();
        provision(store.connection(), &levels(&["artist"])).unwrap();
        let schema = HierarchySchema::load(store.connection()).unwrap();
        assert_eq!(schema.to_string(), "artist (tag)\n  title (track)\n");
    }
}
