//! Materializes a track's path through the hierarchy.
//!
//! The descent follows the schema, not the data: every schema node reachable
//! from the roots produces exactly one entry for the track, keyed by the
//! entry created one level up. Entries are found before they are created, so
//! tracks that share a prefix share its entries and re-indexing a track adds
//! nothing.

use std::collections::HashMap;

use rusqlite::Connection;
use tracing::trace;

use crate::database::repo::{find_or_create, EntryKey};
use crate::error::StoreResult;
use crate::library::entities::{ContentType, HierarchyNode, Tag, Track};
use crate::library::hierarchy::HierarchySchema;

pub struct LibraryIndexer<'a> {
    schema: &'a HierarchySchema,
}

impl<'a> LibraryIndexer<'a> {
    pub fn new(schema: &'a HierarchySchema) -> Self {
        Self { schema }
    }

    /// Finds or creates every entry on the track's path(s) and returns the
    /// leaf entry ids, one per `Track` node in the schema.
    ///
    /// `tags_by_key` holds at most one tag per key. A key the track lacks
    /// yields an entry with no tag at that level.
    ///
    /// Not transactional by itself; callers run it inside the same
    /// transaction that persisted the track so a failure leaves nothing behind.
    pub fn index(
        &self,
        conn: &Connection,
        track: &Track,
        tags_by_key: &HashMap<String, Tag>,
    ) -> StoreResult<Vec<i64>> {
        let mut leaves = Vec::new();

        for root in self.schema.children_of(None) {
            self.descend(conn, root, None, track, tags_by_key, &mut leaves)?;
        }

        trace!(track_id = track.id, leaves = leaves.len(), "indexed");
        Ok(leaves)
    }

    fn descend(
        &self,
        conn: &Connection,
        node: &HierarchyNode,
        parent_entry: Option<i64>,
        track: &Track,
        tags_by_key: &HashMap<String, Tag>,
        leaves: &mut Vec<i64>,
    ) -> StoreResult<()> {
        let tag_id = tags_by_key.get(&node.name).map(|t| t.id);

        match node.content_type {
            ContentType::Track => {
                let entry = find_or_create(
                    conn,
                    &EntryKey {
                        parent_id: parent_entry,
                        node_id: node.id,
                        tag_id,
                        track_id: Some(track.id),
                    },
                )?;
                leaves.push(entry);
            }
            ContentType::Tag => {
                let entry = find_or_create(
                    conn,
                    &EntryKey {
                        parent_id: parent_entry,
                        node_id: node.id,
                        tag_id,
                        track_id: None,
                    },
                )?;

                for child in self.schema.children_of(Some(node.id)) {
                    self.descend(conn, child, Some(entry), track, tags_by_key, leaves)?;
                }
            }
        }

        Ok(())
    }
}
