use rusqlite::{params, Connection};

use crate::error::StoreResult;
use crate::library::entities::EntryView;

/// Direct children of `parent` (`None` for the top level), sorted by display
/// text with untagged entries last.
pub fn children_of(conn: &Connection, parent: Option<i64>) -> StoreResult<Vec<EntryView>> {
    let mut st = conn.prepare_cached(
        "SELECT e.id, e.parent_id, t.value
         FROM hierarchy_entry e
         LEFT JOIN tag t ON t.id = e.tag_id
         WHERE e.parent_id IS ?1
         ORDER BY t.value IS NULL, t.value, e.id",
    )?;

    let rows = st.query_map(params![parent], |row| {
        Ok(EntryView {
            entry_id: row.get(0)?,
            parent_id: row.get(1)?,
            display_text: row.get(2)?,
        })
    })?;

    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
