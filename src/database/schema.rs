pub const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tag (
        id INTEGER PRIMARY KEY,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        UNIQUE(key, value)
    );

    CREATE TABLE IF NOT EXISTS track (
        id INTEGER PRIMARY KEY,
        uri TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS tag_in_track (
        id INTEGER PRIMARY KEY,
        track_id INTEGER NOT NULL,
        tag_id INTEGER NOT NULL,
        FOREIGN KEY(track_id) REFERENCES track(id) ON DELETE CASCADE,
        FOREIGN KEY(tag_id) REFERENCES tag(id) ON DELETE CASCADE,
        UNIQUE(track_id, tag_id)
    );

    CREATE TABLE IF NOT EXISTS hierarchy_node (
        id INTEGER PRIMARY KEY,
        parent_id INTEGER,
        content_type INTEGER NOT NULL,
        name TEXT NOT NULL,
        FOREIGN KEY(parent_id) REFERENCES hierarchy_node(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS hierarchy_entry (
        id INTEGER PRIMARY KEY,
        parent_id INTEGER,
        node_id INTEGER NOT NULL,
        tag_id INTEGER,
        track_id INTEGER,
        FOREIGN KEY(parent_id) REFERENCES hierarchy_entry(id) ON DELETE CASCADE,
        FOREIGN KEY(node_id) REFERENCES hierarchy_node(id) ON DELETE CASCADE,
        FOREIGN KEY(tag_id) REFERENCES tag(id) ON DELETE CASCADE,
        FOREIGN KEY(track_id) REFERENCES track(id) ON DELETE CASCADE
    );

    -- NULL never equals NULL in a plain UNIQUE constraint, so fold them to 0.
    CREATE UNIQUE INDEX IF NOT EXISTS hierarchy_entry_path ON hierarchy_entry (
        IFNULL(parent_id, 0),
        node_id,
        IFNULL(tag_id, 0),
        IFNULL(track_id, 0)
    );

    CREATE INDEX IF NOT EXISTS hierarchy_entry_parent ON hierarchy_entry (parent_id);
    CREATE INDEX IF NOT EXISTS hierarchy_node_parent ON hierarchy_node (parent_id);
";

pub const WIPE: &str = "
    DELETE FROM hierarchy_entry;
    DELETE FROM tag_in_track;
    DELETE FROM track;
    DELETE FROM tag;
";
