use std::collections::BTreeMap;

use serde::Serialize;

/// Raw extraction output: normalized tag key to every value found under it,
/// in the order the container listed them.
pub type TagMap = BTreeMap<String, Vec<String>>;

/// Lower-cases and trims a tag key so `ARTIST`, `Artist ` and `artist` collide.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ContentType {
    Tag = 0,
    Track = 1,
}

impl ContentType {
    pub fn from_i64(v: i64) -> Option<ContentType> {
        match v {
            0 => Some(ContentType::Tag),
            1 => Some(ContentType::Track),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: i64,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Track {
    pub id: i64,
    pub uri: String,
}

/// One level of the configured hierarchy. `name` is the tag key an interior
/// node filters on; for a `Track` node it names the tag shown on the leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyNode {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub content_type: ContentType,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyEntry {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub node_id: i64,
    pub tag_id: Option<i64>,
    pub track_id: Option<i64>,
}

/// Flattened row handed to whatever renders the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryView {
    pub entry_id: i64,
    pub parent_id: Option<i64>,
    pub display_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key(" ARTIST "), "artist");
        assert_eq!(normalize_key("AlbumArtist"), "albumartist");
    }

    #[test]
    fn test_content_type_from_i64() {
        assert_eq!(ContentType::from_i64(0), Some(ContentType::Tag));
        assert_eq!(ContentType::from_i64(1), Some(ContentType::Track));
        assert_eq!(ContentType::from_i64(7), None);
    }
}
