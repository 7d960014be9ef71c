use std::path::Path;
use anyhow::{Result, Context};
use infer::MatcherType;

/// Sniffs the file header. `Some(false)` means the content was recognised as
/// something other than audio or video; `None` means the header matched
/// nothing known and the caller has to find out the hard way.
pub fn sniff_media(path: &Path) -> Result<Option<bool>> {
    let kind = infer::get_from_path(path)
        .context("Failed to read file for mimetype detection")?;

    Ok(kind.map(|k| matches!(k.matcher_type(), MatcherType::Audio | MatcherType::Video)))
}
