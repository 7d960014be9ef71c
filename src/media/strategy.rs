//! Tag extraction strategies and the per-scan factory that hands them out.
//!
//! A strategy is chosen by file extension (exact, case-sensitive match) and
//! built lazily the first time its family is needed. The factory owns every
//! strategy it built until [`StrategyFactory::release`] is called at the end
//! of a scan.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use lofty::config::{ParseOptions, ParsingMode};
use lofty::error::{ErrorKind, LoftyError};
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag, TagType};
use tracing::{debug, warn};

use crate::error::ScannerError;
use crate::library::entities::{normalize_key, TagMap};
use crate::media::mimetype;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StrategyFamily {
    /// Xiph-style containers carrying Vorbis comments.
    Vorbis,
    /// ISO base media files carrying an `ilst` atom.
    Mp4,
    Generic,
}

impl StrategyFamily {
    pub fn for_path(path: &Path) -> StrategyFamily {
        match path.extension().and_then(|e| e.to_str()) {
            Some("ogg") | Some("flac") | Some("mkv") => StrategyFamily::Vorbis,
            Some("mp4") | Some("m4a") => StrategyFamily::Mp4,
            _ => StrategyFamily::Generic,
        }
    }
}

pub trait TagStrategy: Send {
    /// Reads every text tag in the file. An empty map is a valid result.
    fn extract(&mut self, path: &Path) -> Result<TagMap, ScannerError>;

    /// Frees whatever the strategy holds. Called exactly once, by the factory.
    fn release(&mut self);
}

pub type StrategyBuilder = Arc<dyn Fn(StrategyFamily) -> Box<dyn TagStrategy> + Send + Sync>;

pub fn lofty_builder() -> StrategyBuilder {
    Arc::new(|family: StrategyFamily| Box::new(LoftyStrategy::new(family)) as Box<dyn TagStrategy>)
}

pub struct StrategyFactory {
    build: StrategyBuilder,
    strategies: HashMap<StrategyFamily, Box<dyn TagStrategy>>,
}

impl StrategyFactory {
    pub fn new(build: StrategyBuilder) -> Self {
        Self {
            build,
            strategies: HashMap::new(),
        }
    }

    pub fn select(&mut self, path: &Path) -> &mut dyn TagStrategy {
        let family = StrategyFamily::for_path(path);
        let build = &self.build;

        self.strategies
            .entry(family)
            .or_insert_with(|| {
                debug!(?family, "building tag strategy");
                build(family)
            })
            .as_mut()
    }

    /// Number of strategies currently held.
    pub fn live(&self) -> usize {
        self.strategies.len()
    }

    pub fn release(&mut self) {
        for (family, mut strategy) in self.strategies.drain() {
            debug!(?family, "releasing tag strategy");
            strategy.release();
        }
    }
}

impl Drop for StrategyFactory {
    fn drop(&mut self) {
        if !self.strategies.is_empty() {
            warn!("tag strategies dropped without release, releasing now");
            self.release();
        }
    }
}

/// Strategy backed by `lofty`. Families differ in which tag block they read
/// first and in whether the header is sniffed before parsing.
pub struct LoftyStrategy {
    family: StrategyFamily,
    options: ParseOptions,
    preferred: Option<TagType>,
}

impl LoftyStrategy {
    pub fn new(family: StrategyFamily) -> Self {
        let preferred = match family {
            StrategyFamily::Vorbis => Some(TagType::VorbisComments),
            StrategyFamily::Mp4 => Some(TagType::Mp4Ilst),
            StrategyFamily::Generic => None,
        };

        Self {
            family,
            options: ParseOptions::new()
                .read_properties(false)
                .parsing_mode(ParsingMode::BestAttempt),
            preferred,
        }
    }

    fn classify(path: &Path, err: LoftyError) -> ScannerError {
        match err.kind() {
            ErrorKind::UnknownFormat => ScannerError::NotAudio(path.to_path_buf()),
            ErrorKind::Io(e) => ScannerError::Unreadable(path.to_path_buf(), e.to_string()),
            _ => ScannerError::Corrupt(path.to_path_buf(), err.to_string()),
        }
    }
}

impl TagStrategy for LoftyStrategy {
    fn extract(&mut self, path: &Path) -> Result<TagMap, ScannerError> {
        if self.family == StrategyFamily::Generic {
            match mimetype::sniff_media(path) {
                Ok(Some(false)) => return Err(ScannerError::NotAudio(path.to_path_buf())),
                Ok(_) => {}
                Err(e) => return Err(ScannerError::Unreadable(path.to_path_buf(), e.to_string())),
            }
        }

        let probe = Probe::open(path)
            .map_err(|e| Self::classify(path, e))?
            .options(self.options)
            .guess_file_type()
            .map_err(|e| ScannerError::Unreadable(path.to_path_buf(), e.to_string()))?;

        if probe.file_type().is_none() {
            return Err(ScannerError::NotAudio(path.to_path_buf()));
        }

        let tagged = probe.read().map_err(|e| Self::classify(path, e))?;

        let tag = self
            .preferred
            .and_then(|t| tagged.tag(t))
            .or_else(|| tagged.primary_tag())
            .or_else(|| tagged.first_tag());

        Ok(tag.map(tag_map).unwrap_or_default())
    }

    fn release(&mut self) {
        debug!(family = ?self.family, "lofty strategy released");
    }
}

fn tag_map(tag: &Tag) -> TagMap {
    let mut map = TagMap::new();

    for item in tag.items() {
        let (Some(key), Some(value)) = (key_name(item.key()), item.value().text()) else {
            continue;
        };
        let value = value.trim();
        if !value.is_empty() {
            map.entry(key).or_default().push(value.to_string());
        }
    }

    map
}

fn key_name(key: &ItemKey) -> Option<String> {
    let name = match key {
        ItemKey::TrackArtist => "artist",
        ItemKey::AlbumArtist => "albumartist",
        ItemKey::AlbumTitle => "album",
        ItemKey::TrackTitle => "title",
        ItemKey::Genre => "genre",
        ItemKey::Composer => "composer",
        ItemKey::Year | ItemKey::RecordingDate => "date",
        ItemKey::TrackNumber => "tracknumber",
        ItemKey::DiscNumber => "discnumber",
        ItemKey::Unknown(raw) => return Some(normalize_key(raw)),
        _ => return None,
    };
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingStrategy {
        released: Arc<AtomicUsize>,
    }

    impl TagStrategy for CountingStrategy {
        fn extract(&mut self, _path: &Path) -> Result<TagMap, ScannerError> {
            Ok(TagMap::new())
        }

        fn release(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_builder(built: Arc<AtomicUsize>, released: Arc<AtomicUsize>) -> StrategyBuilder {
        Arc::new(move |_: StrategyFamily| {
            built.fetch_add(1, Ordering::SeqCst);
            Box::new(CountingStrategy {
                released: released.clone(),
            }) as Box<dyn TagStrategy>
        })
    }

    #[test]
    fn test_family_by_extension() {
        assert_eq!(StrategyFamily::for_path(Path::new("a.ogg")), StrategyFamily::Vorbis);
        assert_eq!(StrategyFamily::for_path(Path::new("a.flac")), StrategyFamily::Vorbis);
        assert_eq!(StrategyFamily::for_path(Path::new("a.mkv")), StrategyFamily::Vorbis);
        assert_eq!(StrategyFamily::for_path(Path::new("a.m4a")), StrategyFamily::Mp4);
        assert_eq!(StrategyFamily::for_path(Path::new("a.mp4")), StrategyFamily::Mp4);
        assert_eq!(StrategyFamily::for_path(Path::new("a.mp3")), StrategyFamily::Generic);
        assert_eq!(StrategyFamily::for_path(Path::new("a.FLAC")), StrategyFamily::Generic);
        assert_eq!(StrategyFamily::for_path(Path::new("noext")), StrategyFamily::Generic);
    }

    #[test]
    fn test_factory_memoizes_per_family_and_releases_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let mut factory = StrategyFactory::new(counting_builder(built.clone(), released.clone()));

        for name in ["a.flac", "b.ogg", "c.m4a", "d.flac", "e.mp3"] {
            factory.select(Path::new(name)).extract(Path::new(name)).unwrap();
        }
        assert_eq!(built.load(Ordering::SeqCst), 3);
        assert_eq!(factory.live(), 3);

        factory.release();
        assert_eq!(released.load(Ordering::SeqCst), 3);
        assert_eq!(factory.live(), 0);

        drop(factory);
        assert_eq!(released.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_drop_releases_unreleased_strategies() {
        let built = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        {
            let mut factory = StrategyFactory::new(counting_builder(built, released.clone()));
            factory.select(Path::new("a.flac"));
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lofty_rejects_non_audio() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"just some text").unwrap();

        let mut strategy = LoftyStrategy::new(StrategyFamily::Generic);
        assert!(matches!(strategy.extract(&path), Err(ScannerError::NotAudio(_))));
    }

    #[test]
    fn test_lofty_reports_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut strategy = LoftyStrategy::new(StrategyFamily::Vorbis);
        assert!(strategy.extract(&dir.path().join("gone.flac")).is_err());
    }

    /// A metadata-only FLAC stream: STREAMINFO followed by one Vorbis comment block.
    fn flac_with_comments(comments: &[&str]) -> Vec<u8> {
        let vendor = b"tagtree";
        let mut block = Vec::new();
        block.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
        block.extend_from_slice(vendor);
        block.extend_from_slice(&(comments.len() as u32).to_le_bytes());
        for comment in comments {
            block.extend_from_slice(&(comment.len() as u32).to_le_bytes());
            block.extend_from_slice(comment.as_bytes());
        }

        let mut data = b"fLaC".to_vec();
        data.extend_from_slice(&[0x00, 0x00, 0x00, 34]);
        data.extend_from_slice(&[0; 34]);
        data.push(0x84);
        data.extend_from_slice(&(block.len() as u32).to_be_bytes()[1..]);
        data.extend_from_slice(&block);
        data
    }

    fn expected(pairs: &[(&str, &[&str])]) -> TagMap {
        pairs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_lofty_reads_vorbis_comments() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("song.flac");
        fs::write(
            &path,
            flac_with_comments(&[
                "ARTIST=First Artist",
                "ARTIST=Second Artist",
                "ALBUM=  Padded Album  ",
                "TITLE=   ",
                "TITLE=Song",
                "LIBRARYNOTE=kept",
            ]),
        )
        .unwrap();

        let mut strategy = LoftyStrategy::new(StrategyFamily::for_path(&path));
        let tags = strategy.extract(&path).unwrap();

        assert_eq!(
            tags,
            expected(&[
                ("album", &["Padded Album"][..]),
                ("artist", &["First Artist", "Second Artist"][..]),
                ("librarynote", &["kept"][..]),
                ("title", &["Song"][..]),
            ])
        );
    }

    #[test]
    fn test_generic_family_falls_back_to_primary_tag() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("song.audio");
        fs::write(&path, flac_with_comments(&["ARTIST=X", "TITLE=T"])).unwrap();

        assert_eq!(StrategyFamily::for_path(&path), StrategyFamily::Generic);
        let mut strategy = LoftyStrategy::new(StrategyFamily::Generic);
        let tags = strategy.extract(&path).unwrap();

        assert_eq!(tags, expected(&[("artist", &["X"][..]), ("title", &["T"][..])]));
    }

    #[test]
    fn test_flac_without_comments_gives_empty_map() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bare.flac");
        let mut data = b"fLaC".to_vec();
        data.extend_from_slice(&[0x80, 0x00, 0x00, 34]);
        data.extend_from_slice(&[0; 34]);
        fs::write(&path, data).unwrap();

        let mut strategy = LoftyStrategy::new(StrategyFamily::Vorbis);
        assert_eq!(strategy.extract(&path).unwrap(), TagMap::new());
    }

    #[test]
    fn test_matroska_is_not_audio() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mkv");
        let mut data = vec![0x1A, 0x45, 0xDF, 0xA3];
        data.extend_from_slice(&[0; 60]);
        fs::write(&path, data).unwrap();

        assert_eq!(StrategyFamily::for_path(&path), StrategyFamily::Vorbis);
        let mut strategy = LoftyStrategy::new(StrategyFamily::Vorbis);
        assert!(matches!(strategy.extract(&path), Err(ScannerError::NotAudio(_))));
    }

    #[test]
    fn test_key_names() {
        assert_eq!(key_name(&ItemKey::TrackArtist).as_deref(), Some("artist"));
        assert_eq!(key_name(&ItemKey::RecordingDate).as_deref(), Some("date"));
        assert_eq!(key_name(&ItemKey::Unknown("MOOD".to_string())).as_deref(), Some("mood"));
    }
}
