use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Write, BufRead, BufReader};
use std::path::{Path, PathBuf};
use anyhow::{Result, Context, anyhow};
use tracing::info;

use crate::ingest::orchestrator::ScanSettings;

pub const ROOT_KEY: &str = "LIBRARY_ROOT";
pub const DB_KEY: &str = "LIBRARY_DB";
pub const SAMPLE_DATA_KEY: &str = "SAMPLE_DATA";
pub const HIERARCHY_KEY: &str = "HIERARCHY";

const KNOWN_KEYS: [&str; 4] = [ROOT_KEY, DB_KEY, SAMPLE_DATA_KEY, HIERARCHY_KEY];

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub root: Option<PathBuf>,
    pub db_path: PathBuf,
    pub sample_data: bool,
    pub hierarchy: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root: None,
            db_path: PathBuf::from("library.db"),
            sample_data: false,
            hierarchy: vec!["artist".to_string(), "album".to_string()],
        }
    }
}

impl Settings {
    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            root: self.root.clone(),
            sample_data: self.sample_data,
        }
    }

    fn from_pairs(pairs: &BTreeMap<String, String>) -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(root) = pairs.get(ROOT_KEY).filter(|v| !v.is_empty()) {
            settings.root = Some(PathBuf::from(root));
        }
        if let Some(db) = pairs.get(DB_KEY).filter(|v| !v.is_empty()) {
            settings.db_path = PathBuf::from(db);
        }
        if let Some(flag) = pairs.get(SAMPLE_DATA_KEY) {
            settings.sample_data = parse_bool(flag)
                .ok_or_else(|| anyhow!("{} must be true or false, got '{}'", SAMPLE_DATA_KEY, flag))?;
        }
        if let Some(levels) = pairs.get(HIERARCHY_KEY) {
            settings.hierarchy = levels
                .split(',')
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
        }

        Ok(settings)
    }
}

/// Loads settings from a key=value file. A missing file means defaults.
pub fn load(path: &Path) -> Result<Settings> {
    if !path.exists() {
        info!("No settings file at {:?}, using defaults", path);
        return Ok(Settings::default());
    }

    let pairs = read_pairs(path)?;
    let settings = Settings::from_pairs(&pairs)
        .with_context(|| format!("Invalid settings in {:?}", path))?;
    info!("Loaded settings from {:?}", path);
    Ok(settings)
}

/// Sets one key in the settings file, keeping every other line's value.
pub fn set_value(path: &Path, key: &str, value: &str) -> Result<()> {
    let key = key.trim().to_uppercase();
    if !KNOWN_KEYS.contains(&key.as_str()) {
        return Err(anyhow!("Unknown setting '{}', expected one of {:?}", key, KNOWN_KEYS));
    }

    let mut pairs = if path.exists() { read_pairs(path)? } else { BTreeMap::new() };
    pairs.insert(key, value.trim().to_string());

    // reject values that would not load back
    Settings::from_pairs(&pairs)?;
    write_pairs(path, &pairs)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn read_pairs(path: &Path) -> Result<BTreeMap<String, String>> {
    let file = File::open(path).with_context(|| format!("Failed to open settings {:?}", path))?;
    let reader = BufReader::new(file);

    let mut pairs = BTreeMap::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            pairs.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    Ok(pairs)
}

fn write_pairs(path: &Path, pairs: &BTreeMap<String, String>) -> Result<()> {
    let mut file = File::create(path).context("Failed to create settings file")?;
    for (key, value) in pairs {
        writeln!(file, "{}={}", key, value)?;
    }
    Ok(())
}
