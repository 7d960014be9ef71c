//! Music library indexing: walks a folder tree, reads each file's tags and
//! files the track under a configurable tag hierarchy stored in SQLite.

pub mod database;
pub mod error;
pub mod ingest;
pub mod library;
pub mod media;
pub mod utils;
