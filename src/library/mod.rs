pub mod browse;
pub mod entities;
pub mod hierarchy;
pub mod indexer;
