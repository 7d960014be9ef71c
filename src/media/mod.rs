pub mod mimetype;
pub mod strategy;
