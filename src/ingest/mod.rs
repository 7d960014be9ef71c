pub mod orchestrator;
pub mod walker;
pub mod worker;
