pub mod orchestrator;
pub mod page_processor;
