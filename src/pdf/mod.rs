pub mod optimizer;
pub mod page;
pub mod reader;
pub mod writer;
