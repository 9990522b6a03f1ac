pub mod args;
pub mod engine;
pub mod errors;
pub mod mapping;
pub mod ofx;
pub mod reader;
pub mod transactions;
