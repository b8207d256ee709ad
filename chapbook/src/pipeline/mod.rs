//! Pipeline generation and execution

pub mod catalog;
pub mod config;
pub mod executor;
pub mod process;
pub mod release;
pub mod usercode;
