//! chapbook library
//!
//! Workflow discovery, pipeline config and user code generation, and
//! execution of CHAP pipelines for notebook users.

pub mod app;
pub mod cache;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod logs;
pub mod models;
pub mod pipeline;
pub mod storage;
pub mod utils;
