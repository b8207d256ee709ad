pub mod execution;
pub mod notebook;
pub mod pipeline;
pub mod workflow;
