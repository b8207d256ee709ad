pub mod jupyter;
