pub mod aggregate;
pub mod app;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod output;
pub mod persist;
pub mod progress;
pub mod prompt;
pub mod sort;
