pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod observability;
pub mod store;
pub mod types;
