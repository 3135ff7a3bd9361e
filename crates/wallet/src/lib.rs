pub mod api;
pub mod catalog;
pub mod cli;
pub mod metrics;
pub mod realtime;
pub mod service;
