pub mod backend;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod history;
pub mod hooks;
pub mod http;
pub mod metrics;
pub mod registry;
pub mod status_map;
pub mod task_pool;
