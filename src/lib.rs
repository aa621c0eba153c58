pub mod api;
pub mod clients;
pub mod config;
pub mod daemon;
pub mod filters;
pub mod icon_cache;
pub mod models;
pub mod pidfile;
pub mod processors;
pub mod queue;
pub mod router;
pub mod rules;
pub mod utils;
