//! Day-by-day task board: ordered containers per day, category, and state,
//! with an optimistic engine in front of a SQLite store.

pub mod app;
pub mod cli;
pub mod clock;
pub mod completions;
pub mod config;
pub mod container;
pub mod db;
pub mod domain;
pub mod engine;
pub mod lifecycle;
pub mod logging;
pub mod order_key;
pub mod port;
pub mod store;
pub mod ui;
