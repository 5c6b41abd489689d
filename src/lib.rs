pub mod auth;
pub mod config;
pub mod db;
pub mod documents;
pub mod drive;
pub mod employee_csv;
pub mod error;
pub mod jobs;
pub mod lifecycle;
pub mod models;
pub mod pagination;
pub mod reporting;
pub mod routes;
pub mod schema;
pub mod state;
pub mod utils;
pub mod workers;

pub use workers::{default_handlers, Worker};
