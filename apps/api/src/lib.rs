//! ResumeX API: detail records, resume styling metadata, image storage and
//! the job-description scraping queue, plus the editor-side client logic.

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod db;
pub mod details;
pub mod errors;
pub mod extract;
pub mod metadata;
pub mod models;
pub mod queue;
pub mod routes;
pub mod scrape;
pub mod state;
pub mod storage;
