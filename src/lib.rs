// Library exports for Aurora
// This allows integration tests and external code to use Aurora modules

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod posts;
pub mod routes;
pub mod state;
pub mod storage;
