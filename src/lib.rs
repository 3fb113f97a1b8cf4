// Library exports for Qwitter
// This allows integration tests and external code to use Qwitter modules

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod social;
pub mod state;
