pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod models;
pub mod pipeline;
pub mod planner;
pub mod postprocess;
pub mod retry;
pub mod routes;

#[cfg(test)]
mod testing;
