#![forbid(unsafe_code)]

//! Game Study Academy: video ingestion, article generation, image uploads and
//! the JSON surface that serves them.

pub mod admin;
pub mod api;
pub mod article;
pub mod blocking;
pub mod config;
pub mod error;
pub mod games;
pub mod generator;
pub mod ingest;
pub mod media;
pub mod storage;
pub mod store;
pub mod telemetry;
pub mod youtube;

#[cfg(test)]
mod testing;
