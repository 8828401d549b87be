pub mod api;
pub mod config;
pub mod db;
pub mod generator;
pub mod ingest;
pub mod query;
pub mod readings;
pub mod simulation;
pub mod timezone;
