pub mod config;
pub mod crawler;
pub mod db;
pub mod indexer;
pub mod models;
pub mod morphology;
pub mod repository;
pub mod search;
pub mod statistics;
pub mod utils;
