pub mod cluster;
pub mod config;
pub mod controllers;
pub mod models;
pub mod storage;

pub use storage::Storage;
