pub mod autosave;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod output;
pub mod redundant;
pub mod remote;
pub mod service;
pub mod slots;
pub mod store;
pub mod sync;
pub mod views;
