pub mod alerts;
pub mod api;
pub mod archiver;
pub mod config;
pub mod db;
pub mod export;
pub mod push;
