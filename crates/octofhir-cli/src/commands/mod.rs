pub mod config;
pub mod db;
pub mod patch;
pub mod search;
