pub mod artifact;
pub mod config;
pub mod content;
pub mod error;
pub mod job;
pub mod tier;
pub mod trace;
