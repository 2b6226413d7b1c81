pub mod block;
pub mod config;
pub mod error;
pub mod lines;
pub mod partition;
pub mod record;
pub mod sink;
