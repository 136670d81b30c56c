pub mod compound;
pub mod config;
pub mod error;
pub mod observability;
pub mod types;
