pub mod adapters;
pub mod chains;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod finality;
pub mod health;
pub mod ports;
pub mod services;
pub mod startup;
pub mod validation;

pub use error::AppError;
pub use services::{PendingTransactionMonitor, TransactionRecorder};
