pub mod monitor;
pub mod recorder;
pub mod scanner;
pub mod scheduler;

pub use monitor::{CycleReport, MonitorConfig, PendingTransactionMonitor};
pub use recorder::TransactionRecorder;
pub use scanner::{ExternalDepositScanner, ScanError, ScanReport};
pub use scheduler::{Job, JobScheduler, JobStatus, JobStatusBoard};
