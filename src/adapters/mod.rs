pub mod memory;
pub mod postgres_transaction_repository;
pub mod postgres_wallet_directory;

pub use memory::{MemoryTransactionRepository, MemoryWalletDirectory};
pub use postgres_transaction_repository::PostgresTransactionRepository;
pub use postgres_wallet_directory::PostgresWalletDirectory;
