//! Finality checking, one strategy per finality model.
//!
//! - [`ReceiptDepthChecker`]: receipt plus N confirming blocks (EVM)
//! - [`ValidatedLedgerChecker`]: `validated` flag on the transaction (XRPL)
//! - [`SignatureChecker`]: execution metadata looked up by signature (Solana)

pub mod checker;
pub mod receipt;
pub mod signature;
pub mod validated;

pub use checker::{FinalityChecker, FinalityCheckers, FinalityError, FinalityResult, Verdict};
pub use receipt::{confirmation_depth, ReceiptDepthChecker, DEFAULT_REQUIRED_CONFIRMATIONS};
pub use signature::SignatureChecker;
pub use validated::ValidatedLedgerChecker;
