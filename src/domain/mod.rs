pub mod reference;
pub mod transaction;

pub use reference::{is_synthetic, synthetic_reference};
pub use transaction::{
    FinalityModel, LedgerTransaction, Network, NewTransaction, ParseEnumError, Proof,
    TransactionDraft, TxStatus, TxType,
};
