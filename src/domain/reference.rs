//! Synthetic references for submissions that return no on-chain proof.
//!
//! Some funding paths (third-party faucets in particular) accept a request
//! without echoing back a transaction identifier. Those records still need a
//! unique, non-null reference so they can be de-duplicated and aged out, but
//! they must never be confused with a real hash or sent to a finality checker.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

use super::transaction::Network;

pub const SYNTHETIC_TAG: &str = "FAUCET";
pub const ADDRESS_PREFIX_LEN: usize = 10;

static LAST_TIMESTAMP_MS: AtomicI64 = AtomicI64::new(0);

/// Milliseconds since the epoch, strictly increasing across calls in this process.
fn next_timestamp_ms() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_TIMESTAMP_MS.load(Ordering::Relaxed);
    loop {
        let next = if now > last { now } else { last + 1 };
        match LAST_TIMESTAMP_MS.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}

/// `{network}_FAUCET_{destination prefix}_{timestamp_ms}`
pub fn synthetic_reference(network: Network, destination: &str) -> String {
    let prefix: String = destination.chars().take(ADDRESS_PREFIX_LEN).collect();
    format!(
        "{}_{}_{}_{}",
        network.as_str(),
        SYNTHETIC_TAG,
        prefix,
        next_timestamp_ms()
    )
}

pub fn is_synthetic(reference: &str) -> bool {
    let Some((network, rest)) = reference.split_once('_') else {
        return false;
    };
    if network.parse::<Network>().is_err() {
        return false;
    }
    let Some(rest) = rest.strip_prefix(SYNTHETIC_TAG) else {
        return false;
    };
    let Some(rest) = rest.strip_prefix('_') else {
        return false;
    };
    match rest.rsplit_once('_') {
        Some((_, ts)) => !ts.is_empty() && ts.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}
