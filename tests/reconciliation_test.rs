use bigdecimal::BigDecimal;
use chrono::Duration;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;

use ledger_sentinel::adapters::{MemoryTransactionRepository, MemoryWalletDirectory};
use ledger_sentinel::chains::mock::{MockEvmChain, MockSolanaChain, MockXrplLedger};
use ledger_sentinel::domain::{
    is_synthetic, synthetic_reference, Network, NewTransaction, Proof, TxStatus, TxType,
};
use ledger_sentinel::finality::{
    FinalityCheckers, ReceiptDepthChecker, SignatureChecker, ValidatedLedgerChecker,
};
use ledger_sentinel::services::{
    ExternalDepositScanner, Job, MonitorConfig, PendingTransactionMonitor, TransactionRecorder,
};

const OWNER: &str = "user-42";
const OWNER_EVM_ADDRESS: &str = "0x9F2b6a3c1d4E5f60718293A4b5C6d7E8f9012345";

struct World {
    recorder: TransactionRecorder,
    evm: MockEvmChain,
    xrpl: MockXrplLedger,
    solana: MockSolanaChain,
    monitor: PendingTransactionMonitor,
    scanner: ExternalDepositScanner<MockEvmChain>,
}

async fn world() -> World {
    let recorder = TransactionRecorder::new(Arc::new(MemoryTransactionRepository::new()));
    let evm = MockEvmChain::new();
    let xrpl = MockXrplLedger::new();
    let solana = MockSolanaChain::new();

    let checkers = FinalityCheckers::new()
        .with(Arc::new(ReceiptDepthChecker::new(Arc::new(evm.clone()))))
        .with(Arc::new(ValidatedLedgerChecker::new(Arc::new(xrpl.clone()))))
        .with(Arc::new(SignatureChecker::new(Arc::new(solana.clone()))));
    let monitor =
        PendingTransactionMonitor::new(recorder.clone(), checkers, MonitorConfig::default());

    let wallets = MemoryWalletDirectory::new();
    wallets.track(OWNER, Network::Evm, OWNER_EVM_ADDRESS).await;
    let scanner = ExternalDepositScanner::new(
        Arc::new(evm.clone()),
        Arc::new(wallets),
        recorder.clone(),
        "ETH",
    );

    World {
        recorder,
        evm,
        xrpl,
        solana,
        monitor,
        scanner,
    }
}

fn submission(
    network: Network,
    reference: Option<String>,
    tx_type: TxType,
    proof: Proof,
) -> NewTransaction {
    NewTransaction {
        owner_id: OWNER.to_string(),
        counterparty_address: "destination".to_string(),
        amount: BigDecimal::from_str("10").unwrap(),
        token: "TEST".to_string(),
        network,
        reference,
        tx_type,
        proof,
    }
}

#[tokio::test]
async fn evm_transfer_confirms_after_three_blocks() {
    let w = world().await;
    let tx = w
        .recorder
        .record(submission(Network::Evm, Some("0xAAA".into()), TxType::Transfer, Proof::Pending))
        .await
        .unwrap();
    w.evm.insert_receipt("0xAAA", 100, true);

    w.evm.set_height(100);
    w.monitor.run_cycle().await.unwrap();
    assert_eq!(w.recorder.get(tx.id).await.unwrap().status, TxStatus::Pending);

    w.evm.set_height(101);
    w.monitor.run_cycle().await.unwrap();
    assert_eq!(w.recorder.get(tx.id).await.unwrap().status, TxStatus::Pending);

    w.evm.set_height(102);
    w.monitor.run_cycle().await.unwrap();
    assert_eq!(w.recorder.get(tx.id).await.unwrap().status, TxStatus::Confirmed);
}

#[tokio::test]
async fn reverted_evm_receipt_fails() {
    let w = world().await;
    let tx = w
        .recorder
        .record(submission(Network::Evm, Some("0xREV".into()), TxType::Minting, Proof::Pending))
        .await
        .unwrap();
    w.evm.set_height(200);
    w.evm.insert_receipt("0xREV", 150, false);

    let report = w.monitor.run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(w.recorder.get(tx.id).await.unwrap().status, TxStatus::Failed);
}

#[tokio::test]
async fn xrpl_payment_confirms_once_validated() {
    let w = world().await;
    let tx = w
        .recorder
        .record(submission(Network::Xrpl, Some("tx123".into()), TxType::Transfer, Proof::Pending))
        .await
        .unwrap();

    let mut seen = Vec::new();
    for cycle in 0..3 {
        if cycle == 2 {
            w.xrpl.set_transaction("tx123", true);
        }
        w.monitor.run_cycle().await.unwrap();
        seen.push(w.recorder.get(tx.id).await.unwrap().status);
    }

    assert_eq!(
        seen,
        vec![TxStatus::Pending, TxStatus::Pending, TxStatus::Confirmed]
    );
}

#[tokio::test]
async fn unvalidated_xrpl_payment_only_times_out() {
    let w = world().await;
    let tx = w
        .recorder
        .record(submission(Network::Xrpl, Some("tx-stuck".into()), TxType::Transfer, Proof::Pending))
        .await
        .unwrap();
    w.xrpl.set_transaction("tx-stuck", false);

    w.monitor.run_cycle().await.unwrap();
    assert_eq!(w.recorder.get(tx.id).await.unwrap().status, TxStatus::Pending);

    let report = w
        .monitor
        .run_cycle_at(tx.created_at + Duration::hours(25))
        .await
        .unwrap();
    assert_eq!(report.timed_out, 1);
    assert_eq!(w.recorder.get(tx.id).await.unwrap().status, TxStatus::Timeout);
}

#[tokio::test]
async fn solana_instruction_error_fails_directly() {
    let w = world().await;
    let tx = w
        .recorder
        .record(submission(Network::Solana, Some("sig1".into()), TxType::Transfer, Proof::Pending))
        .await
        .unwrap();
    w.solana
        .set_transaction("sig1", Some(json!({"InstructionError": [0, {"Custom": 1}]})));

    w.monitor.run_cycle().await.unwrap();
    assert_eq!(w.recorder.get(tx.id).await.unwrap().status, TxStatus::Failed);
}

#[tokio::test]
async fn faucet_funding_without_hash_ages_out() {
    let w = world().await;
    let reference = synthetic_reference(Network::Xrpl, "rAddr1234567890abcdef");
    assert!(is_synthetic(&reference));
    assert!(reference.starts_with("xrpl_FAUCET_rAddr12345_"));

    let tx = w
        .recorder
        .record(submission(Network::Xrpl, Some(reference.clone()), TxType::FaucetFunding, Proof::Pending))
        .await
        .unwrap();
    assert_eq!(tx.status, TxStatus::Pending);

    // Even a validated lookup must not settle a synthetic reference.
    w.xrpl.set_transaction(&reference, true);
    let report = w.monitor.run_cycle().await.unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(w.recorder.get(tx.id).await.unwrap().status, TxStatus::Pending);

    w.monitor
        .run_cycle_at(tx.created_at + Duration::hours(24) + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(w.recorder.get(tx.id).await.unwrap().status, TxStatus::Timeout);
}

#[tokio::test]
async fn external_deposit_is_recorded_once() {
    let w = world().await;
    w.evm.set_height(500);
    w.evm.insert_transfer(
        500,
        "0xDEP",
        "0xfaucet",
        &OWNER_EVM_ADDRESS.to_uppercase().replacen("0X", "0x", 1),
        2_500_000_000_000_000_000,
    );

    w.scanner.run().await.unwrap();
    w.evm.set_height(503);
    w.scanner.run().await.unwrap();

    let deposits = w
        .recorder
        .query(OWNER, &[TxType::ExternalFunding])
        .await
        .unwrap();
    assert_eq!(deposits.len(), 1);
    assert_eq!(deposits[0].status, TxStatus::Confirmed);
    assert_eq!(deposits[0].amount, BigDecimal::from_str("2.5").unwrap());
    assert_eq!(deposits[0].counterparty_address, OWNER_EVM_ADDRESS);

    // Confirmed on record, so the monitor has nothing to do with it.
    let report = w.monitor.run_cycle().await.unwrap();
    assert_eq!(report.examined, 0);
}

#[tokio::test]
async fn history_lists_every_path_newest_first() {
    let w = world().await;
    w.recorder
        .record(submission(Network::Evm, Some("0x01".into()), TxType::Funding, Proof::Confirmed))
        .await
        .unwrap();
    w.recorder
        .record(submission(Network::Solana, None, TxType::Transfer, Proof::Failed))
        .await
        .unwrap();
    w.evm.set_height(10);
    w.evm
        .insert_transfer(10, "0xDEP", "0xfaucet", OWNER_EVM_ADDRESS, 1_000_000_000_000_000);
    w.scanner.run_cycle().await.unwrap();

    let history = w.recorder.query(OWNER, &[]).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history
        .windows(2)
        .all(|pair| pair[0].created_at >= pair[1].created_at));

    let funding = w
        .recorder
        .query(OWNER, &[TxType::Funding, TxType::FaucetFunding])
        .await
        .unwrap();
    assert_eq!(funding.len(), 1);
}

#[tokio::test]
async fn concurrent_recording_and_monitoring_do_not_duplicate() {
    let w = world().await;
    w.solana.set_transaction("sig-race", None);

    let recorder = w.recorder.clone();
    let submit = tokio::spawn(async move {
        for _ in 0..5 {
            recorder
                .record(submission(
                    Network::Solana,
                    Some("sig-race".into()),
                    TxType::Transfer,
                    Proof::Pending,
                ))
                .await
                .unwrap();
            tokio::task::yield_now().await;
        }
    });

    for _ in 0..3 {
        w.monitor.run_cycle().await.unwrap();
        tokio::task::yield_now().await;
    }
    submit.await.unwrap();
    w.monitor.run_cycle().await.unwrap();

    let records = w.recorder.query(OWNER, &[]).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, TxStatus::Confirmed);
}

#[tokio::test]
async fn unreachable_xrpl_node_does_not_stall_other_networks() {
    let w = world().await;
    let xrpl = w
        .recorder
        .record(submission(Network::Xrpl, Some("tx-down".into()), TxType::Transfer, Proof::Pending))
        .await
        .unwrap();
    let sol = w
        .recorder
        .record(submission(Network::Solana, Some("sig-up".into()), TxType::Transfer, Proof::Pending))
        .await
        .unwrap();
    w.xrpl.fail("tx-down");
    w.solana.set_transaction("sig-up", None);

    let report = w.monitor.run_cycle().await.unwrap();
    assert_eq!(report.errors, 1);
    assert_eq!(report.confirmed, 1);
    assert_eq!(w.recorder.get(xrpl.id).await.unwrap().status, TxStatus::Pending);
    assert_eq!(w.recorder.get(sol.id).await.unwrap().status, TxStatus::Confirmed);
}

#[tokio::test]
async fn failing_solana_lookup_is_retried_next_cycle() {
    let w = world().await;
    let tx = w
        .recorder
        .record(submission(Network::Solana, Some("sig-flaky".into()), TxType::Transfer, Proof::Pending))
        .await
        .unwrap();
    w.solana.fail("sig-flaky");

    let report = w.monitor.run_cycle().await.unwrap();
    assert_eq!(report.errors, 1);
    assert_eq!(w.recorder.get(tx.id).await.unwrap().status, TxStatus::Pending);
}
