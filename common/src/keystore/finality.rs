use crate::{
    keystore::{
        sequencer_client::SequencerClient,
        types::{TransactionReceipt, TransactionStatus},
    },
    l1::execution_layer::ExecutionLayer as L1ExecutionLayer,
};
use alloy::primitives::B256;
use anyhow::Error;
use std::{future::Future, time::Duration};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Receipt source. Both the keystore node and the sequencer serve receipts.
pub trait ReceiptReader {
    fn get_transaction_receipt(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = Result<Option<TransactionReceipt>, Error>> + Send;
}

/// Source-chain side of a withdrawal. Returns the L1 transaction hash of
/// the finalization call.
pub trait WithdrawalFinalizer {
    fn finalize_withdrawal(
        &self,
        tx_hash: B256,
    ) -> impl Future<Output = Result<B256, Error>> + Send;
}

/// Finalizes through the bridge contract, with the sequencer supplying the
/// inclusion proof arguments.
pub struct BridgeFinalizer<'a> {
    pub sequencer: &'a SequencerClient,
    pub l1: &'a L1ExecutionLayer,
}

impl WithdrawalFinalizer for BridgeFinalizer<'_> {
    async fn finalize_withdrawal(&self, tx_hash: B256) -> Result<B256, Error> {
        let args = self.sequencer.build_finalize_withdrawal_args(tx_hash).await?;
        self.l1.finalize_withdrawal(&args).await
    }
}

/// What one receipt observation means for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackEvent {
    /// Receipt not yet visible, transient.
    NotVisible,
    /// First status observed for this transaction, the tracking baseline.
    FirstStatus(TransactionStatus),
    /// Status advanced past the previously observed one.
    StatusChanged(TransactionStatus),
    Unchanged,
}

/// Terminal result of tracking. Exhaustion and cancellation are outcomes
/// rather than errors so callers can re-run tracking later.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackOutcome {
    Finalized(TransactionStatus),
    TimedOut,
    Cancelled,
}

/// Receipt-polling state machine. Statuses form an ordered finality ladder,
/// so an observation below the last one is ignored rather than reported as
/// a change.
pub struct FinalityTracker {
    target: TransactionStatus,
    max_polls: u64,
    polls: u64,
    last_status: Option<TransactionStatus>,
}

impl FinalityTracker {
    /// `max_polls` of zero means unbounded polling.
    pub fn new(target: TransactionStatus, max_polls: u64) -> Self {
        Self {
            target,
            max_polls,
            polls: 0,
            last_status: None,
        }
    }

    pub fn on_observation(
        &mut self,
        receipt: Option<&TransactionReceipt>,
    ) -> (TrackEvent, Option<TrackOutcome>) {
        self.polls += 1;
        let event = match receipt {
            None => TrackEvent::NotVisible,
            Some(receipt) => match self.last_status {
                None => {
                    self.last_status = Some(receipt.status);
                    TrackEvent::FirstStatus(receipt.status)
                }
                Some(last) if receipt.status > last => {
                    self.last_status = Some(receipt.status);
                    TrackEvent::StatusChanged(receipt.status)
                }
                Some(_) => TrackEvent::Unchanged,
            },
        };

        let outcome = match self.last_status {
            Some(status) if status >= self.target => Some(TrackOutcome::Finalized(status)),
            _ if self.max_polls != 0 && self.polls >= self.max_polls => {
                Some(TrackOutcome::TimedOut)
            }
            _ => None,
        };
        (event, outcome)
    }
}

/// Polls the transaction receipt until the target status, the poll budget,
/// or cancellation. Fetch failures count as the receipt not being visible
/// yet.
pub async fn track_transaction<R: ReceiptReader>(
    reader: &R,
    tx_hash: B256,
    target: TransactionStatus,
    poll_interval: Duration,
    max_polls: u64,
    cancellation: &CancellationToken,
) -> Result<TrackOutcome, Error> {
    info!("Tracking transaction {tx_hash} until {target}");
    let mut tracker = FinalityTracker::new(target, max_polls);
    loop {
        let receipt = match reader.get_transaction_receipt(tx_hash).await {
            Ok(receipt) => receipt,
            Err(e) => {
                debug!("Receipt fetch for {tx_hash} failed: {e}");
                None
            }
        };

        let (event, outcome) = tracker.on_observation(receipt.as_ref());
        match event {
            TrackEvent::FirstStatus(status) | TrackEvent::StatusChanged(status) => {
                info!("Transaction status: {status}");
            }
            TrackEvent::NotVisible => debug!("Transaction not yet included in a block"),
            TrackEvent::Unchanged => {}
        }
        if let Some(outcome) = outcome {
            return Ok(outcome);
        }

        tokio::select! {
            _ = sleep(poll_interval) => {}
            _ = cancellation.cancelled() => {
                return Ok(TrackOutcome::Cancelled);
            }
        }
    }
}

/// Tracks a withdrawal to the target status, then finalizes it on the
/// source chain. Timeout and cancellation skip finalization, the caller
/// can re-run once the withdrawal settles.
pub async fn track_withdrawal<R: ReceiptReader, F: WithdrawalFinalizer>(
    reader: &R,
    finalizer: &F,
    tx_hash: B256,
    target: TransactionStatus,
    poll_interval: Duration,
    max_polls: u64,
    cancellation: &CancellationToken,
) -> Result<TrackOutcome, Error> {
    let outcome = track_transaction(
        reader,
        tx_hash,
        target,
        poll_interval,
        max_polls,
        cancellation,
    )
    .await?;
    if !matches!(outcome, TrackOutcome::Finalized(_)) {
        return Ok(outcome);
    }

    let l1_tx_hash = finalizer.finalize_withdrawal(tx_hash).await?;
    info!("Withdrawal finalized on L1: {l1_tx_hash}");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U64;
    use anyhow::anyhow;
    use std::{collections::VecDeque, sync::Mutex};

    fn receipt(status: TransactionStatus) -> TransactionReceipt {
        TransactionReceipt {
            status,
            block_number: Some(U64::from(1)),
        }
    }

    #[test]
    fn test_success_on_third_poll_with_two_change_events() {
        let mut tracker = FinalityTracker::new(TransactionStatus::L2FinalizedL1Included, 20);

        let (event, outcome) =
            tracker.on_observation(Some(&receipt(TransactionStatus::L2IncludedL1Pending)));
        assert_eq!(
            event,
            TrackEvent::FirstStatus(TransactionStatus::L2IncludedL1Pending)
        );
        assert!(outcome.is_none());

        let (event, outcome) =
            tracker.on_observation(Some(&receipt(TransactionStatus::L2IncludedL1Included)));
        assert_eq!(
            event,
            TrackEvent::StatusChanged(TransactionStatus::L2IncludedL1Included)
        );
        assert!(outcome.is_none());

        let (event, outcome) =
            tracker.on_observation(Some(&receipt(TransactionStatus::L2FinalizedL1Included)));
        assert_eq!(
            event,
            TrackEvent::StatusChanged(TransactionStatus::L2FinalizedL1Included)
        );
        assert_eq!(
            outcome,
            Some(TrackOutcome::Finalized(
                TransactionStatus::L2FinalizedL1Included
            ))
        );
    }

    #[test]
    fn test_status_past_the_target_finalizes_immediately() {
        let mut tracker = FinalityTracker::new(TransactionStatus::L2FinalizedL1Included, 20);
        let (event, outcome) =
            tracker.on_observation(Some(&receipt(TransactionStatus::L2FinalizedL1Finalized)));
        assert_eq!(
            event,
            TrackEvent::FirstStatus(TransactionStatus::L2FinalizedL1Finalized)
        );
        assert_eq!(
            outcome,
            Some(TrackOutcome::Finalized(
                TransactionStatus::L2FinalizedL1Finalized
            ))
        );
    }

    #[test]
    fn test_exhaustion_before_target_times_out() {
        let mut tracker = FinalityTracker::new(TransactionStatus::L2FinalizedL1Included, 3);
        let stuck = receipt(TransactionStatus::L2IncludedL1Pending);

        let (_, outcome) = tracker.on_observation(Some(&stuck));
        assert!(outcome.is_none());
        let (_, outcome) = tracker.on_observation(Some(&stuck));
        assert!(outcome.is_none());
        let (event, outcome) = tracker.on_observation(Some(&stuck));
        assert_eq!(event, TrackEvent::Unchanged);
        assert_eq!(outcome, Some(TrackOutcome::TimedOut));
    }

    #[test]
    fn test_regressed_observation_is_ignored() {
        let mut tracker = FinalityTracker::new(TransactionStatus::L2FinalizedL1Included, 20);
        tracker.on_observation(Some(&receipt(TransactionStatus::L2IncludedL1Included)));

        let (event, outcome) =
            tracker.on_observation(Some(&receipt(TransactionStatus::L2IncludedL1Pending)));
        assert_eq!(event, TrackEvent::Unchanged);
        assert!(outcome.is_none());

        // The ladder still advances from the higher baseline.
        let (event, _) =
            tracker.on_observation(Some(&receipt(TransactionStatus::L2FinalizedL1Included)));
        assert_eq!(
            event,
            TrackEvent::StatusChanged(TransactionStatus::L2FinalizedL1Included)
        );
    }

    #[test]
    fn test_missing_receipt_is_transient() {
        let mut tracker = FinalityTracker::new(TransactionStatus::L2FinalizedL1Included, 20);
        let (event, outcome) = tracker.on_observation(None);
        assert_eq!(event, TrackEvent::NotVisible);
        assert!(outcome.is_none());

        let (event, _) =
            tracker.on_observation(Some(&receipt(TransactionStatus::L2IncludedL1Pending)));
        assert_eq!(
            event,
            TrackEvent::FirstStatus(TransactionStatus::L2IncludedL1Pending)
        );
    }

    struct StubReceipts {
        receipts: Mutex<VecDeque<Option<TransactionReceipt>>>,
    }

    impl ReceiptReader for StubReceipts {
        async fn get_transaction_receipt(
            &self,
            _tx_hash: B256,
        ) -> Result<Option<TransactionReceipt>, Error> {
            Ok(self.receipts.lock().unwrap().pop_front().flatten())
        }
    }

    struct FailingReceipts {}

    impl ReceiptReader for FailingReceipts {
        async fn get_transaction_receipt(
            &self,
            _tx_hash: B256,
        ) -> Result<Option<TransactionReceipt>, Error> {
            Err(anyhow!("connection refused"))
        }
    }

    #[tokio::test]
    async fn test_track_transaction_reaches_the_target() {
        let reader = StubReceipts {
            receipts: Mutex::new(VecDeque::from([
                None,
                Some(receipt(TransactionStatus::L2IncludedL1Included)),
                Some(receipt(TransactionStatus::L2FinalizedL1Included)),
            ])),
        };

        let outcome = track_transaction(
            &reader,
            B256::repeat_byte(0x55),
            TransactionStatus::L2FinalizedL1Included,
            Duration::ZERO,
            20,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(
            outcome,
            TrackOutcome::Finalized(TransactionStatus::L2FinalizedL1Included)
        );
    }

    #[tokio::test]
    async fn test_fetch_failures_run_down_the_poll_budget() {
        let outcome = track_transaction(
            &FailingReceipts {},
            B256::repeat_byte(0x55),
            TransactionStatus::L2FinalizedL1Included,
            Duration::ZERO,
            2,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, TrackOutcome::TimedOut);
    }

    struct CountingFinalizer {
        calls: Mutex<u64>,
    }

    impl WithdrawalFinalizer for CountingFinalizer {
        async fn finalize_withdrawal(&self, _tx_hash: B256) -> Result<B256, Error> {
            *self.calls.lock().unwrap() += 1;
            Ok(B256::repeat_byte(0xaa))
        }
    }

    #[tokio::test]
    async fn test_withdrawal_is_finalized_once_settled() {
        let reader = StubReceipts {
            receipts: Mutex::new(VecDeque::from([
                Some(receipt(TransactionStatus::L2IncludedL1Pending)),
                Some(receipt(TransactionStatus::L2FinalizedL1Finalized)),
            ])),
        };
        let finalizer = CountingFinalizer {
            calls: Mutex::new(0),
        };

        let outcome = track_withdrawal(
            &reader,
            &finalizer,
            B256::repeat_byte(0x55),
            TransactionStatus::L2FinalizedL1Finalized,
            Duration::ZERO,
            20,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(
            outcome,
            TrackOutcome::Finalized(TransactionStatus::L2FinalizedL1Finalized)
        );
        assert_eq!(*finalizer.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_timed_out_withdrawal_is_not_finalized() {
        let reader = StubReceipts {
            receipts: Mutex::new(VecDeque::from([Some(receipt(
                TransactionStatus::L2IncludedL1Pending,
            ))])),
        };
        let finalizer = CountingFinalizer {
            calls: Mutex::new(0),
        };

        let outcome = track_withdrawal(
            &reader,
            &finalizer,
            B256::repeat_byte(0x55),
            TransactionStatus::L2FinalizedL1Finalized,
            Duration::ZERO,
            1,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, TrackOutcome::TimedOut);
        assert_eq!(*finalizer.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_tracking() {
        let reader = StubReceipts {
            receipts: Mutex::new(VecDeque::from([None])),
        };
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let outcome = track_transaction(
            &reader,
            B256::repeat_byte(0x55),
            TransactionStatus::L2FinalizedL1Included,
            Duration::from_secs(600),
            20,
            &cancellation,
        )
        .await
        .unwrap();
        assert_eq!(outcome, TrackOutcome::Cancelled);
    }
}
