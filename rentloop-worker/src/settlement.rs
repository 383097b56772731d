/// Settlement sweep
///
/// Payments are authorized with manual capture. Most are captured when the
/// processor's `payment_intent.succeeded` webhook arrives; the sweep picks
/// up whatever is left once the rental has been returned.
///
/// # Loop
///
/// ```text
/// every interval:
///   list_capturable(batch) ──> capture_intent ──> mark_captured
///                                   │
///                                   ├─ transient: left for the next sweep
///                                   └─ rejected:  logged at error level
/// ```
///
/// Each sweep is independent, so the worker can be stopped and restarted
/// at any point. The guarded `mark_captured` update makes a sweep racing a
/// webhook delivery harmless.
///
/// # Example
///
/// ```no_run
/// use rentloop_worker::settlement::{SettlementSweeper, SweepConfig};
/// use rentloop_shared::payments::processor::StripeProcessor;
/// use std::{sync::Arc, time::Duration};
///
/// # async fn example(pool: sqlx::PgPool) -> anyhow::Result<()> {
/// let processor = StripeProcessor::new("https://api.stripe.com", "sk_test", Duration::from_secs(10))?;
/// let sweeper = SettlementSweeper::new(pool, Arc::new(processor), SweepConfig::default());
/// sweeper.run().await?;
/// # Ok(())
/// # }
/// ```

use rentloop_shared::models::payment::Payment;
use rentloop_shared::payments::processor::PaymentProcessor;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Pause between sweeps
    pub interval: Duration,

    /// Payments handled per sweep
    pub batch_size: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            batch_size: 50,
        }
    }
}

/// Result of handling one payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    /// Captured at the processor and recorded
    Captured,

    /// Captured at the processor, but a webhook recorded it first
    AlreadyRecorded,

    /// Processor unavailable; retried on the next sweep
    Deferred,

    /// Processor refused the capture
    Failed,
}

/// Tally of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub captured: usize,
    pub already_recorded: usize,
    pub deferred: usize,
    pub failed: usize,
}

impl SweepReport {
    pub fn record(&mut self, outcome: SettleOutcome) {
        match outcome {
            SettleOutcome::Captured => self.captured += 1,
            SettleOutcome::AlreadyRecorded => self.already_recorded += 1,
            SettleOutcome::Deferred => self.deferred += 1,
            SettleOutcome::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.captured + self.already_recorded + self.deferred + self.failed
    }
}

/// Captures the payment's intent and records the capture locally
pub async fn settle_payment(
    pool: &PgPool,
    processor: &dyn PaymentProcessor,
    payment: &Payment,
) -> Result<SettleOutcome, sqlx::Error> {
    if let Err(e) = processor.capture_intent(&payment.intent_id).await {
        if e.is_transient() {
            warn!(
                payment_id = %payment.id,
                intent_id = %payment.intent_id,
                error = %e,
                "Capture deferred"
            );
            return Ok(SettleOutcome::Deferred);
        }

        error!(
            payment_id = %payment.id,
            intent_id = %payment.intent_id,
            error = %e,
            "Capture rejected by processor"
        );
        return Ok(SettleOutcome::Failed);
    }

    let mut conn = pool.acquire().await?;
    match Payment::mark_captured(&mut conn, &payment.intent_id).await? {
        Some(captured) => {
            info!(
                payment_id = %captured.id,
                rental_id = %captured.rental_id,
                amount_cents = captured.amount_cents,
                "Payment settled"
            );
            Ok(SettleOutcome::Captured)
        }
        None => Ok(SettleOutcome::AlreadyRecorded),
    }
}

/// Runs one sweep over at most `batch_size` capturable payments
pub async fn sweep_once(
    pool: &PgPool,
    processor: &dyn PaymentProcessor,
    batch_size: i64,
) -> Result<SweepReport, sqlx::Error> {
    let payments = Payment::list_capturable(pool, batch_size).await?;
    debug!(count = payments.len(), "Capturable payments found");

    let mut report = SweepReport::default();
    for payment in &payments {
        report.record(settle_payment(pool, processor, payment).await?);
    }

    Ok(report)
}

/// Periodic settlement loop
pub struct SettlementSweeper {
    db: PgPool,
    processor: Arc<dyn PaymentProcessor>,
    config: SweepConfig,
    shutdown_token: CancellationToken,
}

impl SettlementSweeper {
    pub fn new(db: PgPool, processor: Arc<dyn PaymentProcessor>, config: SweepConfig) -> Self {
        Self {
            db,
            processor,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops [`run`](Self::run) when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Sweeps immediately, then once per interval, until shutdown
    ///
    /// A failed sweep is logged and retried on the next tick.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            "Settlement sweeper starting"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_token.cancelled() => break,
                _ = ticker.tick() => {
                    match sweep_once(&self.db, self.processor.as_ref(), self.config.batch_size).await {
                        Ok(report) if report.total() > 0 => info!(?report, "Settlement sweep finished"),
                        Ok(_) => debug!("Nothing to settle"),
                        Err(e) => error!(error = %e, "Settlement sweep failed"),
                    }
                }
            }
        }

        info!("Settlement sweeper stopped");
        Ok(())
    }
}
