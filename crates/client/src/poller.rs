//! Timer-driven pollers for the handover screens.
//!
//! The security desk polls the verified queue and is told when it grows.
//! A student waiting on one order polls their own orders until it reaches a
//! terminal status. Each poller is a single tokio task that reports through
//! a bounded channel and is aborted when its [`PollHandle`] is dropped.
//!
//! A failed poll is logged at debug and skipped; the next tick retries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::debug;

use parcel_desk_core::{Order, OrderId, OrderStatus, VerifiedOrder};

use crate::client::ApiClient;
use crate::error::ClientError;

/// Security desk refresh period.
pub const SECURITY_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Student order refresh period.
pub const STUDENT_POLL_INTERVAL: Duration = Duration::from_secs(3);

const EVENT_BUFFER: usize = 16;

/// The two queries the pollers issue.
#[async_trait]
pub trait OrderFeed: Send + Sync + 'static {
    /// Orders currently waiting at the security desk.
    async fn verified_orders(&self) -> Result<Vec<VerifiedOrder>, ClientError>;

    /// The caller's own orders.
    async fn my_orders(&self) -> Result<Vec<Order>, ClientError>;
}

#[async_trait]
impl OrderFeed for ApiClient {
    async fn verified_orders(&self) -> Result<Vec<VerifiedOrder>, ClientError> {
        Self::verified_orders(self).await
    }

    async fn my_orders(&self) -> Result<Vec<Order>, ClientError> {
        Self::my_orders(self).await
    }
}

/// What the security poller publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifiedEvent {
    /// Result of a successful poll.
    Snapshot(Vec<VerifiedOrder>),
    /// The queue grew since the previous successful poll.
    Arrivals {
        /// Queue length at the previous successful poll.
        previous: usize,
        /// Queue length now.
        current: usize,
    },
}

/// What the student poller publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderWatchEvent {
    /// First observed status, and every change after it.
    StatusChanged(OrderStatus),
    /// The order reached a terminal status; polling has stopped.
    Completed(Order),
}

/// Owner of a running poller.
///
/// Dropping the handle aborts the task immediately.
#[derive(Debug)]
pub struct PollHandle<E> {
    events: mpsc::Receiver<E>,
    task: JoinHandle<()>,
}

impl<E> PollHandle<E> {
    /// Next event, or `None` once the poller has stopped.
    pub async fn recv(&mut self) -> Option<E> {
        self.events.recv().await
    }

    /// Whether the polling task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl<E> Drop for PollHandle<E> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start polling the verified queue every `period`, first poll immediately.
pub fn watch_verified<F: OrderFeed>(feed: Arc<F>, period: Duration) -> PollHandle<VerifiedEvent> {
    let (tx, events) = mpsc::channel(EVENT_BUFFER);
    let task = tokio::spawn(run_security(feed, period, tx));
    PollHandle { events, task }
}

/// Start polling the caller's orders every `period` until `order_id` is
/// collected or retrieved.
pub fn watch_order<F: OrderFeed>(
    feed: Arc<F>,
    order_id: OrderId,
    period: Duration,
) -> PollHandle<OrderWatchEvent> {
    let (tx, events) = mpsc::channel(EVENT_BUFFER);
    let task = tokio::spawn(run_student(feed, order_id, period, tx));
    PollHandle { events, task }
}

async fn run_security<F: OrderFeed>(
    feed: Arc<F>,
    period: Duration,
    tx: mpsc::Sender<VerifiedEvent>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut previous: Option<usize> = None;

    loop {
        ticker.tick().await;

        let orders = match feed.verified_orders().await {
            Ok(orders) => orders,
            Err(e) => {
                debug!(error = %e, "Verified queue poll failed");
                continue;
            }
        };

        let current = orders.len();
        let arrivals = previous
            .filter(|&prev| current > prev)
            .map(|prev| VerifiedEvent::Arrivals {
                previous: prev,
                current,
            });
        previous = Some(current);

        if tx.send(VerifiedEvent::Snapshot(orders)).await.is_err() {
            break;
        }
        if let Some(event) = arrivals {
            if tx.send(event).await.is_err() {
                break;
            }
        }
    }

    debug!("Security poller stopped");
}

async fn run_student<F: OrderFeed>(
    feed: Arc<F>,
    order_id: OrderId,
    period: Duration,
    tx: mpsc::Sender<OrderWatchEvent>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_status: Option<OrderStatus> = None;

    loop {
        ticker.tick().await;

        let order = match feed.my_orders().await {
            Ok(orders) => orders.into_iter().find(|o| o.id == order_id),
            Err(e) => {
                debug!(error = %e, %order_id, "Order poll failed");
                continue;
            }
        };
        let Some(order) = order else {
            debug!(%order_id, "Watched order not in listing");
            continue;
        };

        if last_status != Some(order.status) {
            last_status = Some(order.status);
            if tx
                .send(OrderWatchEvent::StatusChanged(order.status))
                .await
                .is_err()
            {
                break;
            }
        }

        if order.is_terminal() {
            // Receiver may already be gone; the task ends either way.
            let _ = tx.send(OrderWatchEvent::Completed(order)).await;
            break;
        }
    }

    debug!(%order_id, "Order poller stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{NaiveDate, Utc};
    use parcel_desk_core::UserId;

    use super::*;

    /// Replays scripted poll results; the last one repeats forever.
    struct ScriptedFeed {
        verified: Mutex<Vec<Option<usize>>>,
        statuses: Mutex<Vec<Option<OrderStatus>>>,
        order: Order,
        calls: AtomicUsize,
    }

    impl ScriptedFeed {
        fn verified(script: &[Option<usize>]) -> Arc<Self> {
            Arc::new(Self {
                verified: Mutex::new(script.iter().rev().copied().collect()),
                statuses: Mutex::new(Vec::new()),
                order: order(OrderStatus::Expected),
                calls: AtomicUsize::new(0),
            })
        }

        fn statuses(script: &[Option<OrderStatus>]) -> Arc<Self> {
            Arc::new(Self {
                verified: Mutex::new(Vec::new()),
                statuses: Mutex::new(script.iter().rev().copied().collect()),
                order: order(OrderStatus::Expected),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn next<T: Copy>(script: &Mutex<Vec<T>>) -> T {
        let mut script = script.lock().unwrap();
        if script.len() > 1 {
            script.pop().unwrap()
        } else {
            *script.last().unwrap()
        }
    }

    fn unavailable() -> ClientError {
        ClientError::Api {
            status: 503,
            message: "unavailable".to_owned(),
        }
    }

    fn order(status: OrderStatus) -> Order {
        Order {
            id: OrderId::new(uuid::Uuid::nil()),
            user_id: UserId::generate(),
            order_tracking_id: "AWB123".to_owned(),
            expected_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            status,
            created_at: Utc::now(),
            verified_at: None,
            collected_at: None,
            retrieved_at: None,
        }
    }

    fn verified_order(n: usize) -> VerifiedOrder {
        VerifiedOrder {
            id: OrderId::generate(),
            order_tracking_id: format!("AWB{n}"),
            expected_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            verified_at: Some(Utc::now()),
            student_name: "Jane".to_owned(),
            room_number: "B-204".to_owned(),
        }
    }

    #[async_trait]
    impl OrderFeed for ScriptedFeed {
        async fn verified_orders(&self) -> Result<Vec<VerifiedOrder>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            next(&self.verified)
                .map(|n| (0..n).map(verified_order).collect())
                .ok_or_else(unavailable)
        }

        async fn my_orders(&self) -> Result<Vec<Order>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let status = next(&self.statuses).ok_or_else(unavailable)?;
            Ok(vec![Order {
                status,
                ..self.order.clone()
            }])
        }
    }

    fn snapshot_len(event: Option<VerifiedEvent>) -> usize {
        match event.unwrap() {
            VerifiedEvent::Snapshot(orders) => orders.len(),
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_is_baseline_without_attention() {
        let feed = ScriptedFeed::verified(&[Some(2), Some(2)]);
        let mut handle = watch_verified(feed, SECURITY_POLL_INTERVAL);

        assert_eq!(snapshot_len(handle.recv().await), 2);
        assert_eq!(snapshot_len(handle.recv().await), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_growth_raises_attention() {
        let feed = ScriptedFeed::verified(&[Some(1), Some(1), Some(3), Some(2)]);
        let mut handle = watch_verified(feed, SECURITY_POLL_INTERVAL);

        assert_eq!(snapshot_len(handle.recv().await), 1);
        assert_eq!(snapshot_len(handle.recv().await), 1);
        assert_eq!(snapshot_len(handle.recv().await), 3);
        assert_eq!(
            handle.recv().await,
            Some(VerifiedEvent::Arrivals {
                previous: 1,
                current: 3
            })
        );
        // Shrinking is not an arrival.
        assert_eq!(snapshot_len(handle.recv().await), 2);
        assert_eq!(snapshot_len(handle.recv().await), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_is_skipped() {
        let feed = ScriptedFeed::verified(&[Some(1), None, None, Some(2)]);
        let mut handle = watch_verified(Arc::clone(&feed), SECURITY_POLL_INTERVAL);

        assert_eq!(snapshot_len(handle.recv().await), 1);
        // Growth is measured against the last successful poll.
        assert_eq!(snapshot_len(handle.recv().await), 2);
        assert_eq!(
            handle.recv().await,
            Some(VerifiedEvent::Arrivals {
                previous: 1,
                current: 2
            })
        );
        assert_eq!(feed.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval() {
        let feed = ScriptedFeed::verified(&[Some(0)]);
        let start = tokio::time::Instant::now();
        let mut handle = watch_verified(feed, SECURITY_POLL_INTERVAL);

        handle.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        handle.recv().await.unwrap();
        assert_eq!(start.elapsed(), SECURITY_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_stops_polling() {
        let feed = ScriptedFeed::verified(&[Some(0)]);
        let mut handle = watch_verified(Arc::clone(&feed), SECURITY_POLL_INTERVAL);
        handle.recv().await.unwrap();
        drop(handle);

        let calls = feed.calls();
        tokio::time::sleep(SECURITY_POLL_INTERVAL * 10).await;
        assert_eq!(feed.calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_student_poller_reports_changes_then_completes() {
        let feed = ScriptedFeed::statuses(&[
            Some(OrderStatus::Expected),
            Some(OrderStatus::Expected),
            None,
            Some(OrderStatus::Verified),
            Some(OrderStatus::Collected),
        ]);
        let id = feed.order.id;
        let mut handle = watch_order(Arc::clone(&feed), id, STUDENT_POLL_INTERVAL);

        assert_eq!(
            handle.recv().await,
            Some(OrderWatchEvent::StatusChanged(OrderStatus::Expected))
        );
        assert_eq!(
            handle.recv().await,
            Some(OrderWatchEvent::StatusChanged(OrderStatus::Verified))
        );
        assert_eq!(
            handle.recv().await,
            Some(OrderWatchEvent::StatusChanged(OrderStatus::Collected))
        );
        match handle.recv().await {
            Some(OrderWatchEvent::Completed(order)) => {
                assert_eq!(order.status, OrderStatus::Collected);
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(handle.recv().await, None);

        let calls = feed.calls();
        tokio::time::sleep(STUDENT_POLL_INTERVAL * 10).await;
        assert_eq!(feed.calls(), calls);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_step_retrieved_is_terminal() {
        let feed = ScriptedFeed::statuses(&[Some(OrderStatus::Retrieved)]);
        let id = feed.order.id;
        let mut handle = watch_order(feed, id, STUDENT_POLL_INTERVAL);

        assert_eq!(
            handle.recv().await,
            Some(OrderWatchEvent::StatusChanged(OrderStatus::Retrieved))
        );
        assert!(matches!(
            handle.recv().await,
            Some(OrderWatchEvent::Completed(_))
        ));
        assert_eq!(handle.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_order_keeps_polling() {
        let feed = ScriptedFeed::statuses(&[Some(OrderStatus::Collected)]);
        let mut handle = watch_order(Arc::clone(&feed), OrderId::generate(), STUDENT_POLL_INTERVAL);

        tokio::time::sleep(STUDENT_POLL_INTERVAL * 3).await;
        assert!(feed.calls() >= 3);
        assert!(!handle.is_finished());
        assert!(handle.events.try_recv().is_err());
    }
}
