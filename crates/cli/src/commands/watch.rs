//! Terminal views driven by the handover pollers.
//!
//! ```bash
//! PARCEL_TOKEN=... pd-cli watch verified
//! PARCEL_TOKEN=... pd-cli watch order <ORDER_ID>
//! ```
//!
//! # Environment Variables
//!
//! - `PARCEL_BASE_URL` - API base URL (default: `http://127.0.0.1:3000`)
//! - `PARCEL_TOKEN` - Bearer token of the security guard or student

use std::io::{self, Write};
use std::sync::Arc;

use parcel_desk_client::poller::{
    self, OrderWatchEvent, SECURITY_POLL_INTERVAL, STUDENT_POLL_INTERVAL, VerifiedEvent,
};
use parcel_desk_client::{ApiClient, ClientError, PollHandle};
use parcel_desk_core::{OrderId, VerifiedOrder};
use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
const BELL: &str = "\x07";

/// Errors that can occur while watching.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Client could not be built.
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    /// Writing to the terminal failed.
    #[error("Output error: {0}")]
    Io(#[from] io::Error),
}

fn client() -> Result<Arc<ApiClient>, WatchError> {
    dotenvy::dotenv().ok();
    let base_url =
        std::env::var("PARCEL_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
    let token = std::env::var("PARCEL_TOKEN")
        .map(SecretString::from)
        .map_err(|_| WatchError::MissingEnvVar("PARCEL_TOKEN"))?;
    Ok(Arc::new(ApiClient::new(&base_url, token)?))
}

/// Print the verified queue on every poll; ring the bell when it grows.
/// Runs until Ctrl-C.
pub async fn verified() -> Result<(), WatchError> {
    let client = client()?;
    tracing::info!("Watching verified orders at {}", client.base_url());
    let mut handle = poller::watch_verified(client, SECURITY_POLL_INTERVAL);

    until_interrupted(&mut handle, |event, out| match event {
        VerifiedEvent::Snapshot(orders) => render_queue(out, &orders),
        VerifiedEvent::Arrivals { previous, current } => {
            write!(out, "{BELL}")?;
            writeln!(out, "New arrivals: {} more waiting", current - previous)
        }
    })
    .await
}

/// Print each status change of one order until it is handed over.
pub async fn order(order_id: OrderId) -> Result<(), WatchError> {
    let client = client()?;
    tracing::info!("Watching order {order_id}");
    let mut handle = poller::watch_order(client, order_id, STUDENT_POLL_INTERVAL);

    until_interrupted(&mut handle, |event, out| match event {
        OrderWatchEvent::StatusChanged(status) => writeln!(out, "Order {order_id}: {status}"),
        OrderWatchEvent::Completed(order) => {
            let at = order.collected_at.or(order.retrieved_at);
            match at {
                Some(at) => writeln!(out, "Handed over at {}", at.format("%Y-%m-%d %H:%M")),
                None => writeln!(out, "Handed over"),
            }
        }
    })
    .await
}

/// Render events until the poller stops or Ctrl-C. The handle is dropped on
/// return, which aborts the poller.
async fn until_interrupted<E>(
    handle: &mut PollHandle<E>,
    mut render: impl FnMut(E, &mut io::StdoutLock<'_>) -> io::Result<()>,
) -> Result<(), WatchError> {
    loop {
        tokio::select! {
            event = handle.recv() => {
                let Some(event) = event else { return Ok(()) };
                let mut out = io::stdout().lock();
                render(event, &mut out)?;
                out.flush()?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Stopped");
                return Ok(());
            }
        }
    }
}

fn render_queue(out: &mut impl Write, orders: &[VerifiedOrder]) -> io::Result<()> {
    writeln!(out, "{} verified order(s) waiting", orders.len())?;
    for order in orders {
        writeln!(
            out,
            "  {}  {:<20}  {:<24}  room {}",
            order.id, order.order_tracking_id, order.student_name, order.room_number
        )?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_render_queue() {
        let order = VerifiedOrder {
            id: OrderId::generate(),
            order_tracking_id: "AWB123".to_owned(),
            expected_date: "2025-06-01".parse().unwrap(),
            verified_at: None,
            student_name: VerifiedOrder::UNKNOWN_STUDENT.to_owned(),
            room_number: VerifiedOrder::UNKNOWN_ROOM.to_owned(),
        };

        let mut out = Vec::new();
        render_queue(&mut out, &[order]).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("1 verified order(s) waiting"));
        assert!(text.contains("AWB123"));
        assert!(text.contains("room N/A"));
    }
}
