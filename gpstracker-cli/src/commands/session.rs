//! One tracking session: start the service, attach a client, log until
//! told to stop, then shut everything down.

use std::sync::Arc;
use std::time::Duration;

use gpstracker::client::TrackerClient;
use gpstracker::config::ServiceConfig;
use gpstracker::sensor::GpsReceiver;
use gpstracker::service::TrackerService;
use gpstracker::tracking::StatusRecord;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::CliError;
use crate::output::Printer;

/// Run a logging session until `shutdown` fires or `limit` elapses.
///
/// Returns the status the service finished with.
pub async fn drive(
    config: ServiceConfig,
    receiver: Arc<dyn GpsReceiver>,
    printer: Printer,
    limit: Option<Duration>,
    shutdown: CancellationToken,
) -> Result<StatusRecord, CliError> {
    let mut service = TrackerService::start(config, receiver)?;

    let mut client = TrackerClient::new();
    client.attach(
        &service.handle(),
        move |status| printer.status(&status),
        move |sample| printer.location(&sample),
    );
    client.start_logging();

    let deadline = async {
        match limit {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = shutdown.cancelled() => info!("Session interrupted"),
        _ = deadline => info!("Session time limit reached"),
    }

    client.stop_logging();
    let status = service.shutdown().await?;
    client.detach();
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpstracker::sensor::ManualReceiver;
    use gpstracker::tracking::LoggingState;

    #[tokio::test(start_paused = true)]
    async fn test_session_ends_at_limit_and_releases_receiver() {
        let receiver = Arc::new(ManualReceiver::new());
        let status = drive(
            ServiceConfig::default(),
            receiver.clone(),
            Printer::new(true),
            Some(Duration::from_secs(3)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(status.logging_state, LoggingState::Stopped);
        assert_eq!(receiver.subscribe_count(), 1);
        assert!(!receiver.is_subscribed());
    }

    #[tokio::test]
    async fn test_session_stops_on_shutdown_signal() {
        let receiver = Arc::new(ManualReceiver::new());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let status = drive(
            ServiceConfig::default(),
            receiver,
            Printer::new(true),
            None,
            shutdown,
        )
        .await
        .unwrap();

        assert_eq!(status.logging_state, LoggingState::Stopped);
    }
}
