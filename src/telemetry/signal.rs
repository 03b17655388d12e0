//! `SIGUSR1` → dump the in-memory sink to stderr.

use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::AppError;

use super::inmem::InmemSink;

pub(crate) fn spawn_dump_on_signal(
    sink: InmemSink,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>, AppError> {
    let mut sigusr1 = signal(SignalKind::user_defined1())
        .map_err(|e| AppError::Telemetry(format!("cannot register SIGUSR1 handler: {e}")))?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                received = sigusr1.recv() => {
                    if received.is_none() {
                        break;
                    }
                    info!("SIGUSR1 received, dumping in-memory metrics");
                    eprint!("{}", sink.render());
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use std::process::Command;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn dump_task_survives_sigusr1_and_stops_on_cancel() {
        let sink = InmemSink::new(Duration::from_secs(10), Duration::from_secs(60));
        let token = CancellationToken::new();
        let task = spawn_dump_on_signal(sink, token.clone()).unwrap();

        let status = Command::new("kill")
            .args(["-USR1", &std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!task.is_finished());

        token.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("dump task did not stop")
            .unwrap();
    }
}
