//! Background task that expires unanswered termination requests.

use std::sync::Arc;

use {
    tokio::{
        task::JoinHandle,
        time::{Instant, MissedTickBehavior},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use crate::service::PairingService;

/// Spawn the sweep loop. It ticks every `sweep_interval` until `cancel`
/// fires, so a request is rolled back at most one interval after its
/// deadline.
pub fn spawn_sweep(service: Arc<PairingService>, cancel: CancellationToken) -> JoinHandle<()> {
    let period = service.config().sweep_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_secs = period.as_secs(), "termination sweep started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                now = ticker.tick() => {
                    let expired = service.sweep_once(now).await;
                    if !expired.is_empty() {
                        debug!(count = expired.len(), "sweep rolled back handshakes");
                    }
                },
            }
        }

        info!("termination sweep stopped");
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::Harness,
        carlink_common::ParticipantId,
        carlink_sessions::SessionState,
        std::time::Duration,
    };

    const A: ParticipantId = ParticipantId(1);
    const B: ParticipantId = ParticipantId(2);

    #[tokio::test(start_paused = true)]
    async fn expires_within_one_interval_after_deadline() {
        let h = Harness::new();
        h.in_dialog(A, B).await;
        h.service.request_termination(A).await;

        let cancel = CancellationToken::new();
        let handle = spawn_sweep(Arc::clone(&h.service), cancel.clone());

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(h.service.sessions().pending_len(), 1);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(h.service.sessions().pending_len(), 0);
        assert!(matches!(h.state(A), SessionState::InDialog(_)));
        assert!(matches!(h.state(B), SessionState::InDialog(_)));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_cancel() {
        let h = Harness::new();
        let cancel = CancellationToken::new();
        let handle = spawn_sweep(Arc::clone(&h.service), cancel.clone());
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
