// ABOUTME: Background watcher translating a deployment marker file into the LiveStatus flag
// ABOUTME: Keeps filesystem polling outside the bridge; adapters only read the flag

use bridge_core::live::LiveStatus;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Poll `path` on a fixed period and mirror its existence into `status`.
/// Transitions are logged; steady state is silent.
pub fn spawn_marker_watch(
    path: PathBuf,
    status: LiveStatus,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            let live = tokio::fs::try_exists(&path).await.unwrap_or(false);
            if live != status.is_live() {
                tracing::info!(
                    marker = %path.display(),
                    live,
                    "Live marker changed"
                );
            }
            status.set_live(live);
        }
    })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn wait_for(status: &LiveStatus, expect: bool) {
        for _ in 0..100 {
            if status.is_live() == expect {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("live status never became {expect}");
    }

    #[tokio::test]
    async fn test_marker_file_toggles_live_status() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("live.lock");
        let status = LiveStatus::new();

        let watch = spawn_marker_watch(marker.clone(), status.clone(), Duration::from_millis(5));

        wait_for(&status, false).await;
        std::fs::write(&marker, b"").unwrap();
        wait_for(&status, true).await;
        std::fs::remove_file(&marker).unwrap();
        wait_for(&status, false).await;

        watch.abort();
    }
}
