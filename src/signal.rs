use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// The single should-stop flag of a run.
///
/// Setting it keeps new queries from starting; in-flight queries finish or
/// time out on their own. Waiters in `sleep` wake as soon as it is set.
#[derive(Debug, Clone)]
pub struct StopSignal {
    flag: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    pub fn stop(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.flag.borrow()
    }

    pub async fn stopped(&self) {
        let mut rx = self.flag.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Sleeps for `duration` or until the flag is set. Returns true when the
    /// full duration elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = self.stopped() => false,
        }
    }
}
