use tokio::sync::watch;

/// Cooperative pause signal checked by the pipeline at its checkpoints.
///
/// Pausing never interrupts work in progress; the pipeline parks at the next
/// checkpoint until [`PauseGate::resume`] is called.
#[derive(Debug)]
pub struct PauseGate {
    tx: watch::Sender<bool>,
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}

impl PauseGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn pause(&self) {
        self.tx.send_replace(true);
    }

    pub fn resume(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.tx.borrow()
    }

    /// Parks until the gate is open. Returns whether the caller had to wait.
    pub async fn wait_until_resumed(&self) -> bool {
        let mut rx = self.tx.subscribe();
        if !*rx.borrow_and_update() {
            return false;
        }
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|paused| !*paused).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_open_gate_does_not_wait() {
        let gate = PauseGate::new();
        assert!(!gate.is_paused());
        assert!(!gate.wait_until_resumed().await);
    }

    #[tokio::test]
    async fn test_resume_wakes_waiter() {
        let gate = Arc::new(PauseGate::new());
        gate.pause();
        assert!(gate.is_paused());

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_until_resumed().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        gate.resume();
        let waited = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(waited);
    }
}
