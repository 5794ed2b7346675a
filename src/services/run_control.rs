use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::domain::lead::Lead;

/// One-way operator feed. Lines are mirrored to the log; a send failure
/// means the listener went away, which is never a reason to stop the run.
#[derive(Clone, Default)]
pub struct ProgressSender {
    sender: Option<UnboundedSender<String>>,
}

impl ProgressSender {
    pub fn new(sender: UnboundedSender<String>) -> Self {
        ProgressSender {
            sender: Some(sender),
        }
    }

    pub fn log_only() -> Self {
        ProgressSender { sender: None }
    }

    pub fn emit(&self, line: impl Into<String>) {
        let line = line.into();
        log::info!("{}", line);
        if let Some(sender) = &self.sender {
            _ = sender.send(line);
        }
    }
}

/// Delivers the final lead list. Consumes itself so a run can only ever
/// report once.
pub struct ResultSender {
    sender: UnboundedSender<Vec<Lead>>,
}

impl ResultSender {
    pub fn new(sender: UnboundedSender<Vec<Lead>>) -> Self {
        ResultSender { sender }
    }

    pub fn deliver(self, leads: Vec<Lead>) {
        if self.sender.send(leads).is_err() {
            log::error!("Result listener dropped before delivery");
        }
    }
}

/// At most one orchestrated search is active per process; its cancellation
/// token is parked here so the stop route can reach it.
#[derive(Default)]
pub struct RunRegistry {
    active: Mutex<Option<CancellationToken>>,
}

impl RunRegistry {
    /// Returns a fresh token for the new run, or None when one is already
    /// in flight.
    pub fn begin(&self) -> Option<CancellationToken> {
        let mut active = self.active.lock().unwrap();
        match active.as_ref() {
            Some(_) => None,
            None => {
                let token = CancellationToken::new();
                *active = Some(token.clone());
                Some(token)
            }
        }
    }

    pub fn stop(&self) -> bool {
        match self.active.lock().unwrap().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn finish(&self) {
        self.active.lock().unwrap().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_allows_single_active_run() {
        let registry = RunRegistry::default();

        let token = registry.begin().unwrap();
        assert!(registry.begin().is_none());

        assert!(registry.stop());
        assert!(token.is_cancelled());

        registry.finish();
        assert!(registry.begin().is_some());
    }

    #[test]
    fn stop_without_active_run_reports_false() {
        let registry = RunRegistry::default();

        assert!(!registry.stop());
    }

    #[tokio::test]
    async fn result_sender_delivers_exactly_once() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sender = ResultSender::new(tx);

        sender.deliver(vec![]);

        assert_eq!(rx.recv().await.unwrap().len(), 0);
        assert!(rx.try_recv().is_err());
    }
}
