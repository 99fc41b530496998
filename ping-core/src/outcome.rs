//! Result notifier: outcomes travel from the worker to the UI context, in emission order.

use serde::Serialize;
use tokio::sync::mpsc;

/// UI-bound notification. Each one is delivered exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Outcome {
    /// Searching for a service; show the progress indicator.
    ShowProgress,
    /// A group was joined; dismiss the progress indicator.
    HideProgress,
    /// Argument about to be sent to the remote method.
    Echo(String),
    /// Value returned by the remote method.
    Reply(String),
    /// Human-readable failure description.
    Error(String),
}

pub fn channel() -> (Notifier, OutcomeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Notifier(tx), OutcomeReceiver(rx))
}

/// Worker side. Never blocks.
#[derive(Debug, Clone)]
pub struct Notifier(mpsc::UnboundedSender<Outcome>);

impl Notifier {
    pub fn notify(&self, outcome: Outcome) {
        // A UI that has gone away is not an error for the worker.
        if self.0.send(outcome).is_err() {
            tracing::debug!("outcome dropped, receiver closed");
        }
    }
}

/// UI side. Single consumer.
#[derive(Debug)]
pub struct OutcomeReceiver(mpsc::UnboundedReceiver<Outcome>);

impl OutcomeReceiver {
    /// Next outcome; `None` once the worker has ended and everything was delivered.
    pub async fn recv(&mut self) -> Option<Outcome> {
        self.0.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Outcome> {
        self.0.try_recv().ok()
    }

    /// For hosts without an async runtime. Panics if called from inside one.
    pub fn blocking_recv(&mut self) -> Option<Outcome> {
        self.0.blocking_recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivered_in_emission_order() {
        let (n, mut rx) = channel();
        n.notify(Outcome::ShowProgress);
        n.notify(Outcome::Echo("hi".into()));
        n.notify(Outcome::Reply("hi".into()));
        drop(n);
        assert_eq!(rx.blocking_recv(), Some(Outcome::ShowProgress));
        assert_eq!(rx.blocking_recv(), Some(Outcome::Echo("hi".into())));
        assert_eq!(rx.blocking_recv(), Some(Outcome::Reply("hi".into())));
        assert_eq!(rx.blocking_recv(), None);
    }

    #[test]
    fn notify_without_receiver_is_silent() {
        let (n, rx) = channel();
        drop(rx);
        n.notify(Outcome::HideProgress);
    }

    #[tokio::test]
    async fn async_receive() {
        let (n, mut rx) = channel();
        std::thread::spawn(move || n.notify(Outcome::Error("boom".into())));
        assert_eq!(rx.recv().await, Some(Outcome::Error("boom".into())));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn serializes_tagged() {
        let json = serde_json::to_string(&Outcome::Reply("pong".into())).unwrap();
        assert_eq!(json, r#"{"kind":"reply","text":"pong"}"#);
        let json = serde_json::to_string(&Outcome::ShowProgress).unwrap();
        assert_eq!(json, r#"{"kind":"show_progress"}"#);
    }
}
