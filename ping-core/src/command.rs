//! Dispatch queue: commands for the worker, drained strictly in enqueue order.

use tokio::sync::mpsc;

use crate::transport::{DiscoveryListener, TransportMask};

/// Work item for the bus worker. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start discovery of groups matching the configured prefix.
    Connect,
    /// Join an advertised group (queued by the discovery listener).
    JoinSession(String),
    /// Invoke the remote method with this argument.
    Call(String),
    /// An advertisement went away (queued by the discovery listener).
    GroupLost(String),
    /// Tear down and stop the worker. Always the last command processed.
    Disconnect,
}

/// Create an unbounded command queue.
pub fn channel() -> (CommandSender, CommandQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender(tx), CommandQueue(rx))
}

/// Producer side. Cheap to clone; usable from any thread.
#[derive(Debug, Clone)]
pub struct CommandSender(mpsc::UnboundedSender<Command>);

impl CommandSender {
    /// Enqueue a command. Fails once the worker has processed `Disconnect`.
    pub fn send(&self, command: Command) -> Result<(), QueueClosed> {
        self.0.send(command).map_err(|e| QueueClosed(e.0))
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// The rejected command is handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("command queue closed, dropped {0:?}")]
pub struct QueueClosed(pub Command);

/// Consumer side. Owned by the worker thread.
#[derive(Debug)]
pub struct CommandQueue(mpsc::UnboundedReceiver<Command>);

impl CommandQueue {
    /// Block the current thread until the next command arrives.
    /// Returns `None` when every sender is gone.
    ///
    /// Panics if called from inside an async runtime.
    pub fn blocking_next(&mut self) -> Option<Command> {
        self.0.blocking_recv()
    }

    pub fn try_next(&mut self) -> Option<Command> {
        self.0.try_recv().ok()
    }

    /// Refuse further commands. Anything still buffered is discarded with the queue.
    pub fn close(&mut self) {
        self.0.close();
    }
}

/// Turns bus discovery callbacks into queued commands. Never touches session state.
pub struct QueueListener {
    commands: CommandSender,
}

impl QueueListener {
    pub fn new(commands: CommandSender) -> Self {
        Self { commands }
    }
}

impl DiscoveryListener for QueueListener {
    fn found(&self, group: &str, transport: TransportMask) {
        tracing::info!(group, transport = %format!("{:#06x}", transport), "found advertised name");
        // The worker decides whether to act on it; after teardown the send just fails.
        let _ = self.commands.send(Command::JoinSession(group.to_string()));
    }

    fn lost(&self, group: &str) {
        tracing::info!(group, "group lost");
        let _ = self.commands.send(Command::GroupLost(group.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_single_producer() {
        let (tx, mut rx) = channel();
        tx.send(Command::Connect).unwrap();
        tx.send(Command::Call("a".into())).unwrap();
        tx.send(Command::Disconnect).unwrap();
        assert_eq!(rx.try_next(), Some(Command::Connect));
        assert_eq!(rx.try_next(), Some(Command::Call("a".into())));
        assert_eq!(rx.try_next(), Some(Command::Disconnect));
        assert_eq!(rx.try_next(), None);
    }

    #[test]
    fn per_producer_order_kept_across_threads() {
        let (tx, mut rx) = channel();
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let tx = tx.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        tx.send(Command::Call(format!("{p}:{i}"))).unwrap();
                    }
                })
            })
            .collect();
        drop(tx);
        for h in producers {
            h.join().unwrap();
        }

        let mut next = [0u32; 4];
        let mut total = 0;
        while let Some(cmd) = rx.blocking_next() {
            let Command::Call(arg) = cmd else {
                panic!("unexpected {cmd:?}");
            };
            let (p, i) = arg.split_once(':').unwrap();
            let p: usize = p.parse().unwrap();
            let i: u32 = i.parse().unwrap();
            assert_eq!(i, next[p], "producer {p} out of order");
            next[p] += 1;
            total += 1;
        }
        assert_eq!(total, 400);
    }

    #[test]
    fn send_after_close_hands_command_back() {
        let (tx, mut rx) = channel();
        rx.close();
        assert!(tx.is_closed());
        let err = tx.send(Command::Call("late".into())).unwrap_err();
        assert_eq!(err.0, Command::Call("late".into()));
    }

    #[test]
    fn listener_enqueues_only() {
        let (tx, mut rx) = channel();
        let listener = QueueListener::new(tx);
        listener.found("org.alljoyn.bus.samples.simple.a", crate::transport::TRANSPORT_LOCAL);
        listener.lost("org.alljoyn.bus.samples.simple.a");
        assert_eq!(
            rx.try_next(),
            Some(Command::JoinSession("org.alljoyn.bus.samples.simple.a".into()))
        );
        assert_eq!(
            rx.try_next(),
            Some(Command::GroupLost("org.alljoyn.bus.samples.simple.a".into()))
        );
    }
}
