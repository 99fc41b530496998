//! Session controller: owns the session and executes commands against the transport.
//!
//! `BusHandler` is a plain synchronous state machine. All of its methods run on the
//! worker thread; discovery callbacks only reach it through the command queue.

use std::ops::ControlFlow;
use std::sync::Arc;

use crate::command::{Command, CommandQueue, CommandSender, QueueListener};
use crate::config::ClientConfig;
use crate::identity::PeerId;
use crate::outcome::{Notifier, Outcome};
use crate::transport::{RemoteHandle, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Discovering,
    Joined,
    /// Terminal.
    Disconnected,
}

/// The one session a controller owns. `remote` is `Some` only while `Joined`.
pub struct Session {
    state: SessionState,
    group: Option<String>,
    host: Option<PeerId>,
    remote: Option<Box<dyn RemoteHandle>>,
    /// The joined group's advertisement went away; the handle is kept until replaced.
    advertisement_lost: bool,
}

impl Session {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            group: None,
            host: None,
            remote: None,
            advertisement_lost: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn host(&self) -> Option<PeerId> {
        self.host
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn advertisement_lost(&self) -> bool {
        self.advertisement_lost
    }

    /// A newly found group may be joined unless we hold a live session.
    fn accepts_join(&self) -> bool {
        match self.state {
            SessionState::Discovering => true,
            SessionState::Joined => self.advertisement_lost,
            SessionState::Idle | SessionState::Disconnected => false,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("group", &self.group)
            .field("host", &self.host)
            .field("has_remote", &self.remote.is_some())
            .field("advertisement_lost", &self.advertisement_lost)
            .finish()
    }
}

/// Executes one command at a time against the transport and reports outcomes.
pub struct BusHandler<T: Transport> {
    transport: T,
    config: ClientConfig,
    session: Session,
    /// Handed to the discovery listener so callbacks can queue work.
    commands: CommandSender,
    notifier: Notifier,
}

impl<T: Transport> BusHandler<T> {
    pub fn new(
        transport: T,
        config: ClientConfig,
        commands: CommandSender,
        notifier: Notifier,
    ) -> Self {
        Self {
            transport,
            config,
            session: Session::new(),
            commands,
            notifier,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Drain `queue` until `Disconnect` has been processed.
    pub fn run(mut self, mut queue: CommandQueue) {
        while let Some(command) = queue.blocking_next() {
            if self.handle(command).is_break() {
                queue.close();
                break;
            }
        }
        tracing::debug!("bus handler stopped");
    }

    /// Execute one command start to finish. `Break` after `Disconnect`.
    pub fn handle(&mut self, command: Command) -> ControlFlow<()> {
        tracing::debug!(?command, state = ?self.session.state, "dispatch");
        match command {
            Command::Connect => self.connect(),
            Command::JoinSession(group) => self.join_session(&group),
            Command::Call(argument) => self.call(&argument),
            Command::GroupLost(group) => self.group_lost(&group),
            Command::Disconnect => {
                self.disconnect();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn connect(&mut self) {
        if self.session.state != SessionState::Idle {
            tracing::warn!(state = ?self.session.state, "connect ignored, already connected");
            return;
        }
        self.notifier.notify(Outcome::ShowProgress);
        let listener = Arc::new(QueueListener::new(self.commands.clone()));
        match self
            .transport
            .start_discovery(&self.config.group_prefix, listener)
        {
            Ok(()) => {
                tracing::info!(prefix = %self.config.group_prefix, "discovery started");
                self.session.state = SessionState::Discovering;
            }
            Err(e) => {
                let msg = format!("start_discovery({}): {}", self.config.group_prefix, e);
                self.report_error(msg);
            }
        }
    }

    fn join_session(&mut self, group: &str) {
        if !self.session.accepts_join() {
            tracing::debug!(group, state = ?self.session.state, "join skipped");
            return;
        }
        match self.bind(group) {
            Ok((host, remote)) => {
                tracing::info!(group, %host, "joined group");
                if let Some(old) = self.session.group.take().filter(|g| g != group) {
                    self.transport.leave_group(&old);
                }
                self.session.state = SessionState::Joined;
                self.session.group = Some(group.to_string());
                self.session.host = Some(host);
                self.session.remote = Some(remote);
                self.session.advertisement_lost = false;
                self.notifier.notify(Outcome::HideProgress);
            }
            Err(e) => self.report_error(format!("join_group({}): {}", group, e)),
        }
    }

    /// Join `group` and resolve the proxy for the configured object.
    /// A group that was joined but could not be bound is left again.
    fn bind(&mut self, group: &str) -> Result<(PeerId, Box<dyn RemoteHandle>), TransportError> {
        self.transport.join_group(group)?;
        let resolved = self.resolve(group);
        if resolved.is_err() {
            self.transport.leave_group(group);
        }
        resolved
    }

    fn resolve(&self, group: &str) -> Result<(PeerId, Box<dyn RemoteHandle>), TransportError> {
        let host = self.transport.host_peer(group)?;
        let remote = self.transport.remote_handle(
            host,
            group,
            &self.config.object_path,
            &self.config.interface,
        )?;
        Ok((host, remote))
    }

    fn group_lost(&mut self, group: &str) {
        // Handle and state are kept; the UI goes back to "searching".
        if self.session.group.as_deref() == Some(group) {
            self.session.advertisement_lost = true;
        }
        self.notifier.notify(Outcome::ShowProgress);
    }

    fn call(&mut self, argument: &str) {
        let Some(remote) = self.session.remote.as_ref() else {
            tracing::debug!("no session joined, call dropped");
            return;
        };
        self.notifier.notify(Outcome::Echo(argument.to_string()));
        match remote.invoke(&self.config.method, argument) {
            Ok(reply) => self.notifier.notify(Outcome::Reply(reply)),
            Err(e) => {
                let msg = format!("{}({}): {}", self.config.method, argument, e);
                self.report_error(msg);
            }
        }
    }

    fn disconnect(&mut self) {
        self.session.remote = None;
        if self.session.state != SessionState::Idle {
            self.transport.teardown();
        }
        self.session.state = SessionState::Disconnected;
        self.session.group = None;
        self.session.host = None;
        self.session.advertisement_lost = false;
        tracing::info!("disconnected");
    }

    fn report_error(&self, msg: String) {
        tracing::error!("{}", msg);
        self.notifier.notify(Outcome::Error(msg));
    }
}
