//! # Connection supervision
//!
//! [`ConnectionSupervisor`] runs the session on a single worker task and owns
//! the only link to the device.
//!
//! ```text
//!   handle ── SupervisorAction ──► worker ──► Session (sans-IO)
//!      ▲                             │            │ Outbound
//!      │ watch<SessionStatus>        │            ▼
//!      │ broadcast<SessionNotice> ◄──┤   spawned transport calls
//!                                    │            │
//!                                    └◄── Completion / DialOutcome
//! ```
//!
//! The worker is the cooperative scheduler: it sleeps until the session's next
//! wakeup, runs [`Session::tick`] and spawns each resulting transport call as
//! its own task, so axis, channel and command sends may interleave on the
//! shared transport.

pub mod lifecycle;

use crate::control::AxisTriple;
use crate::session::{
    Clock, Completion, InputEvent, LinkState, Outbound, Request, Session, SessionNotice,
    SessionSettings,
};
use crate::transport::{Transport, TransportError};
use chrono::{DateTime, Local};
use lifecycle::{Dialing, Established, Idle, Link};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const ACTION_CAPACITY: usize = 64;
const NOTICE_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SupervisorError {
    #[error("a link is already {state}")]
    AlreadyActive { state: LinkState },

    #[error("no device connected")]
    NotConnected,

    #[error("connect attempt cancelled")]
    Cancelled,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("connection supervisor is not running")]
    ChannelClosed,
}

/// Snapshot published after every worker step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionStatus {
    pub link: LinkState,
    pub usable: bool,
    pub address: Option<String>,
    pub axes: AxisTriple,
    pub connected_since: Option<DateTime<Local>>,
    pub last_activity: Option<DateTime<Local>>,
}

type Reply = oneshot::Sender<Result<(), SupervisorError>>;

#[derive(Debug)]
enum SupervisorAction {
    Connect { address: String, response_tx: Reply },
    Disconnect { response_tx: Reply },
    Input(InputEvent),
}

/// Handle to the supervisor worker.
#[derive(Debug)]
pub struct ConnectionSupervisor {
    tx: mpsc::Sender<SupervisorAction>,
    status_rx: watch::Receiver<SessionStatus>,
    notice_tx: broadcast::Sender<SessionNotice>,
    cancel: CancellationToken,
    worker: Option<JoinHandle<()>>,
}

impl ConnectionSupervisor {
    /// Starts the worker. The clock must follow tokio's timer, as the worker
    /// sleeps on tokio instants derived from it.
    pub fn spawn<C: Clock>(
        transport: Arc<dyn Transport>,
        settings: SessionSettings,
        clock: C,
    ) -> Self {
        let (tx, rx) = mpsc::channel(ACTION_CAPACITY);
        let (status_tx, status_rx) = watch::channel(SessionStatus::default());
        let (notice_tx, _) = broadcast::channel(NOTICE_CAPACITY);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (dial_tx, dial_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let worker = Worker {
            session: Session::init(settings),
            transport,
            clock,
            slot: LinkSlot::Idle(Link::<Idle>::create()),
            completion_tx,
            dial_tx,
            status_tx,
            notice_tx: notice_tx.clone(),
            attempt: 0,
            last_activity: None,
        };
        let handle = tokio::spawn(worker.run(rx, completion_rx, dial_rx, cancel.clone()));

        Self {
            tx,
            status_rx,
            notice_tx,
            cancel,
            worker: Some(handle),
        }
    }

    /// Resolves once the device is connected or the attempt has failed.
    pub async fn connect(&self, address: &str) -> Result<(), SupervisorError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(SupervisorAction::Connect {
            address: address.to_string(),
            response_tx,
        })
        .await?;
        response_rx
            .await
            .map_err(|_| SupervisorError::ChannelClosed)?
    }

    pub async fn disconnect(&self) -> Result<(), SupervisorError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(SupervisorAction::Disconnect { response_tx })
            .await?;
        response_rx
            .await
            .map_err(|_| SupervisorError::ChannelClosed)?
    }

    pub async fn submit(&self, event: InputEvent) -> Result<(), SupervisorError> {
        self.send(SupervisorAction::Input(event)).await
    }

    pub fn status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    pub fn notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notice_tx.subscribe()
    }

    /// Stops the worker, disconnecting from the device first if needed.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                error!("Supervisor worker ended abnormally: {}", e);
            }
        }
    }

    async fn send(&self, action: SupervisorAction) -> Result<(), SupervisorError> {
        self.tx
            .send(action)
            .await
            .map_err(|_| SupervisorError::ChannelClosed)
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct PendingDial {
    link: Link<Dialing>,
    attempt: u64,
    response_tx: Reply,
    task: JoinHandle<()>,
}

enum LinkSlot {
    Idle(Link<Idle>),
    Dialing(PendingDial),
    Established(Link<Established>),
}

struct DialOutcome {
    attempt: u64,
    result: Result<(), TransportError>,
}

struct Worker<C> {
    session: Session,
    transport: Arc<dyn Transport>,
    clock: C,
    slot: LinkSlot,
    completion_tx: mpsc::UnboundedSender<Completion>,
    dial_tx: mpsc::UnboundedSender<DialOutcome>,
    status_tx: watch::Sender<SessionStatus>,
    notice_tx: broadcast::Sender<SessionNotice>,
    attempt: u64,
    last_activity: Option<DateTime<Local>>,
}

impl<C: Clock> Worker<C> {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<SupervisorAction>,
        mut completion_rx: mpsc::UnboundedReceiver<Completion>,
        mut dial_rx: mpsc::UnboundedReceiver<DialOutcome>,
        cancel: CancellationToken,
    ) {
        info!("Connection supervisor started");

        loop {
            let wakeup = self.session.next_wakeup();
            let deadline =
                tokio::time::Instant::from_std(wakeup.unwrap_or_else(|| self.clock.now()));

            tokio::select! {
                _ = cancel.cancelled() => break,
                action = rx.recv() => match action {
                    Some(action) => self.on_action(action).await,
                    None => break,
                },
                Some(completion) = completion_rx.recv() => self.session.complete(completion),
                Some(outcome) = dial_rx.recv() => self.on_dial_outcome(outcome),
                _ = tokio::time::sleep_until(deadline), if wakeup.is_some() => self.on_tick(),
            }

            self.publish();
        }

        match self.disconnect().await {
            Ok(()) | Err(SupervisorError::NotConnected) => {}
            Err(e) => {
                warn!("Disconnect during shutdown failed: {}", e);
                self.session.teardown();
            }
        }
        self.publish();
        info!("Connection supervisor stopped");
    }

    async fn on_action(&mut self, action: SupervisorAction) {
        match action {
            SupervisorAction::Connect {
                address,
                response_tx,
            } => self.connect(address, response_tx),
            SupervisorAction::Disconnect { response_tx } => {
                let result = self.disconnect().await;
                if response_tx.send(result).is_err() {
                    debug!("Disconnect caller went away");
                }
            }
            SupervisorAction::Input(event) => self.on_input(event),
        }
    }

    fn connect(&mut self, address: String, response_tx: Reply) {
        let link = match self.take_slot() {
            LinkSlot::Idle(link) => link,
            other => {
                let state = self.session.link();
                warn!("Connect to {} rejected, link is {}", address, state);
                self.slot = other;
                let _ = response_tx.send(Err(SupervisorError::AlreadyActive { state }));
                return;
            }
        };

        let link = link.dial(&address);
        self.attempt += 1;
        let attempt = self.attempt;
        self.session.begin_connecting();

        let transport = Arc::clone(&self.transport);
        let dial_tx = self.dial_tx.clone();
        let task = tokio::spawn(async move {
            let result = transport.connect(&address).await;
            let _ = dial_tx.send(DialOutcome { attempt, result });
        });

        self.slot = LinkSlot::Dialing(PendingDial {
            link,
            attempt,
            response_tx,
            task,
        });
    }

    fn on_dial_outcome(&mut self, outcome: DialOutcome) {
        let pending = match self.take_slot() {
            LinkSlot::Dialing(pending) if pending.attempt == outcome.attempt => pending,
            other => {
                debug!("Ignoring outcome of superseded dial {}", outcome.attempt);
                self.slot = other;
                return;
            }
        };

        let result = match outcome.result {
            Ok(()) => {
                self.session.on_connected(self.clock.now());
                self.slot = LinkSlot::Established(pending.link.establish());
                Ok(())
            }
            Err(e) => {
                error!("Connect to {} failed: {}", pending.link.address(), e);
                self.session.on_connect_failed();
                self.slot = LinkSlot::Idle(pending.link.abandon());
                Err(SupervisorError::Transport(e))
            }
        };
        if pending.response_tx.send(result).is_err() {
            debug!("Connect caller went away");
        }
    }

    async fn disconnect(&mut self) -> Result<(), SupervisorError> {
        match self.take_slot() {
            LinkSlot::Idle(link) => {
                self.slot = LinkSlot::Idle(link);
                Err(SupervisorError::NotConnected)
            }
            LinkSlot::Dialing(pending) => {
                info!("Cancelling dial to {}", pending.link.address());
                pending.task.abort();
                let _ = pending.response_tx.send(Err(SupervisorError::Cancelled));
                if let Err(e) = self.transport.disconnect().await {
                    debug!("Disconnect after cancelled dial failed: {}", e);
                }
                self.session.teardown();
                self.slot = LinkSlot::Idle(pending.link.abandon());
                Ok(())
            }
            LinkSlot::Established(link) => {
                self.send_stop().await;
                match self.transport.disconnect().await {
                    Ok(()) => {
                        self.session.teardown();
                        self.slot = LinkSlot::Idle(link.close());
                        Ok(())
                    }
                    Err(e) => {
                        error!("Disconnect from {} failed: {}", link.address(), e);
                        self.slot = LinkSlot::Established(link);
                        Err(SupervisorError::Transport(e))
                    }
                }
            }
        }
    }

    // Leaves the device stopped even if the last dispatched frames were lost.
    async fn send_stop(&self) {
        let stop = AxisTriple::CENTER;
        if let Err(e) = self.transport.send_axes(stop.x, stop.y, stop.r).await {
            debug!("Stop frame before disconnect failed: {}", e);
        }
    }

    fn on_input(&mut self, event: InputEvent) {
        if let InputEvent::LinkChanged { state } = &event {
            if *state != LinkState::Disconnected {
                warn!("Ignoring external link change to {}", state);
                return;
            }
        }

        self.last_activity = Some(Local::now());
        if let Some(outbound) = self.session.handle(event, self.clock.now()) {
            self.execute(outbound);
        }
        self.sync_slot();
    }

    /// Follows a session that dropped its link on its own.
    fn sync_slot(&mut self) {
        if self.session.link() != LinkState::Disconnected {
            return;
        }
        self.slot = match self.take_slot() {
            LinkSlot::Established(link) => {
                warn!("Link to {} lost", link.address());
                LinkSlot::Idle(link.close())
            }
            LinkSlot::Dialing(pending) => {
                pending.task.abort();
                let _ = pending.response_tx.send(Err(SupervisorError::Cancelled));
                LinkSlot::Idle(pending.link.abandon())
            }
            idle => idle,
        };
    }

    fn on_tick(&mut self) {
        let now = self.clock.now();
        for outbound in self.session.tick(now) {
            self.execute(outbound);
        }
    }

    fn execute(&self, outbound: Outbound) {
        let transport = Arc::clone(&self.transport);
        let completion_tx = self.completion_tx.clone();
        let generation = outbound.generation;

        tokio::spawn(async move {
            let completion = match outbound.request {
                Request::Axes(triple) => Completion::Axes {
                    generation,
                    result: transport.send_axes(triple.x, triple.y, triple.r).await,
                },
                Request::Channel { channel, value } => Completion::Channel {
                    generation,
                    channel,
                    value,
                    result: transport.send_channel_value(channel, value).await,
                },
                Request::Command(command) => Completion::Command {
                    generation,
                    command,
                    result: transport.send_command(command).await,
                },
                Request::PollUsability => Completion::Poll {
                    generation,
                    result: transport.poll_usability().await,
                },
            };
            let _ = completion_tx.send(completion);
        });
    }

    fn publish(&mut self) {
        for notice in self.session.take_notices() {
            // No subscribers is fine.
            let _ = self.notice_tx.send(notice);
        }

        let status = self.snapshot();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    fn snapshot(&self) -> SessionStatus {
        let (address, connected_since) = match &self.slot {
            LinkSlot::Idle(_) => (None, None),
            LinkSlot::Dialing(pending) => (Some(pending.link.address().to_string()), None),
            LinkSlot::Established(link) => {
                (Some(link.address().to_string()), link.established_at())
            }
        };

        SessionStatus {
            link: self.session.link(),
            usable: self.session.usable(),
            address,
            axes: self.session.axes().current(),
            connected_since,
            last_activity: self.last_activity,
        }
    }

    fn take_slot(&mut self) -> LinkSlot {
        std::mem::replace(&mut self.slot, LinkSlot::Idle(Link::<Idle>::create()))
    }
}
