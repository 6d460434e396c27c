//! # Session core
//!
//! One [`Session`] value owns everything that changes while operating the arm:
//! link state, the usability flag, the axis state, pointer arbitration, the
//! per-channel debounce queues, the periodic tasks and command debounce.
//!
//! The session performs no I/O and reads no clock. Callers feed it
//! [`InputEvent`]s and the current time, call [`Session::tick`] whenever
//! [`Session::next_wakeup`] comes due, execute the returned [`Outbound`]
//! requests against a transport and report the results through
//! [`Session::complete`].
//!
//! ```text
//!             InputEvent                       Outbound
//!   ui ───────────────────► Session::handle ───────────► transport
//!                                 │                          │
//!   scheduler ── tick(now) ──► Session::tick ──────────────► │
//!                                 ▲                          │
//!                                 └──── complete(Completion) ┘
//! ```
//!
//! Every outbound request is stamped with the session generation. Resetting or
//! tearing down bumps the generation, so results that arrive late from a
//! previous connection are discarded.

pub mod cadence;
pub mod clock;
pub mod dispatcher;
pub mod poller;

use crate::control::{
    axis::DEFAULT_ZERO_RESEND_BUDGET, channel::DEFAULT_CHANNEL_DEBOUNCE,
    command::DEFAULT_COMMAND_DEBOUNCE, AxisState, AxisTriple, Channel, ChannelQueue, Command,
    CommandInvoker, CommandRejection, ContactId, JoystickGeometry, Point, PointerArbiter,
    AXIS_CENTER,
};
use crate::transport::TransportError;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub use cadence::Cadence;
pub use clock::{Clock, TokioClock};
pub use dispatcher::{AxisDispatcher, DEFAULT_DISPATCH_INTERVAL};
pub use poller::{UsabilityPoller, DEFAULT_POLL_INTERVAL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Timing and layout knobs for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub dispatch_interval: Duration,
    pub poll_interval: Duration,
    pub channel_debounce: Duration,
    pub command_debounce: Duration,
    pub zero_resend_budget: u32,
    pub geometry: JoystickGeometry,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            dispatch_interval: DEFAULT_DISPATCH_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            channel_debounce: DEFAULT_CHANNEL_DEBOUNCE,
            command_debounce: DEFAULT_COMMAND_DEBOUNCE,
            zero_resend_budget: DEFAULT_ZERO_RESEND_BUDGET,
            geometry: JoystickGeometry::default(),
        }
    }
}

/// Everything that can happen to a session from the outside.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    ContactStart { contact: ContactId, point: Point },
    ContactMove { contact: ContactId, point: Point },
    ContactEnd { contact: ContactId },
    ChannelInput { channel: Channel, value: u8 },
    RotationInput { value: u8 },
    RotationRelease,
    CommandInvoke { command: Command },
    UsabilityChanged { usable: bool },
    LinkChanged { state: LinkState },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Axes(AxisTriple),
    Channel { channel: Channel, value: u8 },
    Command(Command),
    PollUsability,
}

/// A transport call the session wants made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outbound {
    pub generation: u64,
    pub request: Request,
}

/// Result of an [`Outbound`] request.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Axes {
        generation: u64,
        result: Result<(), TransportError>,
    },
    Channel {
        generation: u64,
        channel: Channel,
        value: u8,
        result: Result<(), TransportError>,
    },
    Command {
        generation: u64,
        command: Command,
        result: Result<(), TransportError>,
    },
    Poll {
        generation: u64,
        result: Result<bool, TransportError>,
    },
}

impl Completion {
    pub fn generation(&self) -> u64 {
        match self {
            Completion::Axes { generation, .. }
            | Completion::Channel { generation, .. }
            | Completion::Command { generation, .. }
            | Completion::Poll { generation, .. } => *generation,
        }
    }
}

/// Observable transitions, drained with [`Session::take_notices`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    LinkChanged { state: LinkState },
    UsabilityChanged { usable: bool },
    CommandRejected {
        command: Command,
        reason: CommandRejection,
    },
}

#[derive(Debug)]
pub struct Session {
    settings: SessionSettings,
    link: LinkState,
    usable: bool,
    axes: AxisState,
    arbiter: PointerArbiter,
    channels: BTreeMap<Channel, ChannelQueue>,
    rotation: ChannelQueue,
    dispatcher: AxisDispatcher,
    poller: UsabilityPoller,
    invoker: CommandInvoker,
    generation: u64,
    notices: Vec<SessionNotice>,
}

impl Session {
    pub fn init(settings: SessionSettings) -> Self {
        let channels = Channel::ALL
            .into_iter()
            .map(|channel| (channel, ChannelQueue::new(settings.channel_debounce)))
            .collect();

        Self {
            link: LinkState::Disconnected,
            usable: false,
            axes: AxisState::new(settings.zero_resend_budget),
            arbiter: PointerArbiter::new(settings.geometry),
            channels,
            rotation: ChannelQueue::new(settings.channel_debounce),
            dispatcher: AxisDispatcher::new(settings.dispatch_interval),
            poller: UsabilityPoller::new(settings.poll_interval),
            invoker: CommandInvoker::new(settings.command_debounce),
            generation: 0,
            notices: Vec::new(),
            settings,
        }
    }

    /// Fresh per-connection state. Contacts still on the surface are kept.
    pub fn reset(&mut self) {
        self.axes = AxisState::new(self.settings.zero_resend_budget);
        self.cancel_queues();
        self.dispatcher.stop();
        self.poller.stop();
        self.invoker.clear();
        self.usable = false;
        self.generation += 1;
    }

    pub fn begin_connecting(&mut self) {
        if self.link == LinkState::Disconnected {
            self.set_link(LinkState::Connecting);
        }
    }

    pub fn on_connected(&mut self, now: Instant) {
        self.reset();
        self.set_link(LinkState::Connected);
        self.poller.start(now);
        self.dispatcher.start(now);
    }

    /// Rolls a failed attempt back to Disconnected.
    pub fn on_connect_failed(&mut self) {
        if self.link == LinkState::Connecting {
            self.set_link(LinkState::Disconnected);
        }
    }

    /// Stops all periodic work, drops pending values and centers the axes.
    pub fn teardown(&mut self) {
        self.cancel_queues();
        self.axes.reset_to_center();
        self.dispatcher.stop();
        self.poller.stop();
        self.generation += 1;

        if self.usable {
            self.usable = false;
            self.notices.push(SessionNotice::UsabilityChanged { usable: false });
        }
        self.set_link(LinkState::Disconnected);
    }

    pub fn handle(&mut self, event: InputEvent, now: Instant) -> Option<Outbound> {
        match event {
            InputEvent::ContactStart { contact, point } => {
                self.arbiter.on_contact_start(contact, point, &mut self.axes);
            }
            InputEvent::ContactMove { contact, point } => {
                self.arbiter.on_contact_move(contact, point, &mut self.axes);
            }
            InputEvent::ContactEnd { contact } => {
                self.arbiter.on_contact_end(contact, &mut self.axes);
            }
            InputEvent::ChannelInput { channel, value } => {
                if let Some(queue) = self.channels.get_mut(&channel) {
                    queue.submit(value, now);
                }
            }
            InputEvent::RotationInput { value } => self.rotation.submit(value, now),
            InputEvent::RotationRelease => self.rotation.submit(AXIS_CENTER, now),
            InputEvent::CommandInvoke { command } => return self.invoke(command, now),
            InputEvent::UsabilityChanged { usable } => {
                if self.link == LinkState::Connected {
                    self.set_usable(usable);
                }
            }
            InputEvent::LinkChanged { state } => match state {
                LinkState::Disconnected if self.link != LinkState::Disconnected => {
                    warn!("Link reported lost while {}", self.link);
                    self.teardown();
                }
                LinkState::Connecting => self.begin_connecting(),
                LinkState::Connected if self.link != LinkState::Connected => {
                    self.on_connected(now)
                }
                _ => {}
            },
        }
        None
    }

    /// Runs every timer and periodic task that is due at `now`.
    pub fn tick(&mut self, now: Instant) -> Vec<Outbound> {
        let permitted = self.is_permitted();
        let mut requests = Vec::new();

        for (channel, queue) in self.channels.iter_mut() {
            if let Some(value) = queue.expire(now) {
                if permitted {
                    requests.push(Request::Channel {
                        channel: *channel,
                        value,
                    });
                } else {
                    debug!("Dropping {} = {} (control not permitted)", channel, value);
                }
            }
        }

        if let Some(r) = self.rotation.expire(now) {
            if permitted {
                self.axes.set_r(r);
            } else {
                debug!("Dropping rotation {} (control not permitted)", r);
            }
        }

        if self.link == LinkState::Connected && self.poller.tick(now) {
            requests.push(Request::PollUsability);
        }

        if let Some(triple) = self.dispatcher.tick(now, &self.axes, permitted) {
            requests.push(Request::Axes(triple));
        }

        requests
            .into_iter()
            .map(|request| self.outbound(request))
            .collect()
    }

    /// Earliest instant at which [`Session::tick`] has work to do.
    pub fn next_wakeup(&self) -> Option<Instant> {
        self.channels
            .values()
            .map(ChannelQueue::deadline)
            .chain([
                self.rotation.deadline(),
                self.poller.next_due(),
                self.dispatcher.next_due(),
            ])
            .flatten()
            .min()
    }

    pub fn complete(&mut self, completion: Completion) {
        if completion.generation() != self.generation {
            debug!(
                "Ignoring stale completion from generation {}",
                completion.generation()
            );
            return;
        }

        match completion {
            Completion::Axes { result, .. } => {
                if let Err(e) = &result {
                    log_send_error("axes", e);
                }
                self.dispatcher.complete(&mut self.axes, result.is_ok());
            }
            Completion::Channel {
                channel,
                value,
                result: Err(e),
                ..
            } => {
                log_send_error(&format!("channel {channel} = {value}"), &e);
            }
            Completion::Channel { .. } => {}
            Completion::Command {
                command,
                result: Err(e),
                ..
            } => {
                warn!("Command {} failed: {}", command, e);
            }
            Completion::Command { command, .. } => {
                debug!("Command {} delivered", command);
            }
            Completion::Poll { result, .. } => {
                let usable = self.poller.complete(&result);
                if self.link == LinkState::Connected {
                    self.set_usable(usable);
                }
            }
        }
    }

    pub fn take_notices(&mut self) -> Vec<SessionNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn usable(&self) -> bool {
        self.usable
    }

    pub fn axes(&self) -> &AxisState {
        &self.axes
    }

    pub fn arbiter(&self) -> &PointerArbiter {
        &self.arbiter
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending_channel(&self, channel: Channel) -> Option<u8> {
        self.channels.get(&channel).and_then(ChannelQueue::pending)
    }

    /// Continuous control is only sent over a connected, usable link.
    pub fn is_permitted(&self) -> bool {
        self.link == LinkState::Connected && self.usable
    }

    fn invoke(&mut self, command: Command, now: Instant) -> Option<Outbound> {
        let connected = self.link == LinkState::Connected;
        match self.invoker.invoke(command, connected, now) {
            Ok(()) => {
                info!("Firing command {}", command);
                Some(self.outbound(Request::Command(command)))
            }
            Err(reason) => {
                if reason == CommandRejection::NotConnected {
                    warn!("Command {} ignored: {}", command, reason);
                }
                self.notices
                    .push(SessionNotice::CommandRejected { command, reason });
                None
            }
        }
    }

    fn set_usable(&mut self, usable: bool) {
        if self.usable == usable {
            return;
        }
        self.usable = usable;
        info!("Controller usability changed to {}", usable);

        if !usable {
            self.axes.reset_to_center();
            self.cancel_queues();
        }
        self.notices.push(SessionNotice::UsabilityChanged { usable });
    }

    fn set_link(&mut self, state: LinkState) {
        if self.link == state {
            return;
        }
        info!("Link {} -> {}", self.link, state);
        self.link = state;
        self.notices.push(SessionNotice::LinkChanged { state });
    }

    fn cancel_queues(&mut self) {
        for (channel, queue) in self.channels.iter_mut() {
            if let Some(value) = queue.cancel() {
                debug!("Discarded pending {} = {}", channel, value);
            }
        }
        self.rotation.cancel();
    }

    fn outbound(&self, request: Request) -> Outbound {
        Outbound {
            generation: self.generation,
            request,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::init(SessionSettings::default())
    }
}

// Only failures that say the control path is down are worth a warning.
fn log_send_error(what: &str, error: &TransportError) {
    if error.indicates_unusable() {
        warn!("Send of {} rejected: {}", what, error);
    } else {
        debug!("Send of {} failed: {}", what, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = DEFAULT_DISPATCH_INTERVAL;
    const MS: Duration = Duration::from_millis(1);

    fn ack(session: &mut Session, outbound: &Outbound) {
        let generation = outbound.generation;
        let completion = match outbound.request {
            Request::Axes(_) => Completion::Axes {
                generation,
                result: Ok(()),
            },
            Request::Channel { channel, value } => Completion::Channel {
                generation,
                channel,
                value,
                result: Ok(()),
            },
            Request::Command(command) => Completion::Command {
                generation,
                command,
                result: Ok(()),
            },
            Request::PollUsability => Completion::Poll {
                generation,
                result: Ok(true),
            },
        };
        session.complete(completion);
    }

    /// Ticks once and acknowledges everything immediately.
    fn step(session: &mut Session, now: Instant) -> Vec<Request> {
        let outbound = session.tick(now);
        for out in &outbound {
            ack(session, out);
        }
        outbound.into_iter().map(|out| out.request).collect()
    }

    fn axes_of(requests: &[Request]) -> Vec<AxisTriple> {
        requests
            .iter()
            .filter_map(|request| match request {
                Request::Axes(triple) => Some(*triple),
                _ => None,
            })
            .collect()
    }

    fn channels_of(requests: &[Request]) -> Vec<(Channel, u8)> {
        requests
            .iter()
            .filter_map(|request| match request {
                Request::Channel { channel, value } => Some((*channel, *value)),
                _ => None,
            })
            .collect()
    }

    /// Connected, usable session whose post-connect stop frames are drained.
    /// Returns the next dispatcher tick instant.
    fn connected() -> (Session, Instant) {
        let start = Instant::now();
        let mut session = Session::default();
        session.begin_connecting();
        session.on_connected(start);

        let mut now = start;
        for _ in 0..10 {
            step(&mut session, now);
            now += TICK;
        }
        assert!(session.usable());
        assert_eq!(session.axes().zero_resend_budget(), 0);
        session.take_notices();
        (session, now)
    }

    fn right_edge() -> Point {
        Point::new(178.0, 100.0)
    }

    #[test]
    fn drag_then_release_sends_position_then_five_stops() {
        let (mut session, mut now) = connected();

        session.handle(
            InputEvent::ContactStart {
                contact: ContactId::Touch(1),
                point: right_edge(),
            },
            now,
        );
        assert_eq!(
            axes_of(&step(&mut session, now)),
            vec![AxisTriple::new(255, 127, 127)]
        );

        session.handle(
            InputEvent::ContactEnd {
                contact: ContactId::Touch(1),
            },
            now,
        );
        let mut sent = Vec::new();
        for _ in 0..20 {
            now += TICK;
            sent.extend(axes_of(&step(&mut session, now)));
        }
        assert_eq!(sent, vec![AxisTriple::CENTER; 5]);
    }

    #[test]
    fn connecting_sends_stop_frames_once_usable() {
        let start = Instant::now();
        let mut session = Session::default();
        session.on_connected(start);

        // First poll is issued before any axes go out.
        assert_eq!(step(&mut session, start), vec![Request::PollUsability]);
        let mut sent = Vec::new();
        for n in 1..10 {
            sent.extend(axes_of(&step(&mut session, start + TICK * n)));
        }
        assert_eq!(sent, vec![AxisTriple::CENTER; 5]);
    }

    #[test]
    fn hand_off_never_sends_center() {
        let (mut session, now) = connected();
        session.handle(
            InputEvent::ContactStart {
                contact: ContactId::Touch(1),
                point: right_edge(),
            },
            now,
        );
        session.handle(
            InputEvent::ContactStart {
                contact: ContactId::Touch(2),
                point: Point::new(100.0, 178.0),
            },
            now,
        );
        let first = axes_of(&step(&mut session, now));

        session.handle(
            InputEvent::ContactEnd {
                contact: ContactId::Touch(1),
            },
            now,
        );
        let second = axes_of(&step(&mut session, now + TICK));

        assert_eq!(first, vec![AxisTriple::new(255, 127, 127)]);
        assert_eq!(second, vec![AxisTriple::new(127, 255, 127)]);
    }

    #[test]
    fn channel_burst_is_coalesced_to_last_value() {
        let (mut session, now) = connected();
        for (offset, value) in [(0, 10), (10, 20), (39, 30)] {
            session.handle(
                InputEvent::ChannelInput {
                    channel: Channel::A,
                    value,
                },
                now + MS * offset,
            );
        }

        assert!(channels_of(&step(&mut session, now + MS * 39)).is_empty());
        assert_eq!(
            channels_of(&step(&mut session, now + MS * 40)),
            vec![(Channel::A, 30)]
        );
        assert!(channels_of(&step(&mut session, now + MS * 200)).is_empty());
    }

    #[test]
    fn channels_are_independent() {
        let (mut session, now) = connected();
        session.handle(
            InputEvent::ChannelInput {
                channel: Channel::Claw,
                value: 1,
            },
            now,
        );
        session.handle(
            InputEvent::ChannelInput {
                channel: Channel::End,
                value: 2,
            },
            now + MS * 20,
        );

        assert_eq!(
            channels_of(&step(&mut session, now + MS * 40)),
            vec![(Channel::Claw, 1)]
        );
        assert_eq!(
            channels_of(&step(&mut session, now + MS * 60)),
            vec![(Channel::End, 2)]
        );
    }

    #[test]
    fn channel_value_expiring_while_unusable_is_dropped() {
        let (mut session, now) = connected();
        session.handle(InputEvent::UsabilityChanged { usable: false }, now);
        session.handle(
            InputEvent::ChannelInput {
                channel: Channel::B,
                value: 9,
            },
            now,
        );
        assert!(channels_of(&step(&mut session, now + MS * 40)).is_empty());
        assert_eq!(session.pending_channel(Channel::B), None);
    }

    #[test]
    fn usability_loss_cancels_timers_and_centers() {
        let (mut session, now) = connected();
        session.handle(
            InputEvent::ContactStart {
                contact: ContactId::Touch(1),
                point: right_edge(),
            },
            now,
        );
        session.handle(
            InputEvent::ChannelInput {
                channel: Channel::C,
                value: 77,
            },
            now,
        );

        session.handle(InputEvent::UsabilityChanged { usable: false }, now);

        assert_eq!(session.pending_channel(Channel::C), None);
        assert_eq!(session.axes().current(), AxisTriple::CENTER);
        assert_eq!(session.axes().zero_resend_budget(), 5);
        assert_eq!(
            session.take_notices(),
            vec![SessionNotice::UsabilityChanged { usable: false }]
        );
        assert!(session.tick(now + TICK).is_empty());
    }

    #[test]
    fn poll_failure_keeps_the_link() {
        let (mut session, _) = connected();
        let generation = session.generation();
        session.complete(Completion::Poll {
            generation,
            result: Err(TransportError::Timeout),
        });

        assert!(!session.usable());
        assert_eq!(session.link(), LinkState::Connected);
        assert_eq!(
            session.take_notices(),
            vec![SessionNotice::UsabilityChanged { usable: false }]
        );
    }

    #[test]
    fn stale_completion_is_ignored() {
        let (mut session, now) = connected();
        session.handle(
            InputEvent::ContactStart {
                contact: ContactId::Touch(1),
                point: right_edge(),
            },
            now,
        );
        let outbound = session.tick(now);
        assert_eq!(axes_of(&[outbound[0].request]), vec![AxisTriple::new(255, 127, 127)]);

        session.handle(
            InputEvent::LinkChanged {
                state: LinkState::Disconnected,
            },
            now,
        );
        ack(&mut session, &outbound[0]);
        assert_eq!(session.axes().last_sent(), AxisTriple::CENTER);
    }

    #[test]
    fn link_loss_tears_everything_down() {
        let (mut session, now) = connected();
        session.handle(
            InputEvent::ChannelInput {
                channel: Channel::A,
                value: 5,
            },
            now,
        );
        session.handle(
            InputEvent::LinkChanged {
                state: LinkState::Disconnected,
            },
            now,
        );

        assert_eq!(session.link(), LinkState::Disconnected);
        assert!(!session.usable());
        assert_eq!(session.next_wakeup(), None);
        assert_eq!(
            session.take_notices(),
            vec![
                SessionNotice::UsabilityChanged { usable: false },
                SessionNotice::LinkChanged {
                    state: LinkState::Disconnected
                },
            ]
        );
        assert!(session.tick(now + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn commands_need_a_link_and_are_debounced() {
        let now = Instant::now();
        let mut session = Session::default();
        let invoke = InputEvent::CommandInvoke {
            command: Command::Grab,
        };

        assert_eq!(session.handle(invoke.clone(), now), None);
        assert_eq!(
            session.take_notices(),
            vec![SessionNotice::CommandRejected {
                command: Command::Grab,
                reason: CommandRejection::NotConnected,
            }]
        );

        session.on_connected(now);
        let first = session.handle(invoke.clone(), now);
        let second = session.handle(invoke, now + MS * 50);
        assert_eq!(first.map(|out| out.request), Some(Request::Command(Command::Grab)));
        assert_eq!(second, None);
    }

    #[test]
    fn commands_do_not_need_usability() {
        let now = Instant::now();
        let mut session = Session::default();
        session.on_connected(now);
        assert!(!session.usable());
        assert!(session
            .handle(
                InputEvent::CommandInvoke {
                    command: Command::Throw
                },
                now
            )
            .is_some());
    }

    #[test]
    fn rotation_slider_drives_r_through_debounce() {
        let (mut session, now) = connected();
        session.handle(InputEvent::RotationInput { value: 180 }, now);
        session.handle(InputEvent::RotationInput { value: 200 }, now + MS * 10);
        assert_eq!(session.axes().current().r, AXIS_CENTER);

        let sent = axes_of(&step(&mut session, now + MS * 40));
        assert_eq!(sent, vec![AxisTriple::new(127, 127, 200)]);

        session.handle(InputEvent::RotationRelease, now + MS * 50);
        step(&mut session, now + MS * 90);
        assert_eq!(session.axes().current().r, AXIS_CENTER);
    }

    #[test]
    fn rotation_release_sends_five_stops() {
        let (mut session, now) = connected();
        step(&mut session, now);

        session.handle(InputEvent::RotationInput { value: 200 }, now);
        assert_eq!(
            axes_of(&step(&mut session, now + MS * 40)),
            vec![AxisTriple::new(127, 127, 200)]
        );

        session.handle(InputEvent::RotationRelease, now + MS * 50);
        let mut sent = Vec::new();
        for n in 2..22 {
            sent.extend(axes_of(&step(&mut session, now + TICK * n)));
        }
        assert_eq!(sent, vec![AxisTriple::CENTER; 5]);
    }

    #[test]
    fn next_wakeup_tracks_earliest_timer() {
        let (mut session, now) = connected();
        assert_eq!(session.next_wakeup(), Some(now));

        step(&mut session, now);
        assert_eq!(session.next_wakeup(), Some(now + TICK));

        session.handle(
            InputEvent::ChannelInput {
                channel: Channel::A,
                value: 1,
            },
            now - MS * 25,
        );
        assert_eq!(session.next_wakeup(), Some(now + MS * 15));
    }
}
