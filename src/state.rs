use std::{
    io,
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::{debug, trace};
use wayland_client::{
    Connection, Dispatch, DispatchError, EventQueue, Proxy, QueueHandle,
    backend::WaylandError,
    protocol::wl_registry,
};
use wayland_protocols_wlr::output_management::v1::client::{
    zwlr_output_configuration_head_v1::{self, ZwlrOutputConfigurationHeadV1},
    zwlr_output_configuration_v1::{self, ZwlrOutputConfigurationV1},
    zwlr_output_head_v1::{self, ZwlrOutputHeadV1},
    zwlr_output_manager_v1::{self, ZwlrOutputManagerV1},
    zwlr_output_mode_v1::{self, ZwlrOutputModeV1},
};

use crate::{
    error::WlModesetError,
    graph::{OutputEvent, Snapshot, SyncState},
    transaction::{ApplyOutcome, ConfigurationBackend, ConfigurationTransaction},
};

/// Highest `zwlr_output_manager_v1` version this client understands
pub const MANAGER_VERSION: u32 = 4;

/// `release` requests on heads and modes exist since this version
const RELEASE_SINCE: u32 = 3;

/// Snapshot of the live compositor's heads
pub type WlSnapshot = Snapshot<ZwlrOutputHeadV1, ZwlrOutputModeV1>;

#[derive(Debug, PartialEq)]
enum ConfigResult {
    Idle,
    Succeeded,
    Failed,
    Cancelled,
}

/// Connection-side state of one wlr-output-management session
///
/// Protocol events are translated into [`OutputEvent`]s and fed to the
/// head/mode graph until the manager's `done` seals a snapshot.
pub struct WlOutputSession {
    _conn: Connection,
    zwlr_manager: Option<ZwlrOutputManagerV1>,
    graph: SyncState<ZwlrOutputHeadV1, ZwlrOutputModeV1>,
    config_result: ConfigResult,
}

impl WlOutputSession {
    /// Connect to the display named by `WAYLAND_DISPLAY`, request the registry
    ///
    /// Returns the session and the event queue that must be dispatched to
    /// process events.
    ///
    /// # Errors
    ///
    /// Returns `Connection` if unable to connect to the Wayland display.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use wlx_modeset::WlOutputSession;
    ///
    /// let (mut session, mut event_queue) =
    ///     WlOutputSession::new_connection().unwrap();
    /// session.discover(&mut event_queue).unwrap();
    /// let snapshot = session.sync(&mut event_queue, None).unwrap();
    /// for head in snapshot.heads() {
    ///     println!("{} has {} modes", head.label(), head.modes.len());
    /// }
    /// ```
    pub fn new_connection()
    -> Result<(Self, EventQueue<Self>), WlModesetError> {
        let conn = Connection::connect_to_env()?;

        let display_object = conn.display();
        let event_queue: EventQueue<WlOutputSession> = conn.new_event_queue();
        let queue_handler = event_queue.handle();
        display_object.get_registry(&queue_handler, ());

        let state = WlOutputSession {
            _conn: conn,
            zwlr_manager: None,
            graph: SyncState::default(),
            config_result: ConfigResult::Idle,
        };

        Ok((state, event_queue))
    }

    /// Run the registry round-trip and make sure the output manager was bound
    pub fn discover(
        &mut self,
        eq: &mut EventQueue<Self>,
    ) -> Result<(), WlModesetError> {
        eq.roundtrip(self)?;
        if self.zwlr_manager.is_none() {
            return Err(WlModesetError::ProtocolUnavailable);
        }
        Ok(())
    }

    /// Dispatch events until the manager seals a snapshot
    ///
    /// Without a timeout this blocks for as long as the compositor stays
    /// silent. With one, it fails with `Timeout` once the budget is spent.
    pub fn sync(
        &mut self,
        eq: &mut EventQueue<Self>,
        timeout: Option<Duration>,
    ) -> Result<WlSnapshot, WlModesetError> {
        let deadline = timeout.map(|t| SyncDeadline::new(t, Instant::now()));
        loop {
            if let Some(snapshot) = self.graph.take_snapshot() {
                return Ok(snapshot);
            }
            match deadline {
                Some(deadline) => {
                    let remaining = deadline.remaining(Instant::now())?;
                    self.dispatch_timeout(eq, remaining)?;
                }
                None => {
                    eq.blocking_dispatch(self)?;
                }
            }
        }
    }

    /// Borrow the session as a configuration backend
    ///
    /// With `confirm` set, applying waits for the compositor to answer
    /// `succeeded`, `failed` or `cancelled`; otherwise it only makes sure the
    /// request reached the compositor.
    pub fn transactor<'a>(
        &'a mut self,
        eq: &'a mut EventQueue<Self>,
        confirm: bool,
    ) -> Result<WlTransactor<'a>, WlModesetError> {
        let manager = self
            .zwlr_manager
            .clone()
            .ok_or(WlModesetError::ProtocolUnavailable)?;
        Ok(WlTransactor {
            session: self,
            eq,
            manager,
            confirm,
        })
    }

    fn dispatch_timeout(
        &mut self,
        eq: &mut EventQueue<Self>,
        timeout: Duration,
    ) -> Result<(), WlModesetError> {
        eq.flush().map_err(DispatchError::Backend)?;

        if let Some(guard) = eq.prepare_read() {
            let fd = guard.connection_fd();
            let mut poll_fd = [rustix::event::PollFd::new(
                &fd,
                rustix::event::PollFlags::IN,
            )];
            let timeout = rustix::time::Timespec {
                tv_sec: timeout.as_secs() as _,
                tv_nsec: timeout.subsec_nanos() as _,
            };
            let ready =
                match rustix::event::poll(&mut poll_fd, Some(&timeout)) {
                    Ok(ready) => ready,
                    Err(e) if e == rustix::io::Errno::INTR => 0,
                    Err(e) => {
                        let e = WaylandError::Io(e.into());
                        return Err(DispatchError::Backend(e).into());
                    }
                };
            if ready > 0 {
                match guard.read() {
                    Ok(_) => {}
                    Err(WaylandError::Io(e))
                        if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(DispatchError::Backend(e).into()),
                }
            }
        }

        eq.dispatch_pending(self)?;
        Ok(())
    }

    fn wait_for_result(
        &mut self,
        eq: &mut EventQueue<Self>,
    ) -> Result<ApplyOutcome, WlModesetError> {
        self.config_result = ConfigResult::Idle;
        loop {
            match self.config_result {
                ConfigResult::Idle => {
                    eq.blocking_dispatch(self)?;
                }
                ConfigResult::Succeeded => {
                    return Ok(ApplyOutcome::Succeeded);
                }
                ConfigResult::Failed => {
                    return Err(WlModesetError::ConfigurationFailed);
                }
                ConfigResult::Cancelled => {
                    return Err(WlModesetError::ConfigurationCancelled);
                }
            }
        }
    }
}

/// Version to bind an advertised `zwlr_output_manager_v1` global at
pub fn bind_version(advertised: u32) -> u32 {
    advertised.min(MANAGER_VERSION)
}

/// Point in time the snapshot wait gives up at
#[derive(Debug, Clone, Copy)]
struct SyncDeadline {
    timeout: Duration,
    at: Instant,
}

impl SyncDeadline {
    fn new(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            at: now + timeout,
        }
    }

    /// Time left to wait, or `Timeout` once the deadline has passed
    fn remaining(&self, now: Instant) -> Result<Duration, WlModesetError> {
        let remaining = self.at.saturating_duration_since(now);
        if remaining.is_zero() {
            return Err(WlModesetError::Timeout(self.timeout));
        }
        Ok(remaining)
    }
}

/// A `zwlr_output_configuration_v1` being assembled
pub struct WlTransaction {
    config: ZwlrOutputConfigurationV1,
    qh: QueueHandle<WlOutputSession>,
}

impl ConfigurationTransaction<ZwlrOutputHeadV1, ZwlrOutputModeV1>
    for WlTransaction
{
    fn enable_head(
        &mut self,
        head: &ZwlrOutputHeadV1,
        mode: Option<&ZwlrOutputModeV1>,
    ) {
        let config_head = self.config.enable_head(head, &self.qh, ());
        if let Some(mode) = mode {
            config_head.set_mode(mode);
        }
    }

    fn disable_head(&mut self, head: &ZwlrOutputHeadV1) {
        self.config.disable_head(head);
    }
}

/// Applies configurations through a live session
pub struct WlTransactor<'a> {
    session: &'a mut WlOutputSession,
    eq: &'a mut EventQueue<WlOutputSession>,
    manager: ZwlrOutputManagerV1,
    confirm: bool,
}

impl ConfigurationBackend<ZwlrOutputHeadV1, ZwlrOutputModeV1>
    for WlTransactor<'_>
{
    type Transaction = WlTransaction;

    fn create_configuration(&mut self, serial: u32) -> WlTransaction {
        let qh = self.eq.handle();
        let config = self.manager.create_configuration(serial, &qh, ());
        WlTransaction { config, qh }
    }

    fn apply(
        &mut self,
        transaction: WlTransaction,
    ) -> Result<ApplyOutcome, WlModesetError> {
        let WlTransaction { config, .. } = transaction;
        config.apply();
        let outcome = if self.confirm {
            self.session.wait_for_result(self.eq)
        } else {
            Ok(ApplyOutcome::Sent)
        };
        config.destroy();
        // make sure apply and destroy reached the compositor before exiting
        self.eq.roundtrip(&mut *self.session)?;
        outcome
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for WlOutputSession {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_registry::Event::Global {
            name,
            interface,
            version,
        } = event
        {
            // a second manager global replaces the first one
            if interface == ZwlrOutputManagerV1::interface().name {
                let version = bind_version(version);
                debug!(name, version, "binding zwlr_output_manager_v1");
                let bound = registry.bind::<ZwlrOutputManagerV1, _, _>(
                    name,
                    version,
                    qh,
                    (),
                );
                state.zwlr_manager = Some(bound);
            }
        }
    }
}

impl Dispatch<ZwlrOutputManagerV1, ()> for WlOutputSession {
    fn event(
        state: &mut Self,
        _: &ZwlrOutputManagerV1,
        event: zwlr_output_manager_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        trace!(?event, "manager event");
        let event = match event {
            zwlr_output_manager_v1::Event::Head { head } => {
                OutputEvent::Head { head }
            }
            zwlr_output_manager_v1::Event::Done { serial } => {
                OutputEvent::Done { serial }
            }
            zwlr_output_manager_v1::Event::Finished => {
                OutputEvent::ManagerFinished
            }
            _ => return,
        };
        state.graph.feed(event);
    }

    fn event_created_child(
        opcode: u16,
        qh: &QueueHandle<Self>,
    ) -> Arc<dyn wayland_client::backend::ObjectData> {
        if opcode == zwlr_output_manager_v1::EVT_HEAD_OPCODE {
            qh.make_data::<ZwlrOutputHeadV1, _>(())
        } else {
            unreachable!(
                "unknown child-creating opcode {opcode} for \
                 zwlr_output_manager_v1"
            )
        }
    }
}

impl Dispatch<ZwlrOutputHeadV1, ()> for WlOutputSession {
    fn event(
        state: &mut Self,
        head: &ZwlrOutputHeadV1,
        event: <ZwlrOutputHeadV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        trace!(head = %head.id(), ?event, "head event");
        let head_handle = head.clone();
        let event = match event {
            zwlr_output_head_v1::Event::Name { name } => OutputEvent::HeadName {
                head: head_handle,
                name,
            },
            zwlr_output_head_v1::Event::Description { description } => {
                OutputEvent::HeadDescription {
                    head: head_handle,
                    description,
                }
            }
            zwlr_output_head_v1::Event::Mode { mode } => OutputEvent::Mode {
                head: head_handle,
                mode,
            },
            zwlr_output_head_v1::Event::Enabled { enabled } => {
                OutputEvent::HeadEnabled {
                    head: head_handle,
                    enabled: enabled != 0,
                }
            }
            zwlr_output_head_v1::Event::CurrentMode { mode } => {
                OutputEvent::HeadCurrentMode {
                    head: head_handle,
                    mode,
                }
            }
            zwlr_output_head_v1::Event::Finished => {
                if head.version() >= RELEASE_SINCE {
                    head.release();
                }
                OutputEvent::HeadFinished { head: head_handle }
            }
            _ => return,
        };
        state.graph.feed(event);
    }

    fn event_created_child(
        opcode: u16,
        qh: &QueueHandle<Self>,
    ) -> Arc<dyn wayland_client::backend::ObjectData> {
        if opcode == zwlr_output_head_v1::EVT_MODE_OPCODE {
            qh.make_data::<ZwlrOutputModeV1, _>(())
        } else {
            unreachable!(
                "unknown child-creating opcode {opcode} for \
                 zwlr_output_head_v1"
            )
        }
    }
}

impl Dispatch<ZwlrOutputModeV1, ()> for WlOutputSession {
    fn event(
        state: &mut Self,
        mode_obj: &ZwlrOutputModeV1,
        event: <ZwlrOutputModeV1 as Proxy>::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        trace!(mode = %mode_obj.id(), ?event, "mode event");
        let mode = mode_obj.clone();
        let event = match event {
            zwlr_output_mode_v1::Event::Size { width, height } => {
                OutputEvent::ModeSize {
                    mode,
                    width,
                    height,
                }
            }
            zwlr_output_mode_v1::Event::Refresh { refresh } => {
                OutputEvent::ModeRefresh { mode, refresh }
            }
            zwlr_output_mode_v1::Event::Preferred => {
                OutputEvent::ModePreferred { mode }
            }
            zwlr_output_mode_v1::Event::Finished => {
                if mode_obj.version() >= RELEASE_SINCE {
                    mode_obj.release();
                }
                OutputEvent::ModeFinished { mode }
            }
            _ => return,
        };
        state.graph.feed(event);
    }
}

impl Dispatch<ZwlrOutputConfigurationV1, ()> for WlOutputSession {
    fn event(
        state: &mut Self,
        _: &ZwlrOutputConfigurationV1,
        event: zwlr_output_configuration_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        debug!(?event, "configuration result");
        match event {
            zwlr_output_configuration_v1::Event::Succeeded => {
                state.config_result = ConfigResult::Succeeded;
            }
            zwlr_output_configuration_v1::Event::Failed => {
                state.config_result = ConfigResult::Failed;
            }
            zwlr_output_configuration_v1::Event::Cancelled => {
                state.config_result = ConfigResult::Cancelled;
            }
            _ => {}
        }
    }
}

impl Dispatch<ZwlrOutputConfigurationHeadV1, ()> for WlOutputSession {
    fn event(
        _: &mut Self,
        _: &ZwlrOutputConfigurationHeadV1,
        _event: zwlr_output_configuration_head_v1::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
    }
}
