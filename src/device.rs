use crate::config::{DeviceConfig, Timeouts};
use crate::connection::{self, Connection, LineReader};
use crate::correlator::{Correlator, Waiter};
use crate::decoder::{Decoder, ListKind, Outcome};
use crate::error::{Result, StormAudioError};
use crate::projection::{Attributes, Entity};
use crate::protocol::{Command, Matcher};
use crate::state::{DeviceAttributes, PowerState};
use crate::subscription::{DeviceEvent, EventReceiver};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Lifecycle of the TCP connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

/// One open connection; replaced wholesale on reconnect
struct Session {
    id: Uuid,
    connection: Connection,
    reader: JoinHandle<()>,
}

struct DeviceInner {
    log_id: String,
    config: RwLock<DeviceConfig>,
    timeouts: Timeouts,
    attributes: RwLock<DeviceAttributes>,
    correlator: Correlator,
    session: Mutex<Option<Session>>,
    connection_state: RwLock<ConnectionState>,
    event_tx: broadcast::Sender<DeviceEvent>,
}

/// A StormAudio ISP and its persistent control connection
///
/// Cheap to clone; clones share the connection and session state. The
/// session state is written only by the connection's read loop.
#[derive(Clone)]
pub struct StormAudioDevice {
    inner: Arc<DeviceInner>,
}

impl StormAudioDevice {
    pub fn new(config: DeviceConfig) -> Self {
        Self::with_timeouts(config, Timeouts::default())
    }

    pub fn with_timeouts(config: DeviceConfig, timeouts: Timeouts) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        // Lists from the last run let names resolve before the device re-sends them
        let attributes = DeviceAttributes {
            sources: config.sources.clone(),
            presets: config.presets.clone(),
            ..Default::default()
        };

        Self {
            inner: Arc::new(DeviceInner {
                log_id: config.log_id().to_string(),
                config: RwLock::new(config),
                timeouts,
                attributes: RwLock::new(attributes),
                correlator: Correlator::new(),
                session: Mutex::new(None),
                connection_state: RwLock::new(ConnectionState::Disconnected),
                event_tx,
            }),
        }
    }

    pub fn identifier(&self) -> String {
        self.inner.config.read().identifier.clone()
    }

    pub fn name(&self) -> String {
        self.inner.config.read().name.clone()
    }

    pub fn log_id(&self) -> &str {
        &self.inner.log_id
    }

    /// Current configuration, including the last committed lists
    pub fn config(&self) -> DeviceConfig {
        self.inner.config.read().clone()
    }

    pub fn timeouts(&self) -> Timeouts {
        self.inner.timeouts
    }

    pub fn state(&self) -> PowerState {
        self.inner.attributes.read().state
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.connection_state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Snapshot of the session state
    pub fn attributes(&self) -> DeviceAttributes {
        self.inner.attributes.read().clone()
    }

    /// Ids of every entity this device backs
    pub fn entity_ids(&self) -> Vec<String> {
        let identifier = self.identifier();
        Entity::all().map(|entity| entity.id(&identifier)).collect()
    }

    /// Current attributes of one entity, or `None` for a foreign id
    pub fn entity_attributes(&self, entity_id: &str) -> Option<Attributes> {
        let entity = Entity::from_id(&self.identifier(), entity_id)?;
        Some(entity.project(&self.inner.attributes.read()))
    }

    /// Subscribe to device events
    ///
    /// Multiple subscriptions can be active simultaneously.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver::new(self.inner.event_tx.subscribe())
    }

    /// Open the control connection and start the read loop
    ///
    /// An existing connection is closed first. Fails with
    /// `ConnectionRefused` or `ConnectTimeout` if the processor can't be
    /// reached.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use stormaudio_isp::{DeviceConfig, StormAudioDevice};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let device = StormAudioDevice::new(DeviceConfig::new("isp", "Cinema", "192.168.1.50"));
    ///     device.connect().await?;
    ///     device.set_volume(55).await;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(&self) -> Result<()> {
        if self.inner.session.lock().is_some() {
            self.close_connection().await;
        }

        let (address, port) = {
            let config = self.inner.config.read();
            (config.address.clone(), config.port)
        };

        self.inner.set_connection_state(ConnectionState::Connecting);
        let (connection, reader) =
            match connection::connect(&address, port, self.inner.timeouts.connect).await {
                Ok(halves) => halves,
                Err(e) => {
                    tracing::error!("[{}] Failed to connect: {}", self.inner.log_id, e);
                    self.inner.set_connection_state(ConnectionState::Disconnected);
                    return Err(e);
                }
            };

        self.inner.attributes.write().state = PowerState::Unknown;

        let id = Uuid::new_v4();
        let reader = tokio::spawn(read_loop(Arc::downgrade(&self.inner), id, reader));
        *self.inner.session.lock() = Some(Session {
            id,
            connection,
            reader,
        });

        self.inner.set_connection_state(ConnectionState::Connected);
        tracing::info!("[{}] Connected to {}:{}", self.inner.log_id, address, port);
        self.inner.emit(DeviceEvent::Connected);
        self.inner.project_all();

        // Resolve Unknown even if the processor skips its greeting burst
        self.send(&Command::ProcState);
        Ok(())
    }

    /// Close the control connection
    ///
    /// Pending waiters fail with `ConnectionClosed` and the device reports
    /// `Unavailable` until the next [`connect`](Self::connect).
    pub async fn close_connection(&self) {
        let Some(session) = self.inner.session.lock().take() else {
            return;
        };

        self.inner.set_connection_state(ConnectionState::Closing);
        session.reader.abort();
        session.connection.close().await;
        self.inner.finish_disconnect();
    }

    /// Write commands in order. Returns `false` (after logging) if there is
    /// no live connection; the commands are dropped.
    pub(crate) fn send_all(&self, commands: &[Command]) -> bool {
        let session = self.inner.session.lock();
        let Some(session) = session.as_ref() else {
            tracing::error!(
                "[{}] Dropping command: {}",
                self.inner.log_id,
                StormAudioError::NotConnected
            );
            return false;
        };

        for command in commands {
            if let Err(e) = session.connection.send(&command.to_line()) {
                tracing::error!("[{}] Failed to send {}: {}", self.inner.log_id, command, e);
                return false;
            }
        }
        true
    }

    pub(crate) fn send(&self, command: &Command) -> bool {
        self.send_all(std::slice::from_ref(command))
    }

    /// Fire-and-confirm: register `matcher`, send `commands`, wait up to
    /// `limit`. A timeout is logged and otherwise ignored.
    pub(crate) async fn confirm(
        &self,
        commands: &[Command],
        matcher: Matcher,
        limit: Duration,
    ) -> Option<String> {
        let waiter = self.inner.correlator.register(matcher);
        if !self.send_all(commands) {
            self.inner.correlator.cancel(waiter.id());
            return None;
        }
        self.wait_logged(waiter, limit).await
    }

    /// Race-two-outcomes: register every matcher, send, and return the index
    /// of whichever confirmation arrives first. Losers are removed.
    pub(crate) async fn race(
        &self,
        command: &Command,
        matchers: Vec<Matcher>,
        limit: Duration,
    ) -> Option<usize> {
        let waiters: Vec<Waiter> = matchers
            .into_iter()
            .map(|matcher| self.inner.correlator.register(matcher))
            .collect();

        if !self.send(command) {
            for waiter in &waiters {
                self.inner.correlator.cancel(waiter.id());
            }
            return None;
        }

        match self.inner.correlator.wait_any(waiters, limit).await {
            Ok((index, line)) => {
                tracing::debug!("[{}] {} confirmed by {}", self.inner.log_id, command, line);
                Some(index)
            }
            Err(e) => {
                tracing::warn!("[{}] {} not confirmed: {}", self.inner.log_id, command, e);
                None
            }
        }
    }

    async fn wait_logged(&self, waiter: Waiter, limit: Duration) -> Option<String> {
        match self.inner.correlator.wait(waiter, limit).await {
            Ok(line) => Some(line),
            Err(e) => {
                tracing::warn!("[{}] {}", self.inner.log_id, e);
                None
            }
        }
    }

    /// Number of confirmations still awaited
    pub fn pending_confirmations(&self) -> usize {
        self.inner.correlator.pending()
    }
}

impl DeviceInner {
    fn set_connection_state(&self, state: ConnectionState) {
        *self.connection_state.write() = state;
    }

    fn emit(&self, event: DeviceEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Push fresh attributes for every entity
    fn project_all(&self) {
        let identifier = self.config.read().identifier.clone();
        let attributes = self.attributes.read().clone();

        for entity in Entity::all() {
            self.emit(DeviceEvent::Update {
                entity_id: entity.id(&identifier),
                attributes: entity.project(&attributes),
            });
        }
    }

    /// One received line: waiters first, then state
    fn handle_line(&self, decoder: &mut Decoder, line: &str) {
        self.correlator.notify(line);

        let outcome = {
            let mut attributes = self.attributes.write();
            match decoder.apply(&mut attributes, line) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!("[{}] Skipping line: {}", self.log_id, e);
                    return;
                }
            }
        };

        if outcome.should_project() {
            self.project_all();
        }
        if let Outcome::ListCommitted(kind) = outcome {
            self.commit_list(kind);
        }
    }

    /// Copy a committed list into the config and hand it to the host
    fn commit_list(&self, kind: ListKind) {
        let config = {
            let attributes = self.attributes.read();
            let mut config = self.config.write();
            match kind {
                ListKind::Sources => config.sources = attributes.sources.clone(),
                ListKind::Presets => config.presets = attributes.presets.clone(),
            }
            config.clone()
        };
        tracing::debug!("[{}] {:?} list updated", self.log_id, kind);
        self.emit(DeviceEvent::ConfigUpdated(Box::new(config)));
    }

    /// Read loop ended for session `id`
    fn on_eof(&self, id: Uuid) {
        let session = {
            let mut current = self.session.lock();
            match current.as_ref() {
                Some(session) if session.id == id => current.take(),
                // Closed locally or already replaced by a newer session
                _ => None,
            }
        };

        if session.is_some() {
            tracing::info!("[{}] Connection closed by device", self.log_id);
            self.finish_disconnect();
        }
    }

    fn finish_disconnect(&self) {
        let failed = self.correlator.fail_all();
        if failed > 0 {
            tracing::debug!("[{}] Failed {} pending waiters", self.log_id, failed);
        }

        self.attributes.write().state = PowerState::Unavailable;
        self.set_connection_state(ConnectionState::Disconnected);
        self.project_all();
        self.emit(DeviceEvent::Disconnected);
    }
}

async fn read_loop(inner: Weak<DeviceInner>, id: Uuid, reader: LineReader) {
    let mut decoder = Decoder::new();
    let lines = inner.clone();

    reader
        .run(|line| {
            if let Some(inner) = lines.upgrade() {
                inner.handle_line(&mut decoder, &line);
            }
        })
        .await;

    if let Some(inner) = inner.upgrade() {
        inner.on_eof(id);
    }
}
