//! Mixer link lifecycle
//!
//! One outbound WebSocket session to the mixing service. The session owns
//! reconnection, the broadcast loop, and inbound frame handling; the tick
//! loop only ever talks to it through a [`SessionHandle`].
//!
//! Teardown discipline: every disconnect aborts and awaits the writer task
//! before another connection attempt starts, so at most one broadcast loop
//! exists at any time.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::game::snapshot::SnapshotStore;
use crate::settings::SettingsHandle;
use crate::sync::protocol::{self, Frame};

/// Delay between a non-fatal disconnect and the next connection attempt
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Delay after connect before the map and settings are pushed
pub const SETTLE_DELAY: Duration = Duration::from_secs(3);

/// Broadcast interval with two or more participants present
pub const FAST_BROADCAST_INTERVAL: Duration = Duration::from_millis(100);

/// Broadcast interval while the session is effectively idle
pub const SLOW_BROADCAST_INTERVAL: Duration = Duration::from_millis(1000);

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    /// Fatal fault from the peer; no further reconnection this process
    Faulted,
}

/// Fire-and-forget notifications from the tick loop
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    MapChange(String),
    DoorRotation { key: String, rotation: i32 },
    PushSettings,
}

/// Cheap clonable handle for the tick loop's side of the session
#[derive(Clone)]
pub struct SessionHandle {
    connected: Arc<AtomicBool>,
    state: Arc<Mutex<LinkState>>,
    map: Arc<Mutex<String>>,
    notices: mpsc::UnboundedSender<Notice>,
}

impl SessionHandle {
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn state(&self) -> LinkState {
        *self.state.lock()
    }

    /// Record the new map and announce it if the link is up. The map cell
    /// is always updated so a later settle push reports the right one.
    pub fn notify_map_change(&self, map: &str) {
        *self.map.lock() = map.to_string();
        self.send(Notice::MapChange(map.to_string()));
    }

    pub fn notify_door_rotation(&self, key: String, rotation: i32) {
        self.send(Notice::DoorRotation { key, rotation });
    }

    pub fn notify_settings_push(&self) {
        self.send(Notice::PushSettings);
    }

    /// Best-effort: notices are dropped silently while disconnected.
    fn send(&self, notice: Notice) {
        if self.is_connected() {
            let _ = self.notices.send(notice);
        }
    }

    #[cfg(test)]
    pub(crate) fn force_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }
}

/// Connection parameters for one session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// WebSocket endpoint of the mixing service
    pub endpoint: String,
    pub api_key: String,
    /// Advertised game-server address, resolved once at startup
    pub advertised_addr: String,
    pub advertised_port: u16,
    pub build_version: String,
    pub reconnect_delay: Duration,
    pub settle_delay: Duration,
    pub fast_interval: Duration,
    pub slow_interval: Duration,
}

impl SessionConfig {
    pub fn new(
        endpoint: String,
        api_key: String,
        advertised_addr: String,
        advertised_port: u16,
    ) -> Self {
        Self {
            endpoint,
            api_key,
            advertised_addr,
            advertised_port,
            build_version: env!("CARGO_PKG_VERSION").to_string(),
            reconnect_delay: RECONNECT_DELAY,
            settle_delay: SETTLE_DELAY,
            fast_interval: FAST_BROADCAST_INTERVAL,
            slow_interval: SLOW_BROADCAST_INTERVAL,
        }
    }
}

/// The outbound sync session. Constructed once, consumed by [`run`].
///
/// [`run`]: SyncSession::run
pub struct SyncSession {
    cfg: SessionConfig,
    settings: SettingsHandle,
    store: Arc<SnapshotStore>,
    connected: Arc<AtomicBool>,
    state: Arc<Mutex<LinkState>>,
    map: Arc<Mutex<String>>,
    allow_reconnect: Arc<AtomicBool>,
    notices: mpsc::UnboundedReceiver<Notice>,
    notices_closed: bool,
}

impl SyncSession {
    pub fn new(
        cfg: SessionConfig,
        settings: SettingsHandle,
        store: Arc<SnapshotStore>,
        initial_map: String,
    ) -> (Self, SessionHandle) {
        let connected = Arc::new(AtomicBool::new(false));
        let state = Arc::new(Mutex::new(LinkState::Disconnected));
        let map = Arc::new(Mutex::new(initial_map));
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let handle = SessionHandle {
            connected: connected.clone(),
            state: state.clone(),
            map: map.clone(),
            notices: notice_tx,
        };

        let session = Self {
            cfg,
            settings,
            store,
            connected,
            state,
            map,
            allow_reconnect: Arc::new(AtomicBool::new(true)),
            notices: notice_rx,
            notices_closed: false,
        };

        (session, handle)
    }

    /// Drive the connection until a fatal fault. Each pass through the
    /// loop is one connection attempt.
    pub async fn run(mut self) {
        loop {
            self.set_state(LinkState::Connecting);
            let url = self.connect_url();

            match connect_async(url.as_str()).await {
                Ok((socket, _response)) => {
                    info!(endpoint = %self.cfg.endpoint, "mixer link established");
                    self.set_state(LinkState::Connected);
                    self.connected.store(true, Ordering::Release);

                    let (sink, stream) = socket.split();
                    let (frame_tx, frame_rx) = mpsc::unbounded_channel();

                    let writer = tokio::spawn(broadcast_loop(
                        sink,
                        frame_rx,
                        self.store.clone(),
                        self.cfg.fast_interval,
                        self.cfg.slow_interval,
                    ));

                    // A freshly (re)connected peer is stale; give the link a
                    // moment to settle, then push map and settings once.
                    let settle_tx = frame_tx.clone();
                    let map = self.map.clone();
                    let settings = self.settings.clone();
                    let settle = self.cfg.settle_delay;
                    tokio::spawn(async move {
                        tokio::time::sleep(settle).await;
                        let _ = settle_tx.send(Frame::CurrentMap(map.lock().clone()));
                        let _ = settle_tx.send(Frame::ServerConfig(settings.snapshot()));
                    });

                    self.pump(stream, &frame_tx).await;

                    self.connected.store(false, Ordering::Release);
                    // The writer must be fully stopped before the next
                    // attempt may start another one.
                    writer.abort();
                    let _ = writer.await;
                }
                Err(e) => {
                    warn!(error = %e, "mixer connection failed");
                }
            }

            if !self.allow_reconnect.load(Ordering::Acquire) {
                self.set_state(LinkState::Faulted);
                error!("mixer link faulted; reconnection disabled until plugin reload");
                return;
            }

            self.set_state(LinkState::Disconnected);
            tokio::time::sleep(self.cfg.reconnect_delay).await;
        }
    }

    /// Forward notices outbound and handle inbound frames until the
    /// connection dies or a fatal frame arrives.
    async fn pump(&mut self, mut stream: WsStream, frame_tx: &mpsc::UnboundedSender<Frame>) {
        enum Event {
            Notice(Option<Notice>),
            Inbound(Option<Result<Message, WsError>>),
        }

        loop {
            let event = tokio::select! {
                notice = self.notices.recv(), if !self.notices_closed => Event::Notice(notice),
                message = stream.next() => Event::Inbound(message),
            };

            match event {
                Event::Notice(Some(notice)) => {
                    let frame = self.frame_for(notice);
                    let _ = frame_tx.send(frame);
                }
                Event::Notice(None) => self.notices_closed = true,
                Event::Inbound(Some(Ok(Message::Binary(bytes)))) => {
                    if self.handle_frame(&bytes).is_break() {
                        return;
                    }
                }
                Event::Inbound(Some(Ok(Message::Close(_)))) | Event::Inbound(None) => {
                    warn!("mixer link closed");
                    return;
                }
                Event::Inbound(Some(Ok(_))) => {}
                Event::Inbound(Some(Err(e))) => {
                    warn!(error = %e, "mixer link read error");
                    return;
                }
            }
        }
    }

    fn frame_for(&self, notice: Notice) -> Frame {
        match notice {
            Notice::MapChange(map) => Frame::CurrentMap(map),
            Notice::DoorRotation { key, rotation } => Frame::DoorRotation { key, rotation },
            Notice::PushSettings => Frame::ServerConfig(self.settings.snapshot()),
        }
    }

    fn handle_frame(&mut self, bytes: &[u8]) -> ControlFlow<()> {
        match protocol::decode(bytes) {
            Ok(Frame::ServerConfig(incoming)) => {
                self.settings.apply_remote(&incoming);
                info!("settings replica applied from mixer");
            }
            Ok(Frame::ServerRestartWarning { minutes }) => {
                warn!(
                    seconds = minutes * 60.0,
                    "mixer service restarting soon; clients will reconnect automatically"
                );
            }
            Ok(Frame::Exception { code, message }) => {
                error!(
                    code,
                    reason = message.as_deref().unwrap_or("unknown mixer exception"),
                    "fatal exception from mixer"
                );
                self.allow_reconnect.store(false, Ordering::Release);
                return ControlFlow::Break(());
            }
            Ok(frame) => {
                debug!(?frame, "ignoring unexpected inbound frame");
            }
            Err(e) => {
                // Settings stay untouched on a bad push.
                warn!(error = %e, "undecodable frame from mixer");
            }
        }
        ControlFlow::Continue(())
    }

    fn connect_url(&self) -> String {
        format!(
            "{}?api-key={}&server-address={}&server-port={}&build-version={}",
            self.cfg.endpoint,
            self.cfg.api_key,
            self.cfg.advertised_addr,
            self.cfg.advertised_port,
            self.cfg.build_version
        )
    }

    fn set_state(&self, state: LinkState) {
        *self.state.lock() = state;
    }
}

/// Writer task: periodic snapshot batches plus forwarded notices, until
/// cancelled or the sink dies.
async fn broadcast_loop(
    mut sink: WsSink,
    mut frames: mpsc::UnboundedReceiver<Frame>,
    store: Arc<SnapshotStore>,
    fast: Duration,
    slow: Duration,
) {
    loop {
        let frame = tokio::select! {
            forwarded = frames.recv() => match forwarded {
                Some(frame) => frame,
                None => break,
            },
            _ = tokio::time::sleep(broadcast_interval(store.len(), fast, slow)) => {
                Frame::PlayerPositions(store.batch())
            }
        };

        let bytes = match protocol::encode(&frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to encode outbound frame");
                continue;
            }
        };

        if let Err(e) = sink.send(Message::Binary(bytes)).await {
            debug!(error = %e, "mixer send failed; stopping broadcast loop");
            break;
        }
    }
}

/// Idle sessions chatter once a second; two or more participants get the
/// fast cadence.
fn broadcast_interval(participants: usize, fast: Duration, slow: Duration) -> Duration {
    if participants >= 2 {
        fast
    } else {
        slow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MixerSettings;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;
    use tokio_tungstenite::accept_async;

    fn test_config(addr: SocketAddr) -> SessionConfig {
        SessionConfig {
            endpoint: format!("ws://{addr}"),
            api_key: "test-key".into(),
            advertised_addr: "127.0.0.1".into(),
            advertised_port: 27015,
            build_version: "0.0.0-test".into(),
            reconnect_delay: Duration::from_millis(50),
            settle_delay: Duration::from_millis(40),
            fast_interval: Duration::from_millis(25),
            slow_interval: Duration::from_millis(25),
        }
    }

    fn new_session(addr: SocketAddr) -> (SyncSession, SessionHandle, SettingsHandle) {
        let settings = SettingsHandle::default();
        let (session, handle) = SyncSession::new(
            test_config(addr),
            settings.clone(),
            Arc::new(SnapshotStore::new()),
            "de_test".into(),
        );
        (session, handle, settings)
    }

    async fn bound_listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[test]
    fn broadcast_interval_is_adaptive() {
        let fast = Duration::from_millis(100);
        let slow = Duration::from_millis(1000);
        assert_eq!(broadcast_interval(0, fast, slow), slow);
        assert_eq!(broadcast_interval(1, fast, slow), slow);
        assert_eq!(broadcast_interval(2, fast, slow), fast);
        assert_eq!(broadcast_interval(12, fast, slow), fast);
    }

    #[tokio::test]
    async fn reconnects_after_each_drop() {
        let (listener, addr) = bound_listener().await;
        let (session, _handle, _settings) = new_session(addr);
        let task = tokio::spawn(session.run());

        // Three accept-then-drop cycles force three scheduled reconnects.
        for _ in 0..3 {
            let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
                .await
                .expect("connection attempt")
                .unwrap();
            let ws = accept_async(stream).await.unwrap();
            drop(ws);
        }

        // Fourth attempt arrives and stays up; its broadcast stream must
        // carry decodable frames (a single writer, freshly started).
        let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
            .await
            .expect("reconnect after third drop")
            .unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("broadcast frame")
            .unwrap()
            .unwrap();
        match message {
            Message::Binary(bytes) => {
                assert_ok!(protocol::decode(&bytes));
            }
            other => panic!("unexpected message: {other:?}"),
        }

        task.abort();
    }

    #[tokio::test]
    async fn fatal_exception_disables_reconnect() {
        let (listener, addr) = bound_listener().await;
        let (session, handle, _settings) = new_session(addr);
        let task = tokio::spawn(session.run());

        let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
            .await
            .expect("initial connect")
            .unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        let fatal = protocol::encode(&Frame::Exception {
            code: 401,
            message: Some("invalid api key".into()),
        })
        .unwrap();
        ws.send(Message::Binary(fatal)).await.unwrap();

        // The session terminates itself instead of scheduling a retry.
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("session should stop")
            .unwrap();
        assert_eq!(handle.state(), LinkState::Faulted);

        // Even generous waiting produces no further connection attempt.
        assert!(
            tokio::time::timeout(Duration::from_millis(300), listener.accept())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn inbound_settings_replica_is_applied_and_bad_frames_ignored() {
        let (listener, addr) = bound_listener().await;
        let (session, _handle, settings) = new_session(addr);
        let task = tokio::spawn(session.run());

        let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
            .await
            .expect("initial connect")
            .unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        // Garbage first: must be ignored without touching settings.
        ws.send(Message::Binary(vec![0xc1, 0xff, 0x00]))
            .await
            .unwrap();

        let mut pushed = MixerSettings::default();
        pushed.dead_player_mute_delay = 4.5;
        pushed.spectators_can_talk = true;
        let frame = protocol::encode(&Frame::ServerConfig(pushed.clone())).unwrap();
        ws.send(Message::Binary(frame)).await.unwrap();

        // Drain outbound frames while polling for the apply to land.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if settings.snapshot() == pushed {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "settings never applied"
            );
            let _ = tokio::time::timeout(Duration::from_millis(50), ws.next()).await;
        }

        task.abort();
    }

    #[tokio::test]
    async fn settle_push_announces_map_and_settings() {
        let (listener, addr) = bound_listener().await;
        let (session, handle, _settings) = new_session(addr);
        let task = tokio::spawn(session.run());

        let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
            .await
            .expect("initial connect")
            .unwrap();
        let mut ws = accept_async(stream).await.unwrap();

        // A notice sent while connected is forwarded too.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !handle.is_connected() {
            assert!(tokio::time::Instant::now() < deadline, "never connected");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.notify_door_rotation("10 20 0".into(), 90);

        let mut saw_map = false;
        let mut saw_settings = false;
        let mut saw_door = false;
        while !(saw_map && saw_settings && saw_door) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "missing settle frames: map={saw_map} settings={saw_settings} door={saw_door}"
            );
            let message = match tokio::time::timeout(Duration::from_millis(200), ws.next()).await {
                Ok(Some(Ok(m))) => m,
                _ => continue,
            };
            if let Message::Binary(bytes) = message {
                match protocol::decode(&bytes) {
                    Ok(Frame::CurrentMap(map)) => {
                        assert_eq!(map, "de_test");
                        saw_map = true;
                    }
                    Ok(Frame::ServerConfig(_)) => saw_settings = true,
                    Ok(Frame::DoorRotation { key, rotation }) => {
                        assert_eq!(key, "10 20 0");
                        assert_eq!(rotation, 90);
                        saw_door = true;
                    }
                    _ => {}
                }
            }
        }

        task.abort();
    }

    #[tokio::test]
    async fn notices_enqueue_only_while_connected() {
        let (_listener, addr) = bound_listener().await;
        let settings = SettingsHandle::default();
        let (mut session, handle) = SyncSession::new(
            test_config(addr),
            settings,
            Arc::new(SnapshotStore::new()),
            "de_test".into(),
        );

        assert!(!handle.is_connected());
        assert_eq!(handle.state(), LinkState::Disconnected);
        handle.notify_door_rotation("1 2 3".into(), 45);

        handle.force_connected(true);
        handle.notify_settings_push();

        // Only the notice sent while connected made it into the queue.
        assert_eq!(session.notices.try_recv().unwrap(), Notice::PushSettings);
        assert!(session.notices.try_recv().is_err());
    }
}
