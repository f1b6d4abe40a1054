use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chat_protocol::grammar::{self, InboundLine, OverlayMessage};
use crossbeam_channel::{unbounded, Sender};
use parking_lot::{Condvar, Mutex};
use socket2::SockRef;
use tracing::{debug, trace, warn};

use crate::error::BrokerError;
use crate::hooks::{BrokerHooks, NullHooks};
use crate::io_context::IoContext;
use crate::task::{Task, TaskState};

/// The adapter-side unconfirmed list (FIFO, matched by command-string
/// equality) and accepted map (keyed by id), behind one lock per spec.md §3.
struct TaskTables {
    unconfirmed: VecDeque<Arc<Task>>,
    accepted: HashMap<u64, Arc<Task>>,
}

impl TaskTables {
    fn new() -> Self {
        Self {
            unconfirmed: VecDeque::new(),
            accepted: HashMap::new(),
        }
    }
}

/// A stateful client of the relay: performs the handshake, serializes
/// overlay requests, and correlates inbound confirmations/assignments/
/// responses back to the tasks that are waiting on them.
///
/// One dedicated reader thread owns the blocking read loop; any number of
/// external threads may call the public API concurrently. The task tables
/// are guarded by a single lock that is always released before a hook is
/// invoked, so a hook never re-enters the adapter while holding it.
pub struct BrokerAdapter {
    host: String,
    port: u16,
    broker_name: String,
    self_name: Mutex<Option<String>>,
    hooks: Arc<dyn BrokerHooks>,
    tables: Mutex<TaskTables>,
    wait_lock: Mutex<()>,
    wait_cv: Condvar,
    connected: AtomicBool,
    stream: Mutex<Option<TcpStream>>,
    outbound: Mutex<Option<Sender<String>>>,
    reader_handle: Mutex<Option<JoinHandle<()>>>,
    writer_handle: Mutex<Option<JoinHandle<()>>>,
}

impl BrokerAdapter {
    /// Connects to the relay at `host:port`, performs the handshake under
    /// `self_name` (auto-assigned by the relay when `None`), and blocks the
    /// calling thread for up to `timeout_ms` (0 returns immediately).
    ///
    /// Per spec.md §9 Open Question (a), the timeout is a fixed wait, not a
    /// connect-success predicate: success is only ever observable through
    /// subsequent hook invocations.
    pub fn connect(
        host: impl Into<String>,
        port: u16,
        self_name: Option<String>,
        broker_name: impl Into<String>,
        hooks: Arc<dyn BrokerHooks>,
        io_context: Option<Arc<IoContext>>,
        timeout_ms: u64,
    ) -> Result<Arc<Self>, BrokerError> {
        let host = host.into();
        let broker_name = broker_name.into();
        let io_context = io_context.unwrap_or_else(IoContext::global);

        let addr = format!("{}:{}", host, port);
        let stream = (&addr as &str)
            .to_socket_addrs()
            .ok()
            .and_then(|mut it| it.next())
            .ok_or_else(|| {
                BrokerError::Connect(addr.clone(), std::io::Error::from(std::io::ErrorKind::InvalidInput))
            })
            .and_then(|sockaddr| TcpStream::connect(sockaddr).map_err(|e| BrokerError::Connect(addr.clone(), e)))?;

        if let Err(e) = SockRef::from(&stream).set_keepalive(true) {
            warn!("failed to set TCP keepalive: {}", e);
        }

        let (tx, rx) = unbounded::<String>();

        let adapter = Arc::new(Self {
            host,
            port,
            broker_name,
            self_name: Mutex::new(None),
            hooks,
            tables: Mutex::new(TaskTables::new()),
            wait_lock: Mutex::new(()),
            wait_cv: Condvar::new(),
            connected: AtomicBool::new(true),
            stream: Mutex::new(Some(stream.try_clone().map_err(|e| BrokerError::Connect(addr.clone(), e))?)),
            outbound: Mutex::new(Some(tx)),
            reader_handle: Mutex::new(None),
            writer_handle: Mutex::new(None),
        });

        let writer_stream = stream.try_clone().map_err(|e| BrokerError::Connect(addr.clone(), e))?;
        let writer_adapter = adapter.clone();
        let writer_handle = io_context
            .spawn("writer", move || writer_adapter.run_writer(writer_stream, rx))
            .map_err(BrokerError::Spawn)?;

        let reader_adapter = adapter.clone();
        let reader_handle = io_context
            .spawn("reader", move || reader_adapter.run_reader(stream))
            .map_err(BrokerError::Spawn)?;

        *adapter.reader_handle.lock() = Some(reader_handle);
        *adapter.writer_handle.lock() = Some(writer_handle);

        adapter.send_raw("protocol 0".to_string());
        match &self_name {
            Some(name) => adapter.send_raw(format!("name {}", name)),
            None => adapter.send_raw("name".to_string()),
        }

        if timeout_ms > 0 {
            std::thread::sleep(Duration::from_millis(timeout_ms));
        }

        Ok(adapter)
    }

    pub fn with_default_hooks(
        host: impl Into<String>,
        port: u16,
        self_name: Option<String>,
        broker_name: impl Into<String>,
    ) -> Result<Arc<Self>, BrokerError> {
        Self::connect(host, port, self_name, broker_name, Arc::new(NullHooks), None, 0)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn self_name(&self) -> Option<String> {
        self.self_name.lock().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Submits `command` (with optional free-text `options`) as a new task.
    /// Returns immediately with a handle in state `unconfirmed` unless
    /// `wait_state` names a state above it, in which case this blocks via
    /// [`Self::wait_until`].
    pub fn request(
        self: &Arc<Self>,
        command: impl Into<String>,
        options: Option<String>,
        wait_state: Option<TaskState>,
        timeout_ms: u64,
    ) -> Arc<Task> {
        let command = command.into();
        let task = Task::new(command.clone());
        {
            let mut tables = self.tables.lock();
            tables.unconfirmed.push_back(task.clone());
        }

        let mut wire = format!("request {{{}}}", command);
        if let Some(options) = options {
            wire.push_str(" with ");
            wire.push_str(&options);
        }
        self.send_chat(&wire);

        match wait_state {
            Some(state) if state > TaskState::Unconfirmed => self.wait_until(&task, state, timeout_ms),
            _ => task,
        }
    }

    /// Sends `terminate <id>` and waits until the task reaches `terminated`.
    pub fn terminate(self: &Arc<Self>, task: &Arc<Task>, timeout_ms: u64) -> Arc<Task> {
        if let Some(id) = task.id() {
            self.send_chat(&format!("terminate {}", id));
        }
        self.wait_until(task, TaskState::Terminated, timeout_ms)
    }

    /// Blocks until `task.state() >= state` or `timeout_ms` elapses
    /// (`0` waits forever). Returns `task` either way.
    pub fn wait_until(&self, task: &Arc<Task>, state: TaskState, timeout_ms: u64) -> Arc<Task> {
        let mut guard = self.wait_lock.lock();
        if timeout_ms == 0 {
            while task.state() < state {
                self.wait_cv.wait(&mut guard);
            }
        } else {
            let deadline = Instant::now() + Duration::from_millis(timeout_ms);
            while task.state() < state {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                let timed_out = self.wait_cv.wait_for(&mut guard, remaining).timed_out();
                if timed_out {
                    break;
                }
            }
        }
        task.clone()
    }

    /// Forwards a raw line to the broker as a `broker << <line>` chat frame,
    /// bypassing the request/task machinery. Used by the CLI driver to pipe
    /// stdin straight through.
    pub fn send_to_broker(&self, line: &str) {
        self.send_chat(line);
    }

    /// Stops the I/O thread and releases this adapter's connection state.
    /// Safe to call from within the reader thread itself (e.g. on a fatal
    /// protocol error) without deadlocking on a self-join.
    pub fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(stream) = self.stream.lock().take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        self.outbound.lock().take();

        let current = std::thread::current().id();
        let reader = self.reader_handle.lock().take();
        let writer = self.writer_handle.lock().take();
        if let Some(handle) = reader {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
        if let Some(handle) = writer {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }

    fn send_raw(&self, line: String) {
        if let Some(tx) = self.outbound.lock().as_ref() {
            let _ = tx.send(line);
        }
    }

    fn send_chat(&self, body: &str) {
        self.send_raw(format!("broker << {}", body));
    }

    fn notify_waiters(&self) {
        let _guard = self.wait_lock.lock();
        self.wait_cv.notify_all();
    }

    fn run_writer(self: Arc<Self>, mut stream: TcpStream, rx: crossbeam_channel::Receiver<String>) {
        for line in rx.iter() {
            if stream.write_all(line.as_bytes()).is_err() || stream.write_all(b"\n").is_err() {
                warn!("adapter write error, disconnecting");
                self.disconnect();
                return;
            }
        }
    }

    fn run_reader(self: Arc<Self>, stream: TcpStream) {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next() {
                Some(Ok(line)) => self.dispatch_inbound(&line),
                Some(Err(e)) => {
                    if e.kind() != std::io::ErrorKind::UnexpectedEof {
                        warn!("adapter read error: {}", e);
                    }
                    self.disconnect();
                    return;
                }
                None => {
                    debug!("adapter connection closed");
                    self.disconnect();
                    return;
                }
            }
        }
    }

    fn dispatch_inbound(self: &Arc<Self>, line: &str) {
        match grammar::parse_inbound(line) {
            InboundLine::SystemReply(payload) => self.handle_system_reply(&payload),
            InboundLine::SystemNotification(payload) => debug!("notification: {}", payload),
            InboundLine::Chat { sender, payload } => {
                if sender != self.broker_name {
                    trace!("ignoring chat from non-broker sender {}", sender);
                    return;
                }
                self.handle_overlay(&payload);
            }
            InboundLine::Unrecognized(line) => debug!("discarding unrecognized line: {}", line),
        }
    }

    fn handle_system_reply(self: &Arc<Self>, payload: &str) {
        if let Some(name) = payload.strip_prefix("name: ") {
            *self.self_name.lock() = Some(name.to_string());
            self.send_chat("use protocol 0");
        } else if payload.starts_with("failed") {
            warn!("handshake rejected: {}", payload);
            self.disconnect();
        }
    }

    fn handle_overlay(self: &Arc<Self>, payload: &str) {
        let Some(message) = grammar::parse_overlay(payload) else {
            debug!("discarding unrecognized overlay message: {}", payload);
            return;
        };

        match message {
            OverlayMessage::ConfirmProtocol { accepted, .. } => {
                if accepted {
                    for item in self.hooks.subscribed_items() {
                        self.send_chat(&format!("subscribe {}", item));
                    }
                } else {
                    warn!("broker rejected protocol handshake");
                    self.disconnect();
                }
            }
            OverlayMessage::ConfirmRequest { accepted, id, command } => {
                self.handle_confirm(accepted, id, command);
            }
            OverlayMessage::Response { id, code, output } => {
                self.handle_response(id, &code, output);
            }
            OverlayMessage::NotifyAssign { id, worker } => {
                self.handle_assign(id, worker);
            }
            OverlayMessage::NotifyState { worker, busy } => {
                if busy {
                    self.hooks.on_busy_worker(&worker);
                } else {
                    self.hooks.on_idle_worker(&worker);
                }
            }
            OverlayMessage::NotifyCapacity { capacity, details } => {
                self.hooks.on_capacity_changed(capacity, &details);
            }
        }
    }

    fn handle_confirm(self: &Arc<Self>, accepted: bool, id: Option<u64>, command: String) {
        let task = {
            let mut tables = self.tables.lock();
            let pos = tables.unconfirmed.iter().position(|t| t.command() == command);
            let Some(pos) = pos else {
                debug!("discarding confirmation for unknown command {:?}", command);
                return;
            };
            let task = tables.unconfirmed.remove(pos).unwrap();
            task.confirm(if accepted { id } else { None });
            if accepted {
                if let Some(id) = id {
                    tables.accepted.insert(id, task.clone());
                }
            }
            task
        };
        self.notify_waiters();
        self.hooks.on_task_confirmed(&task, accepted);
    }

    fn handle_response(self: &Arc<Self>, id: u64, code: &str, output: String) {
        let task = {
            let mut tables = self.tables.lock();
            tables.accepted.remove(&id)
        };
        let Some(task) = task else {
            debug!("discarding response for unknown task id {}", id);
            return;
        };

        match code.parse::<i64>() {
            Ok(numeric) => task.complete(numeric, output),
            Err(_) => task.terminate(code.to_string()),
        }
        self.notify_waiters();

        let accept = self.hooks.on_task_completed(&task);
        if accept {
            self.send_chat(&format!("accept response {}", id));
        } else {
            self.send_chat(&format!("reject response {}", id));
            task.demote();
            let mut tables = self.tables.lock();
            tables.unconfirmed.push_back(task);
        }
    }

    fn handle_assign(self: &Arc<Self>, id: u64, worker: String) {
        let task = {
            let tables = self.tables.lock();
            tables.accepted.get(&id).cloned()
        };
        let Some(task) = task else {
            debug!("discarding assignment for unknown task id {}", id);
            return;
        };
        task.assign(worker.clone());
        self.notify_waiters();
        self.hooks.on_task_assigned(&task, &worker);
    }
}
