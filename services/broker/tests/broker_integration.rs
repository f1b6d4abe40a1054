//! Exercises `BrokerAdapter` against a hand-scripted loopback peer that plays
//! both the relay's handshake replies and the broker's chat responses,
//! matching spec.md §8's literal end-to-end scenarios 5 and 6.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use broker_client::{BrokerAdapter, BrokerHooks, Task, TaskState};

/// Reads and discards lines from `reader` until one starts with `prefix`,
/// returning the full matching line.
fn read_until(reader: &mut impl BufRead, prefix: &str) -> String {
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).expect("peer read failed");
        assert!(n > 0, "peer closed before seeing a line starting with {prefix:?}");
        let line = line.trim_end_matches(['\n', '\r']).to_string();
        if line.starts_with(prefix) {
            return line;
        }
    }
}

fn send(stream: &mut TcpStream, line: &str) {
    stream.write_all(line.as_bytes()).unwrap();
    stream.write_all(b"\n").unwrap();
}

#[derive(Default)]
struct RecordingHooks {
    events: Mutex<Vec<String>>,
    accept_completions: bool,
}

impl RecordingHooks {
    fn new(accept_completions: bool) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            accept_completions,
        }
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl BrokerHooks for RecordingHooks {
    fn on_task_confirmed(&self, _task: &Arc<Task>, accepted: bool) {
        self.events.lock().unwrap().push(format!("confirmed:{accepted}"));
    }

    fn on_task_assigned(&self, _task: &Arc<Task>, worker: &str) {
        self.events.lock().unwrap().push(format!("assigned:{worker}"));
    }

    fn on_task_completed(&self, _task: &Arc<Task>) -> bool {
        self.events.lock().unwrap().push("completed".to_string());
        self.accept_completions
    }
}

/// Performs the handshake half of the scripted peer: reads `protocol 0` and
/// `name`, replies with the auto-assigned name, then confirms the overlay
/// protocol handshake and drains the default subscribe requests.
fn handshake(reader: &mut impl BufRead, stream: &mut TcpStream) {
    read_until(reader, "protocol");
    read_until(reader, "name");
    send(stream, "% name: u1");
    read_until(reader, "broker << use protocol 0");
    send(stream, "broker >> accept protocol chat");
    for _ in 0..3 {
        read_until(reader, "broker << subscribe");
    }
}

#[test]
fn task_happy_path_fires_upcalls_in_order() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        handshake(&mut reader, &mut stream);

        read_until(&mut reader, "broker << request {ls}");
        send(&mut stream, "broker >> accept request 7 {ls}");
        send(&mut stream, "broker >> notify assign request 7 to w1");
        send(&mut stream, "broker >> response 7 0 {ok}");
        read_until(&mut reader, "broker << accept response 7");
    });

    let hooks = Arc::new(RecordingHooks::new(true));
    let adapter =
        BrokerAdapter::connect("127.0.0.1", port, None, "broker", hooks.clone(), None, 50).unwrap();

    let task = adapter.request("ls", None, Some(TaskState::Completed), 5_000);

    assert_eq!(task.id(), Some(7));
    assert_eq!(task.state(), TaskState::Completed);
    assert_eq!(task.code(), 0);
    assert_eq!(task.output(), "ok");
    assert_eq!(
        hooks.events(),
        vec!["confirmed:true".to_string(), "assigned:w1".to_string(), "completed".to_string()]
    );

    adapter.disconnect();
    server.join().unwrap();
}

#[test]
fn rejected_completion_demotes_task_and_sends_reject() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        handshake(&mut reader, &mut stream);

        read_until(&mut reader, "broker << request {build}");
        send(&mut stream, "broker >> accept request 9 {build}");
        send(&mut stream, "broker >> response 9 0 {v}");
        read_until(&mut reader, "broker << reject response 9");
    });

    let hooks = Arc::new(RecordingHooks::new(false));
    let adapter =
        BrokerAdapter::connect("127.0.0.1", port, None, "broker", hooks.clone(), None, 50).unwrap();

    let task = adapter.request("build", None, Some(TaskState::Completed), 5_000);

    // Give the reader thread a beat to process the reject path after the
    // waiter woke on the completed state.
    std::thread::sleep(Duration::from_millis(50));

    assert_eq!(task.state(), TaskState::Unconfirmed);
    assert_eq!(hooks.events(), vec!["confirmed:true".to_string(), "completed".to_string()]);

    adapter.disconnect();
    server.join().unwrap();
}

#[test]
fn reject_request_leaves_id_unset() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());

        handshake(&mut reader, &mut stream);

        read_until(&mut reader, "broker << request {bogus}");
        send(&mut stream, "broker >> reject request {bogus}");
    });

    let hooks = Arc::new(RecordingHooks::new(true));
    let adapter =
        BrokerAdapter::connect("127.0.0.1", port, None, "broker", hooks.clone(), None, 50).unwrap();

    let task = adapter.request("bogus", None, Some(TaskState::Confirmed), 5_000);

    assert_eq!(task.id(), None);
    assert_eq!(task.state(), TaskState::Confirmed);
    assert_eq!(hooks.events(), vec!["confirmed:false".to_string()]);

    adapter.disconnect();
    server.join().unwrap();
}
