//! The line-oriented UNIX-socket command channel: an acceptor thread hands off each
//! connection to its own reader thread, both feeding a single mutex-guarded command
//! queue the driver loop drains once per tick.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::SocketError;

pub const DEFAULT_SOCKET_ADDR: &str = "./wiimote-mouse.sock";

const ACCEPTOR_POLL: Duration = Duration::from_millis(50);
const READER_POLL: Duration = Duration::from_millis(500);
const MAX_MESSAGE_BYTES: usize = 1024;

/// One parsed `name[:arg1[:arg2...]]` line, tagged with the connection it arrived on
/// so the reply can be unicast back to the right place.
pub struct Command {
    pub name: String,
    pub parameters: Vec<String>,
    connection: Arc<Connection>,
}

struct Connection {
    id: u64,
    stream: Mutex<UnixStream>,
    alive: AtomicBool,
}

impl Connection {
    fn send(&self, msg: &str) {
        let mut bytes = msg.as_bytes();
        if bytes.len() > MAX_MESSAGE_BYTES {
            bytes = &bytes[..MAX_MESSAGE_BYTES];
        }
        if let Ok(mut stream) = self.stream.lock() {
            if let Err(err) = stream.write_all(bytes) {
                debug!(%err, "failed to send message to a control-socket client");
            }
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

struct Shared {
    commands: Mutex<VecDeque<Command>>,
    connections: Mutex<Vec<Arc<Connection>>>,
}

pub struct ControlSocket {
    alive: Arc<AtomicBool>,
    shared: Arc<Shared>,
    acceptor_thread: Option<JoinHandle<()>>,
    socket_path: String,
}

impl ControlSocket {
    pub fn bind(socket_path: &str) -> Result<Self, SocketError> {
        let _ = std::fs::remove_file(socket_path);
        let listener = UnixListener::bind(socket_path).map_err(|source| SocketError::Bind {
            path: socket_path.to_string(),
            source,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| SocketError::Bind { path: socket_path.to_string(), source })?;

        let alive = Arc::new(AtomicBool::new(true));
        let shared = Arc::new(Shared {
            commands: Mutex::new(VecDeque::new()),
            connections: Mutex::new(Vec::new()),
        });

        let acceptor_alive = alive.clone();
        let acceptor_shared = shared.clone();
        let acceptor_thread = std::thread::spawn(move || {
            acceptor_loop(listener, acceptor_alive, acceptor_shared);
        });

        Ok(ControlSocket {
            alive,
            shared,
            acceptor_thread: Some(acceptor_thread),
            socket_path: socket_path.to_string(),
        })
    }

    /// Drain all queued commands, invoking `handler` for each and unicasting its
    /// reply. Commands whose connection has since died are silently dropped.
    pub fn process_events(&self, mut handler: impl FnMut(&str, &[String]) -> String) {
        let mut queue = self.shared.commands.lock().unwrap();
        if queue.is_empty() {
            return;
        }
        let drained: Vec<Command> = queue.drain(..).collect();
        drop(queue);

        for command in drained {
            if !command.connection.is_alive() {
                continue;
            }
            let reply = handler(&command.name, &command.parameters);
            command.connection.send(&format!("{reply}\n"));
        }
    }

    pub fn broadcast(&self, msg: &str) {
        let connections = self.shared.connections.lock().unwrap();
        for conn in connections.iter() {
            conn.send(msg);
        }
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        for conn in self.shared.connections.lock().unwrap().drain(..) {
            conn.alive.store(false, Ordering::SeqCst);
        }
        if let Some(handle) = self.acceptor_thread.take() {
            let _ = handle.join();
        }
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

fn acceptor_loop(listener: UnixListener, alive: Arc<AtomicBool>, shared: Arc<Shared>) {
    let mut next_id: u64 = 0;
    while alive.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _addr)) => {
                let mut connections = shared.connections.lock().unwrap();
                connections.retain(|c| c.is_alive());

                next_id += 1;
                let id = next_id;
                let conn = Arc::new(Connection {
                    id,
                    stream: Mutex::new(stream.try_clone().expect("stream clone")),
                    alive: AtomicBool::new(true),
                });
                connections.push(conn.clone());
                drop(connections);

                let reader_shared = shared.clone();
                std::thread::spawn(move || reader_loop(stream, conn, reader_shared));
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(ACCEPTOR_POLL);
            }
            Err(err) => {
                warn!(%err, "control socket accept failed");
                std::thread::sleep(ACCEPTOR_POLL);
            }
        }
    }
}

fn reader_loop(mut stream: UnixStream, conn: Arc<Connection>, shared: Arc<Shared>) {
    let _ = stream.set_read_timeout(Some(READER_POLL));
    let mut buf = [0u8; MAX_MESSAGE_BYTES];

    while conn.is_alive() {
        match stream.read(&mut buf) {
            Ok(0) => {
                conn.alive.store(false, Ordering::SeqCst);
                break;
            }
            Ok(n) => {
                let text = String::from_utf8_lossy(&buf[..n]);
                for line in text.split('\n') {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let mut parts = line.split(':');
                    let name = match parts.next() {
                        Some(n) if !n.is_empty() => n.to_string(),
                        _ => continue,
                    };
                    let parameters: Vec<String> = parts.map(|s| s.to_string()).collect();
                    shared.commands.lock().unwrap().push_back(Command {
                        name,
                        parameters,
                        connection: conn.clone(),
                    });
                }
            }
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(_) => {
                conn.alive.store(false, Ordering::SeqCst);
                break;
            }
        }
    }
    debug!(connection = conn.id, "control-socket reader thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::os::unix::net::UnixStream as ClientStream;

    #[test]
    fn round_trips_a_command_and_reply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        let socket = ControlSocket::bind(path.to_str().unwrap()).unwrap();

        let mut client = ClientStream::connect(&path).unwrap();
        client.write_all(b"mouse:on\n").unwrap();

        let mut seen = None;
        for _ in 0..50 {
            socket.process_events(|name, params| {
                seen = Some((name.to_string(), params.to_vec()));
                "OK".to_string()
            });
            if seen.is_some() {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        let (name, params) = seen.expect("command should have arrived");
        assert_eq!(name, "mouse");
        assert_eq!(params, vec!["on".to_string()]);
    }
}
