//! Unix-socket command server.
//!
//! Binds a Unix stream socket and serves every accepted connection on its
//! own thread, so a slow `get` never holds up another client's `inc`.
//!
//! # Wire format
//!
//! A client writes exactly one command line and reads exactly one reply
//! line, after which the server closes the connection:
//!
//! ```text
//! > inc
//! < ok
//! ```
//!
//! A connection that closes before sending a full line (terminated by `\n`),
//! or whose line exceeds [`MAX_LINE`] bytes, gets no reply.  A line that is
//! not valid UTF-8 is answered with `Invalid command`.

use crate::command::{Command, Response, UnknownCommand};
use crate::ipc::dispatch::Dispatcher;
use crate::traits::{DeviceAdapter, Notifier};
use log::{debug, error, info, warn};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

/// Default socket path.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/brightness.sock";

/// Longest accepted command line, newline included.
pub const MAX_LINE: u64 = 64 * 1024;

/// Mode of the socket file: any local user may connect.
const SOCKET_MODE: u32 = 0o666;

/// Errors raised while setting up the socket.  All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("another instance is already listening on {}", path.display())]
    InUse { path: PathBuf },
    #[error("failed to remove stale socket {}: {source}", path.display())]
    RemoveStale { path: PathBuf, source: io::Error },
    #[error("failed to bind {}: {source}", path.display())]
    Bind { path: PathBuf, source: io::Error },
    #[error("failed to set permissions on {}: {source}", path.display())]
    Permissions { path: PathBuf, source: io::Error },
}

/// A bound Unix socket that serves the brightd protocol.
///
/// The socket file is removed when the server is dropped.
pub struct UnixSocketServer {
    path: PathBuf,
    listener: UnixListener,
}

impl UnixSocketServer {
    /// Replace any stale socket at `path`, bind it and open it up to all
    /// local users.
    ///
    /// Fails with [`ServerError::InUse`] if a live server still accepts
    /// connections at `path`.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref().to_path_buf();

        if UnixStream::connect(&path).is_ok() {
            return Err(ServerError::InUse { path });
        }

        match std::fs::remove_file(&path) {
            Ok(()) => debug!("removed stale socket {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(ServerError::RemoveStale { path, source }),
        }

        let listener = match UnixListener::bind(&path) {
            Ok(l) => l,
            Err(source) => return Err(ServerError::Bind { path, source }),
        };

        let perms = std::fs::Permissions::from_mode(SOCKET_MODE);
        if let Err(source) = std::fs::set_permissions(&path, perms) {
            drop(listener);
            let _ = std::fs::remove_file(&path);
            return Err(ServerError::Permissions { path, source });
        }

        info!("listening on {}", path.display());
        Ok(Self { path, listener })
    }

    /// The filesystem path of the socket.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections forever, one handler thread per connection.
    ///
    /// This method **blocks**.  Accept errors are logged and do not stop the
    /// loop.
    pub fn serve<D, N>(&self, dispatcher: Arc<Dispatcher<D, N>>)
    where
        D: DeviceAdapter + 'static,
        N: Notifier + 'static,
    {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let dispatcher = Arc::clone(&dispatcher);
                    let spawned = thread::Builder::new()
                        .name("brightd-client".into())
                        .spawn(move || {
                            if let Err(e) = handle_connection(stream, &dispatcher) {
                                debug!("connection dropped: {}", e);
                            }
                        });
                    if let Err(e) = spawned {
                        error!("failed to spawn connection handler: {}", e);
                    }
                }
                Err(e) => {
                    error!("accept error: {}", e);
                }
            }
        }
    }
}

impl Drop for UnixSocketServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Read one command line, answer it, and close.
fn handle_connection<D, N>(stream: UnixStream, dispatcher: &Dispatcher<D, N>) -> io::Result<()>
where
    D: DeviceAdapter + 'static,
    N: Notifier + 'static,
{
    debug!("client connected");
    let mut reader = BufReader::new(&stream).take(MAX_LINE);
    let mut line = Vec::new();
    reader.read_until(b'\n', &mut line)?;
    if line.last() != Some(&b'\n') {
        debug!("client closed or overran {} bytes before sending a full line", MAX_LINE);
        return Ok(());
    }

    let parsed = std::str::from_utf8(&line)
        .map_err(|_| UnknownCommand(String::from_utf8_lossy(&line).trim().to_string()))
        .and_then(str::parse::<Command>);
    let response = match parsed {
        Ok(cmd) => {
            debug!("received {}", cmd);
            dispatcher.dispatch(cmd)
        }
        Err(e) => {
            warn!("{}", e);
            Response::InvalidCommand
        }
    };

    (&stream).write_all(response.to_string().as_bytes())
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{CoalescingEngine, Cycle, EngineSettings};
    use crate::ipc::dispatch::DEFAULT_MAX;
    use crate::traits::Level;
    use std::net::Shutdown;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};
    use std::time::Duration;

    /// Monotonic counter to generate unique socket paths per test.
    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    /// Helper: create a unique temporary socket path for each test.
    fn tmp_socket_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!(
            "brightd-test-{}-{}.sock",
            std::process::id(),
            id
        ))
    }

    /// Display double.  While `gate` holds a receiver, `query` blocks until
    /// a message arrives on it.
    #[derive(Debug)]
    struct TestDisplay {
        level: Mutex<Option<Level>>,
        queries: AtomicUsize,
        sets: Mutex<Vec<u32>>,
        gate: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl TestDisplay {
        fn new(level: Option<Level>) -> Self {
            Self {
                level: Mutex::new(level),
                queries: AtomicUsize::new(0),
                sets: Mutex::new(Vec::new()),
                gate: Mutex::new(None),
            }
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("test display error")]
    struct TestErr;

    impl DeviceAdapter for TestDisplay {
        type Error = TestErr;

        fn query(&self) -> Result<Level, TestErr> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = self.gate.lock().unwrap().as_ref() {
                let _ = gate.recv();
            }
            (*self.level.lock().unwrap()).ok_or(TestErr)
        }

        fn set_level(&self, value: u32) -> Result<(), TestErr> {
            self.sets.lock().unwrap().push(value);
            Ok(())
        }

        fn set_power(&self, _on: bool) -> Result<(), TestErr> {
            Ok(())
        }
    }

    struct NullNotifier;

    impl Notifier for NullNotifier {
        type Error = TestErr;

        fn notify(&self) -> Result<(), TestErr> {
            Ok(())
        }
    }

    type TestEngine = CoalescingEngine<TestDisplay, NullNotifier>;

    /// Bind a server on a fresh path and serve it from a background thread.
    fn start(display: TestDisplay) -> (PathBuf, Arc<TestEngine>) {
        let engine = Arc::new(CoalescingEngine::new(
            Arc::new(display),
            Arc::new(NullNotifier),
            EngineSettings::default(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&engine), DEFAULT_MAX));
        let server = UnixSocketServer::bind(tmp_socket_path()).expect("bind");
        let path = server.path().to_path_buf();
        thread::spawn(move || server.serve(dispatcher));
        (path, engine)
    }

    /// Send `request` verbatim and read until the server closes.
    fn exchange(path: &Path, request: &str) -> String {
        let mut stream = UnixStream::connect(path).expect("connect");
        stream.write_all(request.as_bytes()).unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).unwrap();
        reply
    }

    #[test]
    fn bind_sets_world_writable_mode() {
        let (path, _) = start(TestDisplay::new(None));
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o666);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn bind_replaces_stale_socket_file() {
        let path = tmp_socket_path();
        std::fs::write(&path, b"stale").unwrap();
        let server = UnixSocketServer::bind(&path).expect("bind over stale file");
        assert!(UnixStream::connect(&path).is_ok());
        drop(server);
        assert!(!path.exists());
    }

    #[test]
    fn second_bind_on_live_socket_fails() {
        let path = tmp_socket_path();
        let first = UnixSocketServer::bind(&path).expect("first bind");
        match UnixSocketServer::bind(&path) {
            Err(ServerError::InUse { .. }) => {}
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("second bind should fail"),
        }
        // The live socket was left alone.
        assert!(UnixStream::connect(first.path()).is_ok());
    }

    #[test]
    fn bind_into_missing_directory_fails() {
        let path = std::env::temp_dir()
            .join(format!("brightd-missing-{}", std::process::id()))
            .join("nested")
            .join("brightd.sock");
        match UnixSocketServer::bind(&path) {
            Err(ServerError::Bind { path: p, .. }) => assert_eq!(p, path),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("bind should fail"),
        }
    }

    #[test]
    fn inc_replies_ok_and_records_step() {
        let (path, engine) = start(TestDisplay::new(Some(Level::new(50, 100))));
        assert_eq!(exchange(&path, "inc\n"), "ok\n");
        match engine.tick() {
            Cycle::Dispatched { target, worker } => {
                worker.join().unwrap();
                assert_eq!(target, 60);
            }
            other => panic!("expected dispatch, got {:?}", other),
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn get_replies_with_json_percentage() {
        let (path, _) = start(TestDisplay::new(Some(Level::new(0, 50))));
        assert_eq!(exchange(&path, "get\n"), "{\"percentage\": 1}\n");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn get_replies_error_when_query_fails() {
        let (path, _) = start(TestDisplay::new(None));
        assert_eq!(exchange(&path, "get\n"), "error\n");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unknown_command_is_rejected_and_connection_closed() {
        let (path, _) = start(TestDisplay::new(None));
        let mut stream = UnixStream::connect(&path).expect("connect");
        stream.write_all(b"foo\n").unwrap();
        // Reading to EOF proves the server closed without waiting for more.
        let mut reply = String::new();
        stream.read_to_string(&mut reply).unwrap();
        assert_eq!(reply, "Invalid command\n");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn only_the_first_line_is_answered() {
        let (path, engine) = start(TestDisplay::new(Some(Level::new(50, 100))));
        let mut stream = UnixStream::connect(&path).expect("connect");
        stream.write_all(b"dec\ninc\ninc\n").unwrap();
        let mut reply = String::new();
        BufReader::new(&stream).read_line(&mut reply).unwrap();
        assert_eq!(reply, "ok\n");
        drop(stream);
        match engine.tick() {
            Cycle::Dispatched { target, worker } => {
                worker.join().unwrap();
                assert_eq!(target, 40);
            }
            other => panic!("expected dispatch, got {:?}", other),
        }
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn non_utf8_line_is_rejected() {
        let (path, engine) = start(TestDisplay::new(Some(Level::new(50, 100))));
        let mut stream = UnixStream::connect(&path).expect("connect");
        stream.write_all(b"\xff\xfe\n").unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).unwrap();
        assert_eq!(reply, "Invalid command\n");
        assert!(matches!(engine.tick(), Cycle::Idle));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn overlong_line_is_dropped_without_reply() {
        let (path, engine) = start(TestDisplay::new(Some(Level::new(50, 100))));
        let mut stream = UnixStream::connect(&path).expect("connect");
        let mut request = vec![b' '; MAX_LINE as usize];
        request.extend_from_slice(b"inc\n");
        // The server may close mid-write once the limit is reached.
        let _ = stream.write_all(&request);
        let mut buf = [0u8; 64];
        // Unread data at close can surface as a reset instead of EOF.
        let n = stream.read(&mut buf).unwrap_or(0);
        assert_eq!(n, 0);
        assert!(matches!(engine.tick(), Cycle::Idle));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn eof_without_newline_gets_no_reply() {
        let (path, engine) = start(TestDisplay::new(Some(Level::new(50, 100))));
        let mut stream = UnixStream::connect(&path).expect("connect");
        stream.write_all(b"inc").unwrap();
        stream.shutdown(Shutdown::Write).unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).unwrap();
        assert_eq!(reply, "");
        assert!(matches!(engine.tick(), Cycle::Idle));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn concurrent_inc_and_dec_cancel_but_still_query() {
        let (path, engine) = start(TestDisplay::new(Some(Level::new(50, 100))));
        let clients: Vec<_> = ["inc\n", "dec\n"]
            .into_iter()
            .map(|req| {
                let path = path.clone();
                thread::spawn(move || exchange(&path, req))
            })
            .collect();
        for c in clients {
            assert_eq!(c.join().unwrap(), "ok\n");
        }

        match engine.tick() {
            Cycle::Dispatched { target, worker } => {
                worker.join().unwrap();
                assert_eq!(target, 50);
            }
            other => panic!("expected dispatch, got {:?}", other),
        }
        assert_eq!(engine.device().queries.load(Ordering::SeqCst), 1);
        assert_eq!(*engine.device().sets.lock().unwrap(), vec![50]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn slow_get_does_not_block_inc() {
        let display = TestDisplay::new(Some(Level::new(50, 100)));
        let (release, gate) = mpsc::channel();
        *display.gate.lock().unwrap() = Some(gate);
        let (path, engine) = start(display);

        let slow = {
            let path = path.clone();
            thread::spawn(move || exchange(&path, "get\n"))
        };
        // Wait until the get is parked inside the display.
        while engine.device().queries.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(exchange(&path, "inc\n"), "ok\n");

        release.send(()).unwrap();
        assert_eq!(slow.join().unwrap(), "{\"percentage\": 50}\n");
        let _ = std::fs::remove_file(&path);
    }
}
