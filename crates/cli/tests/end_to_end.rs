//! Runs the real binaries against kernel message queues
//!
//! Every test writes its own config with a unique server queue name, so the
//! tests can run in parallel without sharing a server.

use std::ffi::OsStr;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use ipc::{ChannelName, PosixTransport, Transport, MSG_MAX_SIZE, QNAME_MAX_SIZE};
use tempfile::TempDir;

const SERVER_BIN: &str = env!("CARGO_BIN_EXE_msgq-server");
const CLIENT_BIN: &str = env!("CARGO_BIN_EXE_msgq-client");
const CLIENT_PREFIX: &str = "/msgq-e2e-client";

struct Setup {
    dir: TempDir,
    server_name: ChannelName,
}

impl Setup {
    fn new(tag: &str) -> Self {
        Self::with_client_prefix(tag, CLIENT_PREFIX)
    }

    fn with_client_prefix(tag: &str, client_prefix: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let server_name =
            ChannelName::new(format!("/msgq-e2e-{}-{}", tag, std::process::id())).unwrap();
        fs::write(
            dir.path().join("config.toml"),
            format!(
                "[queue]\nserver_name = \"{}\"\nclient_prefix = \"{}\"\n",
                server_name, client_prefix
            ),
        )
        .unwrap();
        Self { dir, server_name }
    }

    fn command(&self, bin: &str) -> Command {
        let mut cmd = Command::new(bin);
        cmd.env("MSGQ_CONFIG_PATH", self.dir.path())
            .env_remove("RUST_LOG");
        cmd
    }

    fn start_server(&self) -> ServerProcess {
        let child = self
            .command(SERVER_BIN)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();
        let server = ServerProcess {
            child,
            name: self.server_name.clone(),
        };
        wait_for_channel(&self.server_name);
        server
    }

    fn client(&self, message: impl AsRef<OsStr>) -> Child {
        self.command(CLIENT_BIN)
            .arg(message)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap()
    }

    fn run_client(&self, message: impl AsRef<OsStr>) -> Output {
        self.client(message).wait_with_output().unwrap()
    }
}

/// Kills the server and removes its queue when the test ends
struct ServerProcess {
    child: Child,
    name: ChannelName,
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = PosixTransport::new().destroy(&self.name);
    }
}

fn wait_for_channel(name: &ChannelName) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while PosixTransport::new().open_write_only(name).is_err() {
        assert!(Instant::now() < deadline, "server never created {}", name);
        thread::sleep(Duration::from_millis(20));
    }
}

fn reply_of(output: &Output) -> String {
    assert!(
        output.status.success(),
        "client failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("Reply: "))
        .unwrap_or_else(|| panic!("no reply in output: {}", stdout))
        .to_string()
}

#[test]
fn test_sequence_ids_increase_across_clients() {
    let setup = Setup::new("seq");
    let _server = setup.start_server();

    assert_eq!(reply_of(&setup.run_client("hello")), "Your message id = 1");
    assert_eq!(reply_of(&setup.run_client("world")), "Your message id = 2");
}

#[test]
fn test_concurrent_clients_get_distinct_ids() {
    let setup = Setup::new("concurrent");
    let _server = setup.start_server();

    let first = setup.client("first");
    let second = setup.client("second");
    let mut replies = vec![
        reply_of(&first.wait_with_output().unwrap()),
        reply_of(&second.wait_with_output().unwrap()),
    ];
    replies.sort();
    assert_eq!(replies, vec!["Your message id = 1", "Your message id = 2"]);
}

#[test]
fn test_payload_at_size_limit_is_accepted() {
    let setup = Setup::new("limit");
    let _server = setup.start_server();

    let output = setup.run_client(&"x".repeat(MSG_MAX_SIZE));
    assert_eq!(reply_of(&output), "Your message id = 1");
}

#[test]
fn test_oversized_payload_is_rejected() {
    // No server: the client must fail before touching any queue
    let setup = Setup::new("oversized");
    let output = setup.run_client(&"x".repeat(MSG_MAX_SIZE + 1));

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Message size limit exceeded"), "stderr: {}", stderr);
}

#[test]
fn test_payload_starting_with_hyphen() {
    let setup = Setup::new("hyphen");
    let _server = setup.start_server();

    assert_eq!(reply_of(&setup.run_client("-1")), "Your message id = 1");
    assert_eq!(reply_of(&setup.run_client("-x")), "Your message id = 2");
}

#[test]
fn test_non_utf8_payload_is_sent() {
    let setup = Setup::new("bytes");
    let _server = setup.start_server();

    let output = setup.run_client(OsStr::from_bytes(b"caf\xe9"));
    assert_eq!(reply_of(&output), "Your message id = 1");
}

#[test]
fn test_client_prefix_too_long() {
    // The message itself is fine; only the reply channel name is rejected
    let prefix = format!("/{}", "p".repeat(QNAME_MAX_SIZE - 5));
    let setup = Setup::with_client_prefix("prefix", &prefix);
    let output = setup.run_client("hello");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("Message size limit exceeded"), "stderr: {}", stderr);
    assert!(stderr.contains("Invalid channel name"), "stderr: {}", stderr);
}

#[test]
fn test_missing_argument() {
    let setup = Setup::new("noargs");
    let output = setup.command(CLIENT_BIN).output().unwrap();

    assert!(!output.status.success());
    assert!(!output.stderr.is_empty());
}

#[test]
fn test_server_not_running() {
    let setup = Setup::new("absent");
    let child = setup.client("hello");
    let pid = child.id();
    let output = child.wait_with_output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Is msgq-server running?"), "stderr: {}", stderr);

    let reply_name = ChannelName::for_client(CLIENT_PREFIX, u64::from(pid)).unwrap();
    assert!(PosixTransport::new().open_write_only(&reply_name).is_err());
}
