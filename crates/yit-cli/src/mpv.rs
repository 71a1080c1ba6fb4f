/// Control-channel client for the background mpv process.
///
/// Every call is a full round trip on a fresh connection:
///
/// ```text
///   connect(endpoint) ── write {"command":[...]}\n ── read one reply line ── close
/// ```
///
/// There are no request ids and no multiplexing, so exactly one request is in
/// flight per connection.  A refused or missing endpoint is reported as
/// `IpcError::Absent`, which callers treat as "no player running".
///
/// Platform notes:
/// - Unix:   Unix domain socket at `~/.yit/socket`
/// - Windows: Named pipe `\\.\pipe\yit_socket`
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};
use yit_proto::protocol::{MpvCommand, MpvResponse};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

#[derive(Debug, Error)]
pub enum IpcError {
    /// Nothing is listening on the endpoint.
    #[error("player is not running")]
    Absent,

    #[error("player did not answer within {0:?}")]
    Timeout(Duration),

    #[error("unexpected reply from player: {0}")]
    Protocol(String),

    #[error("IPC I/O error: {0}")]
    Io(#[from] io::Error),
}

/// One request, one reply.
#[allow(async_fn_in_trait)]
pub trait ControlChannel {
    async fn call(&self, cmd: &MpvCommand) -> Result<MpvResponse, IpcError>;

    async fn get_property(&self, prop: &str) -> Result<MpvResponse, IpcError> {
        self.call(&MpvCommand::get(prop)).await
    }

    /// Data of a successful `get_property`, `None` on any failure.
    async fn property(&self, prop: &str) -> Option<Value> {
        match self.get_property(prop).await {
            Ok(resp) if resp.is_success() => resp.data,
            _ => None,
        }
    }
}

/// Turn a non-success status into an error so batch callers can record it.
pub fn expect_success(result: Result<MpvResponse, IpcError>) -> Result<MpvResponse, IpcError> {
    let resp = result?;
    if resp.is_success() {
        Ok(resp)
    } else {
        Err(IpcError::Protocol(format!("player replied '{}'", resp.error)))
    }
}

/// Stateless client bound to the fixed endpoint.
#[derive(Debug, Clone)]
pub struct MpvClient {
    endpoint: PathBuf,
    timeout: Duration,
}

impl MpvClient {
    pub fn new(endpoint: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    async fn round_trip(&self, line: &str) -> Result<MpvResponse, IpcError> {
        let stream = connect(&self.endpoint).await?;
        exchange(stream, line).await
    }
}

impl ControlChannel for MpvClient {
    async fn call(&self, cmd: &MpvCommand) -> Result<MpvResponse, IpcError> {
        let line = cmd
            .encode_line()
            .map_err(|e| IpcError::Protocol(e.to_string()))?;
        debug!("mpv ipc: send {}", line.trim_end());

        let result = match tokio::time::timeout(self.timeout, self.round_trip(&line)).await {
            Ok(r) => r,
            Err(_) => Err(IpcError::Timeout(self.timeout)),
        };
        match &result {
            Ok(resp) => debug!("mpv ipc: reply error={} data={:?}", resp.error, resp.data),
            Err(IpcError::Absent) => debug!("mpv ipc: no listener at {}", self.endpoint.display()),
            Err(e) => warn!("mpv ipc: {} failed: {}", line.trim_end(), e),
        }
        result
    }
}

fn classify_connect_error(e: io::Error) -> IpcError {
    match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => IpcError::Absent,
        _ => IpcError::Io(e),
    }
}

#[cfg(unix)]
async fn connect(endpoint: &Path) -> Result<UnixStream, IpcError> {
    UnixStream::connect(endpoint)
        .await
        .map_err(classify_connect_error)
}

#[cfg(windows)]
async fn connect(
    endpoint: &Path,
) -> Result<tokio::net::windows::named_pipe::NamedPipeClient, IpcError> {
    ClientOptions::new()
        .open(endpoint)
        .map_err(classify_connect_error)
}

/// Write one request line and read lines until the reply arrives.
async fn exchange<S>(stream: S, line: &str) -> Result<MpvResponse, IpcError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (read_half, mut write_half) = tokio::io::split(stream);
    write_half.write_all(line.as_bytes()).await?;
    write_half.flush().await?;

    let mut reader = BufReader::new(read_half);
    let mut buf = String::new();
    loop {
        buf.clear();
        if reader.read_line(&mut buf).await? == 0 {
            return Err(IpcError::Protocol("connection closed before reply".into()));
        }
        let trimmed = buf.trim();
        if trimmed.is_empty() {
            continue;
        }
        let val: Value = serde_json::from_str(trimmed)
            .map_err(|e| IpcError::Protocol(format!("invalid json '{}': {}", trimmed, e)))?;

        // Unsolicited events can precede the reply on a fresh connection.
        if val.get("event").is_some() {
            debug!("mpv ipc: skipping event {}", trimmed);
            continue;
        }
        return serde_json::from_value(val)
            .map_err(|e| IpcError::Protocol(format!("malformed reply '{}': {}", trimmed, e)));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;
    use tokio::net::UnixListener;
    use yit_proto::protocol::LoadMode;

    /// Accept one connection, capture the request line, send `reply` verbatim.
    async fn serve_once(listener: UnixListener, reply: &'static str) -> String {
        let (stream, _) = listener.accept().await.unwrap();
        let (r, mut w) = stream.into_split();
        let mut lines = BufReader::new(r).lines();
        let request = lines.next_line().await.unwrap().unwrap();
        w.write_all(reply.as_bytes()).await.unwrap();
        request
    }

    fn client(path: &Path) -> MpvClient {
        MpvClient::new(path, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let c = client(&dir.path().join("nope.sock"));
        let started = std::time::Instant::now();
        let result = c.get_property("idle-active").await;
        assert!(matches!(result, Err(IpcError::Absent)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_stale_socket_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists());
        let result = client(&path).get_property("idle-active").await;
        assert!(matches!(result, Err(IpcError::Absent)));
    }

    #[tokio::test]
    async fn test_round_trip_wire_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mpv.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(serve_once(listener, "{\"error\":\"success\",\"data\":null}\n"));

        let cmd = MpvCommand::load("https://x/watch?v=abc12345678", LoadMode::Replace);
        let resp = client(&path).call(&cmd).await.unwrap();
        assert!(resp.is_success());

        let request = server.await.unwrap();
        assert_eq!(
            request,
            "{\"command\":[\"loadfile\",\"https://x/watch?v=abc12345678\",\"replace\"]}"
        );
    }

    #[tokio::test]
    async fn test_events_before_reply_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mpv.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(serve_once(
            listener,
            "{\"event\":\"idle\"}\n\n{\"data\":true,\"error\":\"success\"}\n",
        ));

        let resp = client(&path).get_property("pause").await.unwrap();
        assert_eq!(resp.data_bool(), Some(true));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_returned_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mpv.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(serve_once(listener, "{\"error\":\"property unavailable\"}\n"));

        let c = client(&path);
        let resp = c.get_property("media-title").await.unwrap();
        assert!(!resp.is_success());
        assert!(matches!(expect_success(Ok(resp)), Err(IpcError::Protocol(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_reply_is_protocol_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mpv.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(serve_once(listener, "not json at all\n"));

        let result = client(&path).get_property("pause").await;
        assert!(matches!(result, Err(IpcError::Protocol(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_without_reply_is_protocol_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mpv.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let server = tokio::spawn(serve_once(listener, ""));

        let result = client(&path).get_property("pause").await;
        assert!(matches!(result, Err(IpcError::Protocol(_))));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_silent_player_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mpv.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        });

        let c = MpvClient::new(&path, Duration::from_millis(100));
        let result = c.get_property("pause").await;
        assert!(matches!(result, Err(IpcError::Timeout(_))));
    }
}
