//! Remote-helper transport for `http:` and `https:` bundle URIs.
//!
//! The helper (by default `git-remote-https`) is spawned as
//! `<helper> origin <uri>` and driven over its stdin/stdout:
//!
//! ```text
//! > capabilities
//! < fetch
//! < get
//! <
//! > get <uri> <dest>
//! >
//! ```
//!
//! The exchange is half-duplex.  Every request is flushed before the next
//! blocking read, otherwise both sides sit on buffered, unsent lines.

use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::Command;
use tracing::{debug, instrument};

use super::Transport;
use crate::config::TransportConfig;
use crate::error::TransportError;

/// Remote name passed to the helper; the helper needs one but we have none.
const REMOTE_NAME: &str = "origin";

#[derive(Debug, Clone)]
pub struct RemoteHelperTransport {
    program: String,
    leading_args: Vec<String>,
}

impl RemoteHelperTransport {
    /// A transport spawning `program` with no extra arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Build from the configured helper command line.  Words after the
    /// first are passed before `origin <uri>`.
    pub fn from_config(config: &TransportConfig) -> Self {
        let mut words = config.remote_helper.iter().cloned();
        let program = words.next().unwrap_or_else(|| "git-remote-https".to_string());
        Self {
            program,
            leading_args: words.collect(),
        }
    }

    fn protocol_error(&self, source: io::Error) -> TransportError {
        TransportError::Protocol {
            helper: self.program.clone(),
            source,
        }
    }

    /// Capability handshake followed by the `get` request.
    async fn negotiate<W, R>(
        &self,
        requests: &mut W,
        responses: &mut R,
        uri: &str,
        dest: &Path,
    ) -> Result<(), TransportError>
    where
        W: AsyncWrite + Unpin,
        R: AsyncBufRead + Unpin,
    {
        requests
            .write_all(b"capabilities\n")
            .await
            .map_err(|e| self.protocol_error(e))?;
        // Must precede the read below.
        requests.flush().await.map_err(|e| self.protocol_error(e))?;

        let capabilities = read_capabilities(responses)
            .await
            .map_err(|e| self.protocol_error(e))?;
        debug!(?capabilities, "remote helper capabilities");

        if !capabilities.iter().any(|c| c == "get") {
            return Err(TransportError::InsufficientCapabilities {
                helper: self.program.clone(),
            });
        }

        let request = format!("get {uri} {}\n\n", dest.display());
        requests
            .write_all(request.as_bytes())
            .await
            .map_err(|e| self.protocol_error(e))?;
        requests.flush().await.map_err(|e| self.protocol_error(e))?;
        requests.shutdown().await.map_err(|e| self.protocol_error(e))?;

        debug!("sent get request");
        Ok(())
    }
}

/// Read capability lines until a blank line or end of stream.
async fn read_capabilities<R>(responses: &mut R) -> io::Result<Vec<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut capabilities = Vec::new();
    let mut line = String::new();

    loop {
        line.clear();
        if responses.read_line(&mut line).await? == 0 {
            break;
        }
        let token = line
            .strip_suffix('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .unwrap_or(line.as_str());
        if token.is_empty() {
            break;
        }
        capabilities.push(token.to_string());
    }

    Ok(capabilities)
}

#[async_trait::async_trait]
impl Transport for RemoteHelperTransport {
    #[instrument(skip(self), fields(helper = %self.program, dest = %dest.display()))]
    async fn materialize(&self, uri: &str, dest: &Path) -> Result<(), TransportError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args).arg(REMOTE_NAME).arg(uri);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit());

        debug!("spawning remote helper");
        let mut child = cmd.spawn().map_err(|source| TransportError::Spawn {
            helper: self.program.clone(),
            source,
        })?;

        let mut requests = child.stdin.take().map(BufWriter::new);
        let mut responses = child.stdout.take().map(BufReader::new);

        let outcome = match (requests.as_mut(), responses.as_mut()) {
            (Some(requests), Some(responses)) => {
                self.negotiate(requests, responses, uri, dest).await
            }
            _ => Err(self.protocol_error(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "remote helper pipes were not captured",
            ))),
        };

        // Closing the request stream lets the helper see EOF and exit.
        drop(requests);
        let status = child.wait().await.map_err(|e| self.protocol_error(e))?;
        drop(responses);

        if !status.success() {
            return Err(TransportError::HelperExit {
                helper: self.program.clone(),
                status,
            });
        }

        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sh_helper;

    #[tokio::test]
    async fn capabilities_end_at_blank_line() {
        let mut input = "fetch\r\nget\n\nignored\n".as_bytes();
        let caps = read_capabilities(&mut input).await.unwrap();
        assert_eq!(caps, ["fetch", "get"]);
    }

    #[tokio::test]
    async fn capabilities_end_at_eof() {
        let mut input = "option\nget".as_bytes();
        let caps = read_capabilities(&mut input).await.unwrap();
        assert_eq!(caps, ["option", "get"]);
    }

    #[tokio::test]
    async fn negotiate_writes_get_after_capabilities() {
        let transport = RemoteHelperTransport::new("test-helper");
        let mut requests: Vec<u8> = Vec::new();
        let mut responses = "get\n\n".as_bytes();

        transport
            .negotiate(
                &mut requests,
                &mut responses,
                "https://host/x.bundle",
                Path::new("/tmp/dest"),
            )
            .await
            .unwrap();

        assert_eq!(
            String::from_utf8(requests).unwrap(),
            "capabilities\nget https://host/x.bundle /tmp/dest\n\n"
        );
    }

    #[tokio::test]
    async fn negotiate_stops_without_get() {
        let transport = RemoteHelperTransport::new("test-helper");
        let mut requests: Vec<u8> = Vec::new();
        let mut responses = "fetch\n\n".as_bytes();

        let err = transport
            .negotiate(&mut requests, &mut responses, "https://h/x", Path::new("/d"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::InsufficientCapabilities { .. }));
        assert_eq!(requests, b"capabilities\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn helper_downloads_on_get() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("args.log");
        let helper = sh_helper(
            tmp.path(),
            &format!(
                r#"echo "$1 $2" > '{log}'
read cmd
printf 'fetch\nget\n\n'
read verb uri path
read blank
printf 'payload' > "$path"
"#,
                log = log.display()
            ),
        );
        let dest = tmp.path().join("dest.bundle");

        RemoteHelperTransport::from_config(&helper)
            .materialize("https://host/x.bundle", &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
        assert_eq!(
            std::fs::read_to_string(&log).unwrap(),
            "origin https://host/x.bundle\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn helper_without_get_never_receives_get() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("requests.log");
        let helper = sh_helper(
            tmp.path(),
            &format!(
                r#"read cmd
echo "$cmd" >> '{log}'
printf 'fetch\n\n'
while read line; do echo "$line" >> '{log}'; done
"#,
                log = log.display()
            ),
        );
        let dest = tmp.path().join("dest.bundle");

        let err = RemoteHelperTransport::from_config(&helper)
            .materialize("https://host/x.bundle", &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::InsufficientCapabilities { .. }));
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "capabilities\n");
        assert!(!dest.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn capabilities_may_end_with_closed_stream() {
        let tmp = tempfile::tempdir().unwrap();
        let helper = sh_helper(
            tmp.path(),
            r#"read cmd
printf 'get\n'
exec 1>&-
read verb uri path
printf 'eof' > "$path"
"#,
        );
        let dest = tmp.path().join("dest.bundle");

        RemoteHelperTransport::from_config(&helper)
            .materialize("http://host/x.bundle", &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"eof");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_fails_even_after_get() {
        let tmp = tempfile::tempdir().unwrap();
        let helper = sh_helper(
            tmp.path(),
            r#"read cmd
printf 'get\n\n'
read verb uri path
exit 3
"#,
        );

        let err = RemoteHelperTransport::from_config(&helper)
            .materialize("https://host/x.bundle", &tmp.path().join("dest"))
            .await
            .unwrap_err();

        let TransportError::HelperExit { status, .. } = err else {
            panic!("expected HelperExit, got {err:?}");
        };
        assert_eq!(status.code(), Some(3));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_outranks_missing_get() {
        let tmp = tempfile::tempdir().unwrap();
        let helper = sh_helper(
            tmp.path(),
            r#"read cmd
printf 'fetch\n\n'
while read line; do :; done
exit 1
"#,
        );

        let err = RemoteHelperTransport::from_config(&helper)
            .materialize("https://host/x.bundle", &tmp.path().join("dest"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::HelperExit { .. }));
    }

    #[tokio::test]
    async fn missing_helper_is_a_spawn_error() {
        let err = RemoteHelperTransport::new("/nonexistent/git-remote-https")
            .materialize("https://host/x.bundle", Path::new("/tmp/never"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Spawn { .. }));
    }
}
