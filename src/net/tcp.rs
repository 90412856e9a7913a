use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Outcome of one TCP connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PortState {
    Open,
    Filtered,
    Closed,
}

impl PortState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Filtered => "filtered",
            Self::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConnectResult {
    pub state: PortState,
    pub elapsed: Duration,
}

impl ConnectResult {
    pub fn connected(&self) -> bool {
        self.state == PortState::Open
    }
}

/// Connect to `ip:port` within `wait`. The socket is closed before returning.
/// Refused connections report `Closed`, timeouts and other errors `Filtered`.
pub async fn tcp_connect(ip: Ipv4Addr, port: u16, wait: Duration) -> ConnectResult {
    let start = Instant::now();
    let state = match timeout(wait, TcpStream::connect(SocketAddr::from((ip, port)))).await {
        Ok(Ok(stream)) => {
            drop(stream);
            PortState::Open
        }
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => PortState::Closed,
        _ => PortState::Filtered,
    };
    ConnectResult {
        state,
        elapsed: start.elapsed(),
    }
}

/// Connect and read whatever the service volunteers.
///
/// Returns the connect result and, when the port is open, the first line of
/// up to `max_len` bytes read within `read_wait`.
pub async fn tcp_connect_with_banner(
    ip: Ipv4Addr,
    port: u16,
    connect_wait: Duration,
    read_wait: Duration,
    max_len: usize,
) -> (ConnectResult, Option<String>) {
    let start = Instant::now();
    match timeout(connect_wait, TcpStream::connect(SocketAddr::from((ip, port)))).await {
        Ok(Ok(mut stream)) => {
            let elapsed = start.elapsed();
            let mut buf = vec![0u8; max_len];
            let banner = match timeout(read_wait, stream.read(&mut buf)).await {
                Ok(Ok(count)) if count > 0 => clean_banner(&buf[..count]),
                _ => None,
            };
            (
                ConnectResult {
                    state: PortState::Open,
                    elapsed,
                },
                banner,
            )
        }
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => (
            ConnectResult {
                state: PortState::Closed,
                elapsed: start.elapsed(),
            },
            None,
        ),
        _ => (
            ConnectResult {
                state: PortState::Filtered,
                elapsed: start.elapsed(),
            },
            None,
        ),
    }
}

/// First non-empty printable line of a banner, at most 30 characters
pub fn clean_banner(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let line = text
        .lines()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())?;
    let printable: String = line
        .chars()
        .filter(|c| !c.is_control())
        .take(30)
        .collect();
    let printable = printable.trim().to_string();
    (!printable.is_empty()).then_some(printable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_is_first_line_trimmed() {
        assert_eq!(
            clean_banner(b"SSH-2.0-OpenSSH_9.6p1 Ubuntu-3ubuntu13\r\nmore"),
            Some("SSH-2.0-OpenSSH_9.6p1 Ubuntu-3".to_string())
        );
        assert_eq!(clean_banner(b"\r\n\r\n220 ftp ready\r\n"), Some("220 ftp ready".to_string()));
        assert_eq!(clean_banner(b"\r\n"), None);
    }
}
