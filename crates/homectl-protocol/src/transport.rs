//! Byte-stream transports.
//!
//! The session layer talks to the controller through the [`Transport`] trait
//! so that the same state machine drives a real TCP socket or a scripted
//! stream in tests. A [`Connector`] produces a transport for one cycle.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, trace};

/// Telnet port used when the host string has none.
pub const DEFAULT_PORT: u16 = 23;

/// Smallest read timeout handed to the socket. A zero timeout means
/// "block forever" to the OS, so it is never passed through.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Result of a single bounded read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEvent {
    /// This many bytes were placed in the buffer. Zero means the read was
    /// interrupted and may be retried.
    Data(usize),
    /// Nothing arrived before the timeout.
    TimedOut,
    /// The peer closed the connection.
    Closed,
}

/// A bidirectional byte stream with bounded reads.
pub trait Transport {
    /// Write all of `data` to the peer.
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Read whatever is available, waiting at most `timeout`.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<ReadEvent>;

    /// Release the underlying handle. Called at most once per transport.
    fn close(&mut self);
}

/// Opens transports to the controller.
pub trait Connector {
    /// Transport produced by this connector.
    type Transport: Transport;

    /// Connect to `host`, giving up after `timeout`.
    fn connect(&self, host: &str, timeout: Duration) -> io::Result<Self::Transport>;
}

/// TCP transport to the controller's telnet bridge.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpTransport {
    /// Connect to `host` (`name`, `name:port`, `ip`, `ip:port` or `[v6]:port`).
    ///
    /// Every resolved address is tried in turn; the last error is returned
    /// if none accepts.
    pub fn connect(host: &str, timeout: Duration) -> io::Result<Self> {
        let addrs = resolve(host)?;
        let mut last_err = None;

        for addr in addrs {
            trace!("Connecting to {} ({})", host, addr);
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    debug!("Connected to {}", addr);
                    return Ok(TcpTransport { stream, peer: addr });
                }
                Err(e) => {
                    debug!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no addresses found for {}", host),
            )
        }))
    }

    /// Address of the connected peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data)?;
        self.stream.flush()
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<ReadEvent> {
        self.stream
            .set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;

        match self.stream.read(buf) {
            Ok(0) => Ok(ReadEvent::Closed),
            Ok(n) => Ok(ReadEvent::Data(n)),
            // Unix reports an expired SO_RCVTIMEO as WouldBlock, Windows as TimedOut
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(ReadEvent::TimedOut)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(ReadEvent::Data(0)),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
                ) =>
            {
                Ok(ReadEvent::Closed)
            }
            Err(e) => Err(e),
        }
    }

    fn close(&mut self) {
        // The socket may already be gone on the peer side
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

/// Connector producing [`TcpTransport`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Transport = TcpTransport;

    fn connect(&self, host: &str, timeout: Duration) -> io::Result<TcpTransport> {
        TcpTransport::connect(host, timeout)
    }
}

/// Resolve a host string, appending [`DEFAULT_PORT`] when no port is given.
pub fn resolve(host: &str) -> io::Result<Vec<SocketAddr>> {
    let target = if has_port(host) {
        host.to_string()
    } else {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if bare.contains(':') {
            format!("[{}]:{}", bare, DEFAULT_PORT)
        } else {
            format!("{}:{}", bare, DEFAULT_PORT)
        }
    };
    Ok(target.to_socket_addrs()?.collect())
}

fn has_port(host: &str) -> bool {
    if host.parse::<SocketAddr>().is_ok() {
        return true;
    }
    // A bare IPv6 address has several colons and no port
    match host.rsplit_once(':') {
        Some((name, port)) => !name.contains(':') && port.parse::<u16>().is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_has_port() {
        assert!(has_port("192.168.1.230:23"));
        assert!(has_port("controller.local:2323"));
        assert!(has_port("[::1]:23"));
        assert!(!has_port("192.168.1.230"));
        assert!(!has_port("controller.local"));
        assert!(!has_port("::1"));
    }

    #[test]
    fn test_resolve_appends_default_port() {
        let addrs = resolve("127.0.0.1").unwrap();
        assert_eq!(addrs, vec!["127.0.0.1:23".parse().unwrap()]);

        let addrs = resolve("::1").unwrap();
        assert_eq!(addrs, vec!["[::1]:23".parse().unwrap()]);

        let addrs = resolve("127.0.0.1:4000").unwrap();
        assert_eq!(addrs[0].port(), 4000);
    }

    #[test]
    fn test_tcp_transport_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut byte = [0u8; 1];
            socket.read_exact(&mut byte).unwrap();
            assert_eq!(&byte, b"n");
            socket.write_all(b"CONNECT").unwrap();
        });

        let mut transport =
            TcpTransport::connect(&addr.to_string(), Duration::from_secs(1)).unwrap();
        assert_eq!(transport.peer_addr(), addr);
        transport.send(b"n").unwrap();

        let mut received = Vec::new();
        let mut buf = [0u8; 16];
        loop {
            match transport.recv(&mut buf, Duration::from_secs(1)).unwrap() {
                ReadEvent::Data(n) => received.extend_from_slice(&buf[..n]),
                ReadEvent::Closed => break,
                ReadEvent::TimedOut => panic!("server should have answered"),
            }
        }
        assert_eq!(received, b"CONNECT");

        transport.close();
        server.join().unwrap();
    }

    #[test]
    fn test_tcp_transport_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let mut transport =
            TcpTransport::connect(&addr.to_string(), Duration::from_secs(1)).unwrap();
        let (_socket, _) = listener.accept().unwrap();

        let mut buf = [0u8; 4];
        let event = transport.recv(&mut buf, Duration::from_millis(20)).unwrap();
        assert_eq!(event, ReadEvent::TimedOut);
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to find a port with no listener
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let result = TcpConnector.connect(&addr.to_string(), Duration::from_millis(200));
        assert!(result.is_err());
    }
}
