//! Connection establishment and the framed transport halves.

use std::time::Duration;

use skald_proto::LineCodec;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

use crate::config::IrcConfig;
use crate::error::ApiError;
use crate::irc::tls;

/// Reader half of an established connection.
pub type LineReader = FramedRead<Box<dyn AsyncRead + Send + Unpin>, LineCodec>;
/// Writer half of an established connection.
pub type LineWriter = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, LineCodec>;

/// An established duplex transport, plain or encrypted.
#[derive(Debug)]
pub enum Transport {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Transport {
    /// Split into framed reader and writer halves. The reader feeds the
    /// framer; the writer goes behind the send lock.
    pub fn into_split(self) -> (LineReader, LineWriter) {
        match self {
            Transport::Tcp(stream) => {
                let (read, write) = tokio::io::split(stream);
                (
                    FramedRead::new(Box::new(read) as _, LineCodec::new()),
                    FramedWrite::new(Box::new(write) as _, LineCodec::new()),
                )
            }
            Transport::Tls(stream) => {
                let (read, write) = tokio::io::split(*stream);
                (
                    FramedRead::new(Box::new(read) as _, LineCodec::new()),
                    FramedWrite::new(Box::new(write) as _, LineCodec::new()),
                )
            }
        }
    }
}

/// Dial the configured server. The timeout bounds the whole dial,
/// including the TLS handshake when encryption is enabled.
pub async fn dial(config: &IrcConfig) -> Result<Transport, ApiError> {
    let addr = format!("{}:{}", config.host, config.effective_port());
    let transport = timeout(config.dial_timeout(), establish(config, &addr))
        .await
        .map_err(|_| {
            ApiError::Connect(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("dial timed out: {addr}"),
            ))
        })??;
    debug!(addr = %addr, tls = config.tls.enabled, "connected");
    Ok(transport)
}

async fn establish(config: &IrcConfig, addr: &str) -> Result<Transport, ApiError> {
    let stream = TcpStream::connect(addr).await.map_err(ApiError::Connect)?;
    if let Err(e) = enable_keepalive(&stream, config.keepalive()) {
        warn!(error = %e, "failed to enable TCP keepalive");
    }

    if !config.tls.enabled {
        return Ok(Transport::Tcp(stream));
    }

    let connector = tls::connector(&config.tls)?;
    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|e| ApiError::InvalidConfig(format!("server name {:?}: {e}", config.host)))?;
    let stream = connector
        .connect(server_name, stream)
        .await
        .map_err(ApiError::Connect)?;
    Ok(Transport::Tls(Box::new(stream)))
}

fn enable_keepalive(stream: &TcpStream, interval: Duration) -> std::io::Result<()> {
    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new()
        .with_time(interval)
        .with_interval(interval);
    sock.set_tcp_keepalive(&keepalive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TlsConfig;

    fn plain_config(port: u16, dial_timeout_secs: f64) -> IrcConfig {
        IrcConfig {
            host: "127.0.0.1".to_string(),
            port: Some(port),
            nick: "skald".to_string(),
            channels: Vec::new(),
            dial_timeout_secs,
            keepalive_secs: 60,
            settle_delay_secs: 0.0,
            queue_capacity: 8,
            auth: Default::default(),
            tls: TlsConfig {
                enabled: false,
                ..TlsConfig::default()
            },
        }
    }

    #[tokio::test]
    async fn dial_reaches_a_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let accept = tokio::spawn(async move { listener.accept().await.unwrap() });
        let transport = dial(&plain_config(port, 2.0)).await.unwrap();
        assert!(matches!(transport, Transport::Tcp(_)));
        accept.await.unwrap();
    }

    #[tokio::test]
    async fn dial_failure_is_a_connect_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = dial(&plain_config(port, 1.0)).await.unwrap_err();
        assert!(matches!(err, ApiError::Connect(_)));
    }
}
