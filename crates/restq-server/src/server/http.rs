//! HTTP/1 connection loop.
//!
//! Connections are driven by hyper directly instead of `axum::serve` so that
//! slow and idle clients can be cut off. hyper enforces both limits with one
//! timer that starts whenever the connection waits for a request head: it
//! bounds how long a client may take to send its headers and how long a
//! keep-alive connection may sit idle between requests. The shorter of the two
//! configured limits is used for that timer.
//!
//! Once a request head is read the timer is off, so a long-polling `GET` is
//! bounded by its own `timeout` only.

use axum::Router;
use core::{future::Future, pin::pin, time::Duration};
use hyper::server::conn::http1;
use hyper_util::{
    rt::{TokioIo, TokioTimer},
    server::graceful::GracefulShutdown,
    service::TowerToHyperService,
};
use tokio::net::TcpListener;

/// Back-off after a failed `accept`, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionLimits {
    /// Time a client has to send a full request head.
    pub read_timeout: Duration,
    /// Time a keep-alive connection may stay open without a new request.
    pub idle_timeout: Duration,
}

impl ConnectionLimits {
    fn header_read_timeout(self) -> Duration {
        self.read_timeout.min(self.idle_timeout)
    }
}

/// Serves `app` on `listener` until `signal` resolves, then stops accepting
/// and waits for open connections to finish their in-flight requests.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    limits: ConnectionLimits,
    signal: impl Future<Output = ()>,
) {
    let service = TowerToHyperService::new(app);
    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(limits.header_read_timeout());

    let graceful = GracefulShutdown::new();
    let mut signal = pin!(signal);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(err) => {
                    tracing::warn!(%err, "failed to accept connection");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            },
            () = &mut signal => break,
        };

        let conn = builder.serve_connection(TokioIo::new(stream), service.clone());
        let conn = graceful.watch(conn);
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                tracing::debug!(%peer, %err, "connection closed with error");
            }
        });
    }

    drop(listener);
    tracing::info!("Stopped accepting connections, draining open ones");
    graceful.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::service::handler::QueueService;
    use restq::Coordinator;
    use std::{net::SocketAddr, time::Instant};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
    };
    use tokio_util::sync::CancellationToken;

    const LIMIT: Duration = Duration::from_millis(200);

    async fn start() -> (SocketAddr, CancellationToken, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = QueueService::new(Coordinator::new()).router();
        let stop = CancellationToken::new();
        let limits = ConnectionLimits {
            read_timeout: LIMIT,
            idle_timeout: LIMIT,
        };
        let signal = stop.clone().cancelled_owned();
        let server = tokio::spawn(serve(listener, app, limits, signal));
        (addr, stop, server)
    }

    /// Reads until the server closes the connection, returning what was read.
    async fn read_until_closed(stream: &mut TcpStream) -> Vec<u8> {
        let mut buf = Vec::new();
        // A reset counts as closed too.
        let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
            .await
            .expect("server kept the connection open");
        buf
    }

    #[tokio::test]
    async fn idle_connection_is_closed() {
        let (addr, _stop, _server) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        let start = Instant::now();
        read_until_closed(&mut stream).await;
        assert!(start.elapsed() >= LIMIT / 2);
    }

    #[tokio::test]
    async fn stalled_request_head_is_closed() {
        let (addr, _stop, _server) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET /orders HTTP/1.1\r\n").await.unwrap();

        let response = read_until_closed(&mut stream).await;
        assert!(!response.starts_with(b"HTTP/1.1 200"));
    }

    #[tokio::test]
    async fn long_poll_outlives_read_timeout() {
        let (addr, _stop, _server) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /orders?timeout=1 HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let start = Instant::now();
        let response = read_until_closed(&mut stream).await;
        assert!(response.starts_with(b"HTTP/1.1 404"));
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test]
    async fn serve_returns_after_signal() {
        let (addr, stop, server) = start().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"PUT /orders?v=x HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        assert!(read_until_closed(&mut stream).await.starts_with(b"HTTP/1.1 200"));

        stop.cancel();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}
