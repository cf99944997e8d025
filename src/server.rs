use axum::Router;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Give outstanding requests 30 seconds to complete.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Address + handler pairing, owned by the lifecycle for its run.
pub struct Server {
    pub addr: String,
    pub router: Router,
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("binding to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("accept loop failed: {0}")]
    Accept(#[source] std::io::Error),
    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("server stopped unexpectedly")]
    UnexpectedStop,
}

/// Runs the server until a fatal error or an OS signal. On signal, in-flight
/// requests get [`DRAIN_TIMEOUT`] to finish before the server is forced
/// closed; the drain path always returns `Ok` so the caller still tears down
/// and exits cleanly.
pub async fn run(server: Server) -> Result<(), ServeError> {
    let addr = server.addr;
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServeError::Bind {
            addr: addr.clone(),
            source,
        })?;
    tracing::info!(%addr, "listening");

    serve_until(listener, server.router, shutdown_signal(), DRAIN_TIMEOUT).await
}

async fn serve_until(
    listener: TcpListener,
    router: Router,
    signal: impl Future<Output = ()>,
    drain_timeout: Duration,
) -> Result<(), ServeError> {
    // The accept loop runs in its own task; its completion value doubles as
    // the single-slot error channel the main path races against the signal.
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let mut serve_task = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    tokio::select! {
        // Nothing requested a shutdown yet, so any completion here is fatal.
        joined = &mut serve_task => match joined {
            Ok(Ok(())) => Err(ServeError::UnexpectedStop),
            Ok(Err(err)) => Err(ServeError::Accept(err)),
            Err(err) => Err(ServeError::Task(err)),
        },
        _ = signal => {
            tracing::info!("caught signal, shutting down");
            let _ = shutdown_tx.send(());

            match tokio::time::timeout(drain_timeout, &mut serve_task).await {
                Ok(Ok(Ok(()))) => tracing::info!("graceful shutdown complete"),
                Ok(Ok(Err(err))) => tracing::error!(error = %err, "shutting down server"),
                Ok(Err(err)) => tracing::error!(error = %err, "server task failed during shutdown"),
                Err(_) => {
                    tracing::error!("shutdown deadline exceeded, forcing server to close");
                    serve_task.abort();
                    if let Err(err) = (&mut serve_task).await {
                        if !err.is_cancelled() {
                            tracing::error!(error = %err, "forcing server to close");
                        }
                    }
                }
            }

            Ok(())
        }
    }
}

/// Resolves on SIGINT (ctrl-c) or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("installing ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_router;
    use crate::products::{Product, ProductStore};
    use crate::state::AppState;
    use async_trait::async_trait;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Instant;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    struct SlowStore {
        delay: Duration,
    }

    #[async_trait]
    impl ProductStore for SlowStore {
        async fn list_products(&self) -> Result<Vec<Product>, sqlx::Error> {
            tokio::time::sleep(self.delay).await;
            Ok(vec![Product {
                id: 1,
                name: "Comic Books".to_string(),
                cost: 50,
                quantity: 42,
            }])
        }
    }

    fn slow_app(delay: Duration) -> Router {
        build_router(AppState::new(Arc::new(SlowStore { delay })))
    }

    async fn raw_get(addr: SocketAddr) -> std::io::Result<String> {
        let mut stream = TcpStream::connect(addr).await?;
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await?;
        let mut buf = String::new();
        stream.read_to_string(&mut buf).await?;
        Ok(buf)
    }

    #[tokio::test]
    async fn shuts_down_cleanly_when_idle() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(serve_until(
            listener,
            slow_app(Duration::ZERO),
            async {
                let _ = rx.await;
            },
            Duration::from_secs(5),
        ));

        tx.send(()).unwrap();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn in_flight_request_completes_during_drain() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(serve_until(
            listener,
            slow_app(Duration::from_millis(200)),
            async {
                let _ = rx.await;
            },
            Duration::from_secs(5),
        ));

        let request = tokio::spawn(raw_get(addr));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();

        let response = request.await.unwrap().unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "got: {response}");
        assert!(response.contains("Comic Books"));

        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn forces_close_when_drain_deadline_expires() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let server = tokio::spawn(serve_until(
            listener,
            slow_app(Duration::from_secs(2)),
            async {
                let _ = rx.await;
            },
            Duration::from_millis(100),
        ));

        let request = tokio::spawn(raw_get(addr));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let start = Instant::now();
        tx.send(()).unwrap();

        // The drain branch must come back around the deadline, not after the
        // slow request, and still report success.
        server.await.unwrap().unwrap();
        assert!(start.elapsed() < Duration::from_millis(1900));

        let _ = request.await.unwrap();
    }

    #[tokio::test]
    async fn bind_failure_is_an_error() {
        let server = Server {
            addr: "999.999.999.999:1".to_string(),
            router: slow_app(Duration::ZERO),
        };

        let err = run(server).await.unwrap_err();
        assert!(matches!(err, ServeError::Bind { .. }));
    }
}
