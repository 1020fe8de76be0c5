//! HTTP/1 accept loop shared by the replay server and the proxy

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::Result;

use super::{ConnectionLimiter, HttpResponse};

/// Answers one request
pub trait RequestHandler: Send + Sync + 'static {
    /// Produce the response for `request`
    fn handle(&self, request: Request<Incoming>) -> impl Future<Output = HttpResponse> + Send;
}

/// Bound listener serving one handler
pub struct HttpServer {
    listener: TcpListener,
    limiter: ConnectionLimiter,
}

impl HttpServer {
    /// Bind `addr`
    ///
    /// # Errors
    ///
    /// Returns error if the address cannot be bound
    pub async fn bind(addr: SocketAddr, max_connections: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;

        Ok(Self {
            listener,
            limiter: ConnectionLimiter::new(max_connections),
        })
    }

    /// Address actually bound, useful after binding port 0
    ///
    /// # Errors
    ///
    /// Returns error if the socket address cannot be read
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns error if the listener fails
    pub async fn run<H: RequestHandler>(self, handler: Arc<H>) -> Result<()> {
        self.serve_until(handler, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received SIGINT, shutting down");
        })
        .await
    }

    /// Serve until `shutdown` completes
    ///
    /// Each connection runs on its own task; connections still open when
    /// `shutdown` fires are left to finish on their own.
    ///
    /// # Errors
    ///
    /// Returns error if the listener fails
    pub async fn serve_until<H, S>(self, handler: Arc<H>, shutdown: S) -> Result<()>
    where
        H: RequestHandler,
        S: Future<Output = ()>,
    {
        let addr = self.local_addr()?;
        info!(
            "Listening on {} (max {} connections)",
            addr,
            self.limiter.max_connections()
        );

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let Some(permit) = self.limiter.try_admit() else {
                                warn!("Connection limit reached, rejecting {}", peer_addr);
                                drop(stream);
                                continue;
                            };

                            let handler = Arc::clone(&handler);

                            tokio::spawn(async move {
                                let _permit = permit;

                                let service = service_fn(move |request| {
                                    let handler = Arc::clone(&handler);
                                    async move { Ok::<_, Infallible>(handler.handle(request).await) }
                                });

                                if let Err(e) = http1::Builder::new()
                                    .serve_connection(TokioIo::new(stream), service)
                                    .await
                                {
                                    debug!("Connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                () = &mut shutdown => {
                    info!("Server on {} shutting down", addr);
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::text_response;
    use hyper::StatusCode;
    use std::time::Duration;
    use tokio::sync::oneshot;

    struct Echo;

    impl RequestHandler for Echo {
        async fn handle(&self, request: Request<Incoming>) -> HttpResponse {
            text_response(StatusCode::OK, request.uri().path())
        }
    }

    #[tokio::test]
    async fn test_serve_and_shutdown() {
        let server = HttpServer::bind(SocketAddr::from(([127, 0, 0, 1], 0)), 4)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_until(Arc::new(Echo), async {
            rx.await.ok();
        }));

        let body = reqwest::get(format!("http://{addr}/hello"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "/hello");

        tx.send(()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_bind_in_use_fails() {
        let first = HttpServer::bind(SocketAddr::from(([127, 0, 0, 1], 0)), 1)
            .await
            .unwrap();
        let addr = first.local_addr().unwrap();

        assert!(HttpServer::bind(addr, 1).await.is_err());
    }
}
