//! Shared utilities for integration tests.

use std::net::SocketAddr;

use gatekeeper::config::GatewayConfig;
use gatekeeper::http::HttpServer;
use gatekeeper::lifecycle::Shutdown;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A gateway serving on an ephemeral local port.
#[allow(dead_code)]
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<GatewayConfig>,
}

#[allow(dead_code)]
impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config suited to tests: loopback bind, no metrics exporter.
#[allow(dead_code)]
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.observability.metrics_enabled = false;
    config
}

/// Start a gateway with `config`. The listener is bound before this returns.
pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    TestGateway {
        addr,
        shutdown,
        config_updates,
    }
}
