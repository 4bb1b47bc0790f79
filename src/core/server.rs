use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::core::engine::Engine;
use crate::web;

/// HTTP 服务器
pub struct Server {
    engine: Arc<Engine>,
    /// 监听地址
    addr: String,
}

impl Server {
    /// 使用配置中的地址和端口
    pub fn new(engine: Arc<Engine>) -> Self {
        let addr = format!("{}:{}", engine.config.host, engine.config.port);
        Self { engine, addr }
    }

    /// 覆盖监听地址
    pub fn with_addr(mut self, host: &str, port: u16) -> Self {
        self.addr = format!("{host}:{port}");
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// 启动服务器，直到收到 Ctrl+C
    pub async fn start(self) -> Result<()> {
        self.engine.ensure_dirs()?;
        let app = web::router(self.engine.clone());

        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("无法监听 {}", self.addr))?;
        info!("Server started at http://{}", self.addr);

        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("正在停止服务器...");
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::test_support::engine;

    #[test]
    fn address_comes_from_config() {
        let (engine, _) = engine();
        let server = Server::new(Arc::new(engine));
        assert_eq!(server.addr(), "127.0.0.1:8000");
        let server = server.with_addr("0.0.0.0", 9000);
        assert_eq!(server.addr(), "0.0.0.0:9000");
    }
}
