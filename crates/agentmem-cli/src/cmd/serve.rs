use crate::cmd::{connect, runtime};
use std::path::Path;
use std::sync::Arc;

pub fn run(root: &Path, port: u16) -> anyhow::Result<()> {
    runtime()?.block_on(async {
        let memory = Arc::new(connect(root).await?);
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
        let actual_port = listener.local_addr()?.port();
        println!("agentmem server: http://localhost:{actual_port}/api/status");
        agentmem_server::serve_on(memory, listener).await
    })
}
