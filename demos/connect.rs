//! Fetches the response headers of an HTTP server through a SOCKS5 proxy.
//!
//! ```text
//! RUST_LOG=debug cargo run --example connect -- socks5://127.0.0.1:1080 example.com:80
//! ```

use std::error::Error;

use gerevs_client::{config::ProxyConfig, Socks5Client};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(proxy), Some(target)) = (args.next(), args.next()) else {
        warn!("usage: connect <socks5[+tls]://[user:pass@]host:port> <host:port>");
        return Ok(());
    };

    let proxy = ProxyConfig::from_url(&url::Url::parse(&proxy)?)?;
    let client = Socks5Client::new(proxy);

    let mut stream = client.connect(&target).await?;
    info!(%target, tls = stream.is_tls(), "connected through proxy");

    let host = target.rsplit_once(':').map_or(target.as_str(), |(host, _)| host);
    stream
        .write_all(format!("HEAD / HTTP/1.0\r\nHost: {}\r\n\r\n", host).as_bytes())
        .await?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    println!("{}", String::from_utf8_lossy(&response));
    Ok(())
}
