//! Broadcast relay demo server
//!
//! Run with: cargo run --example relay_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example relay_server                    # binds to 0.0.0.0:3000
//!   cargo run --example relay_server localhost          # binds to 127.0.0.1:3000
//!   cargo run --example relay_server 127.0.0.1:3001     # binds to 127.0.0.1:3001
//!
//! Open http://localhost:3000/ in several browser tabs and send messages.
//!
//! ## From the command line
//!
//! Watch the stream:
//!   curl -N http://localhost:3000/sse
//!
//! Publish:
//!   curl -d name=bob -d content=hi http://localhost:3000/send
//!
//! Counters:
//!   curl http://localhost:3000/stats

use std::net::{SocketAddr, ToSocketAddrs};

use axum::{response::Html, routing::get, Router};
use sse_relay::{RelayServer, ServerConfig};
use tokio::net::TcpListener;

const PAGE: &str = include_str!("index.html");

fn print_usage() {
    eprintln!("Usage: relay_server [BIND_ADDR]");
    eprintln!();
    eprintln!("BIND_ADDR may be HOST, HOST:PORT or :PORT (default 0.0.0.0:3000)");
}

fn parse_bind_addr(s: &str) -> Result<SocketAddr, String> {
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Some(port) = s.strip_prefix(':') {
        let port: u16 = port.parse().map_err(|_| format!("Invalid port: {}", port))?;
        return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
    }

    let with_port = if s.contains(':') {
        s.to_string()
    } else {
        format!("{}:3000", s)
    };

    with_port
        .to_socket_addrs()
        .map_err(|e| format!("Cannot resolve {}: {}", s, e))?
        .find(|a| a.is_ipv4())
        .ok_or_else(|| format!("No IPv4 address for {}", s))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }

    let mut config = ServerConfig::default();
    if let Some(addr_str) = args.get(1) {
        match parse_bind_addr(addr_str) {
            Ok(addr) => config = config.bind(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sse_relay=debug".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    config.validate()?;

    println!("Starting relay on http://{}/", config.bind_addr);
    println!();
    println!("stream:  curl -N http://localhost:{}/sse", config.bind_addr.port());
    println!(
        "publish: curl -d name=bob -d content=hi http://localhost:{}/send",
        config.bind_addr.port()
    );
    println!();

    let server = RelayServer::new(config.clone());

    // The page is served next to the relay routes; the relay itself only
    // knows about /sse, /send and /stats
    let app = Router::new()
        .route("/", get(|| async { Html(PAGE) }))
        .merge(server.router());

    let listener = TcpListener::bind(config.bind_addr).await?;

    // Ctrl+C cancels every open stream, then lets in-flight requests finish
    let token = server.shutdown_token();
    let signal = async move {
        let _ = tokio::signal::ctrl_c().await;
        println!("\nShutting down...");
        token.cancel();
    };

    if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(signal).await {
        eprintln!("Server error: {}", e);
    }

    let stats = server.stats().snapshot();
    println!(
        "Published {} messages, {} deliveries, {} streams opened",
        stats.messages_published, stats.deliveries, stats.sessions_opened
    );

    Ok(())
}
