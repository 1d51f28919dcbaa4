//! bridge-probe: run a simulated host, or talk to one from the outside.
//!
//! ```text
//! bridge-probe host --interval-ms 500          # publish "tick", log requests
//! bridge-probe subscribe --topic tick          # print published frames
//! bridge-probe request '{"action": "jump"}'    # send one request
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use agentbridge::prelude::*;
use agentbridge::protocol::{marshal, now_millis, unframe};
use agentbridge::{DEFAULT_LISTENER_PORT, DEFAULT_PUBLISHER_PORT};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use zeromq::{Socket, SocketRecv, SocketSend, ZmqMessage};

type Result<T> = std::result::Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "bridge-probe")]
#[command(version)]
#[command(about = "Simulated host and external clients for agentbridge")]
struct Cli {
    /// 0 silent, 1 error, 2 info, 3 debug, 4 trace
    #[arg(short, long, default_value_t = 2, global = true)]
    verbosity: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a bridge that publishes a counter and prints incoming requests
    Host {
        /// JSON file with bridge options
        #[arg(long)]
        config: Option<PathBuf>,
        /// Milliseconds between published ticks
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Stop after this many ticks (runs until Ctrl-C otherwise)
        #[arg(long)]
        count: Option<u64>,
    },
    /// Print frames published by a host
    Subscribe {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = DEFAULT_PUBLISHER_PORT)]
        port: u16,
        /// Topic prefix to subscribe to; repeatable, all topics when omitted
        #[arg(long = "topic")]
        topics: Vec<String>,
    },
    /// Send one request and print the reply
    Request {
        /// Request body, sent as-is
        body: String,
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = DEFAULT_LISTENER_PORT)]
        port: u16,
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_level(cli.verbosity).unwrap_or_default();
    init_tracing(verbosity);

    match cli.command {
        Commands::Host {
            config,
            interval_ms,
            count,
        } => run_host(config, Duration::from_millis(interval_ms), count).await,
        Commands::Subscribe { host, port, topics } => {
            run_subscribe(&host, port, &topics).await
        }
        Commands::Request {
            body,
            host,
            port,
            timeout_ms,
        } => run_request(&host, port, body, Duration::from_millis(timeout_ms)).await,
    }
}

async fn run_host(
    config: Option<PathBuf>,
    interval: Duration,
    count: Option<u64>,
) -> Result<()> {
    let config = match config {
        Some(path) => BridgeConfig::from_json(&tokio::fs::read_to_string(&path).await?),
        None => BridgeConfig::default(),
    };
    let (sink, mut requests) = mpsc::unbounded_channel::<Notification>();
    let mut bridge = Bridge::new(config);
    bridge.connect(sink).await?;
    tracing::info!(
        publisher = ?bridge.publisher_port(),
        listener = ?bridge.listener_port(),
        "host running, Ctrl-C to stop"
    );

    let mut ticker = tokio::time::interval(interval);
    let mut ticks: u64 = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                ticks += 1;
                bridge.send("tick", &tick_state(ticks)).await;
                if count.is_some_and(|limit| ticks >= limit) {
                    break;
                }
            }
            Some(request) = requests.recv() => print_request(&request),
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    bridge.disconnect().await?;
    Ok(())
}

fn tick_state(tick: u64) -> Value {
    let mut state = Dictionary::new();
    state.insert("tick", Value::Int(tick as i64));
    state.insert("time_ms", Value::Int(now_millis() as i64));
    Value::Dictionary(state)
}

fn print_request(request: &Notification) {
    let topic = request.topic.as_deref().unwrap_or("-");
    match &request.error {
        Some(reason) => println!("#{} {topic} rejected: {reason}", request.seqno),
        None => match marshal(&request.value) {
            Ok(doc) => println!("#{} {topic} {doc}", request.seqno),
            Err(_) => println!("#{} {topic} {:?}", request.seqno, request.value),
        },
    }
}

async fn run_subscribe(host: &str, port: u16, topics: &[String]) -> Result<()> {
    let mut sub = zeromq::SubSocket::new();
    sub.connect(&format!("tcp://{host}:{port}")).await?;
    if topics.is_empty() {
        sub.subscribe("").await?;
    }
    for topic in topics {
        sub.subscribe(topic).await?;
    }
    tracing::info!(host, port, ?topics, "subscribed, Ctrl-C to stop");

    loop {
        tokio::select! {
            message = sub.recv() => {
                let raw = message?.into_vec().concat();
                match unframe(&raw) {
                    Ok((topic, payload)) => {
                        println!("{topic} {}", String::from_utf8_lossy(payload));
                    }
                    Err(e) => tracing::warn!(error = %e, "skipping malformed frame"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn run_request(host: &str, port: u16, body: String, timeout: Duration) -> Result<()> {
    let mut req = zeromq::ReqSocket::new();
    req.connect(&format!("tcp://{host}:{port}")).await?;
    req.send(ZmqMessage::from(body)).await?;

    let reply = tokio::time::timeout(timeout, req.recv())
        .await
        .map_err(|_| format!("no reply within {timeout:?}"))??;
    println!("{}", String::from_utf8_lossy(&reply.into_vec().concat()));
    Ok(())
}
