use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relay_gateway::api::{self, AppState};
use relay_gateway::config;
use relay_gateway::gateway::{self, ApiRequest, Gateway};
use relay_gateway::proxy::request::QueryParams;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "relay_gateway=debug,tower_http=debug".into()),
    );
    let json_logs = std::env::var("RELAY_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(port).await,
        Some(cli::Commands::Call {
            resource,
            action,
            body,
            params,
            method,
        }) => {
            let mut request = ApiRequest::new(resource, action)
                .with_params(params.into_iter().collect::<QueryParams>());
            if let Some(raw) = body {
                let body: Value = serde_json::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("--body is not valid JSON: {}", e))?;
                request = request.with_body(body);
            }
            if let Some(m) = method {
                request = request.with_method(m.into());
            }
            handle_call(request).await
        }
        Some(cli::Commands::Proxies) => list_proxies(),
        None => run_server(None).await,
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn handle_call(request: ApiRequest) -> anyhow::Result<()> {
    let cfg = config::load()?;
    let gw = gateway::from_config(&cfg)?;
    let envelope = gw.call(request).await;
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    if !envelope.is_ok() {
        std::process::exit(1);
    }
    Ok(())
}

fn list_proxies() -> anyhow::Result<()> {
    let registry = gateway::registry_from(config::load_proxy_file().as_deref())?;
    for (i, proxy) in registry.iter().enumerate() {
        println!(
            "{:>2}. {:<16} {:<12} {}",
            i + 1,
            proxy.name,
            format!("{:?}", proxy.extract),
            proxy.url_prefix_template
        );
    }
    Ok(())
}

async fn run_server(port: Option<u16>) -> anyhow::Result<()> {
    let cfg = config::load()?;
    let port = port.unwrap_or(cfg.port);
    let registry = gateway::load_registry(&cfg)?;
    let gw = gateway::from_config(&cfg)?;
    tracing::info!(
        mode = ?cfg.mode,
        relays = registry.len(),
        attempt_timeout_ms = cfg.attempt_timeout.as_millis() as u64,
        "gateway ready"
    );

    let state = Arc::new(AppState {
        gateway: gw,
        registry,
    });
    let app = api::bridge_router(state, &cfg.dashboard_origin);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("relay gateway bridge listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
