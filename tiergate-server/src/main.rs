use anyhow::Result;
use tiergate_server::app::{self, AppState};
use tiergate_server::config::{Config, PolicyConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from environment variables, CLI arguments and the tier file
    let config = Config::from_env_and_args()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("tiergate={}", config.log_level).parse()?),
        )
        .init();

    let governor = config.governor();
    let tiers = governor
        .tiers()
        .specs()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    match &config.policy {
        PolicyConfig::Credential { username, .. } => {
            tracing::info!(
                "Policy: credential (metering user {:?}), tiers: {}",
                username,
                tiers
            );
        }
        PolicyConfig::Header {
            header,
            default_tier,
            ..
        } => {
            tracing::info!(
                "Policy: header {} (default tier {}), tiers: {}",
                header,
                default_tier,
                tiers
            );
        }
    }

    match governor.registry().idle_timeout() {
        Some(timeout) => tracing::info!(
            "Idle buckets evicted after {}s, sweep every {}s",
            timeout.as_secs(),
            config.eviction.sweep_interval.max(1)
        ),
        None => tracing::info!("Idle bucket eviction disabled"),
    }

    let addr = config.listen_addr()?;
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return Err(e.into());
        }
    };

    tracing::info!("tiergate listening on {}", addr);

    if let Err(e) = app::serve(listener, AppState::new(governor)).await {
        tracing::error!("Server failed: {}", e);
        return Err(e);
    }

    Ok(())
}
