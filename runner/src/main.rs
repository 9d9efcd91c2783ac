use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use pushload_runner::config::Config;
use pushload_runner::harness::{RunHarness, Services};
use pushload_runner::lifecycle::{Completion, wait_for_completion};
use pushload_runner::metrics::{MetricsHandle, RecorderSink, StatsdSink};
use pushload_runner::notify::HttpNotifier;
use pushload_runner::scenario::{ScenarioArg, ScenarioRegistry};
use pushload_runner::scheduler::{LoadScheduler, parse_testplan};
use pushload_runner::transport::{Endpoint, WsConnector};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Load generator for WebSocket push-notification services
#[derive(Parser)]
#[command(name = "pushload", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// StatsD host (overrides STATSD_HOST)
    #[arg(long = "statsd_host", global = true)]
    statsd_host: Option<String>,

    /// StatsD port (overrides STATSD_PORT)
    #[arg(long = "statsd_port", global = true)]
    statsd_port: Option<u16>,

    /// StatsD metric namespace (overrides STATSD_NAMESPACE)
    #[arg(long = "statsd_namespace", global = true)]
    statsd_namespace: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single scenario instance
    Scenario {
        /// Push service WebSocket URL (ws:// or wss://)
        websocket_url: String,
        /// Scenario locator, e.g. pushload.scenarios:basic
        scenario_function: String,
        /// Positional scenario arguments
        #[arg(allow_hyphen_values = true)]
        scenario_args: Vec<String>,
    },
    /// Run a test plan: "scenario, quantity, stagger, delay, *args | ..."
    Testplan {
        /// Push service WebSocket URL (ws:// or wss://)
        websocket_url: String,
        test_plan: String,
    },
}

/// Open the run's metrics sink
///
/// A Prometheus listener takes precedence over StatsD when configured.
async fn open_metrics(config: &Config) -> anyhow::Result<MetricsHandle> {
    if let Some(addr) = config.metrics_listen {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Serving Prometheus metrics on http://{}/metrics", addr);
        return Ok(MetricsHandle::new(Arc::new(RecorderSink::new(
            config.statsd.namespace.clone(),
        ))));
    }

    let sink = StatsdSink::connect(&config.statsd)
        .await
        .context("Failed to open StatsD socket")?;
    info!(
        "Sending metrics to statsd at {}:{} (namespace '{}')",
        config.statsd.host, config.statsd.port, config.statsd.namespace
    );
    Ok(MetricsHandle::new(Arc::new(sink)))
}

/// Wait for `target` to finish, or for Ctrl-C
///
/// Returns false when interrupted.
async fn wait_or_interrupt<C: Completion + ?Sized>(target: &C, interval: Duration) -> bool {
    tokio::select! {
        _ = wait_for_completion(target, interval) => true,
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => {
                warn!("Interrupted, shutting down");
                false
            }
            Err(e) => {
                warn!("Unable to listen for Ctrl-C: {}", e);
                wait_for_completion(target, interval).await;
                true
            }
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pushload=info,pushload_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().with_statsd_overrides(
        cli.statsd_host,
        cli.statsd_port,
        cli.statsd_namespace,
    );
    let registry = ScenarioRegistry::with_builtins();
    let started = Instant::now();

    match cli.command {
        Command::Scenario {
            websocket_url,
            scenario_function,
            scenario_args,
        } => {
            let endpoint = Endpoint::parse(&websocket_url)?;
            let scenario = registry.locate(&scenario_function)?;
            let args = ScenarioArg::parse_all(&scenario_args);

            let metrics = open_metrics(&config).await?;
            let services = services(&config, metrics.clone())?;
            let harness = RunHarness::new(endpoint, scenario, args, services);

            info!("Running {} against {}", scenario_function, harness.endpoint());
            harness.run();
            if !wait_or_interrupt(&harness, config.poll_interval).await {
                harness.cancel_waiters();
            }
            info!("Final harness state: {:?}", harness.stats());
            metrics.close();
        }
        Command::Testplan {
            websocket_url,
            test_plan,
        } => {
            let endpoint = Endpoint::parse(&websocket_url)?;
            let plan = parse_testplan(&test_plan, &registry)?;
            let total: u64 = plan.iter().map(|entry| entry.launched()).sum();

            let metrics = open_metrics(&config).await?;
            let services = services(&config, metrics.clone())?;
            let mut scheduler = LoadScheduler::new(plan, services);

            info!(
                "Running test plan with {} entr(y/ies), {} instance(s) against {}",
                scheduler.plan().len(),
                total,
                endpoint
            );
            scheduler.start(&endpoint);
            if !wait_or_interrupt(&scheduler, config.poll_interval).await {
                scheduler.shutdown();
            }
            metrics.close();
        }
    }

    info!("Run finished in {:.1}s", started.elapsed().as_secs_f64());
    Ok(())
}

fn services(config: &Config, metrics: MetricsHandle) -> anyhow::Result<Services> {
    let notifier = HttpNotifier::new().context("Failed to build HTTP client")?;
    Ok(Services::new(
        Arc::new(WsConnector::new(config.origin.clone())),
        Arc::new(notifier),
        metrics,
    ))
}
