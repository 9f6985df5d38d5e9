// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use zondy::config::{Config, Mode};
use zondy::constants::{METRICS_SERVER_PATH, TOKIO_WORKER_THREADS};
use zondy::controller::source::KubeSource;
use zondy::controller::{ControlOpts, Controller};
use zondy::crd::{CoreDNSEntry, HostedZone};
use zondy::metrics;
use zondy::server::frontend::DnsFrontend;
use zondy::server::Dispatcher;

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("zondy-server")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

/// Initialize logging with custom format
///
/// Respects `RUST_LOG` environment variable if set, otherwise defaults to INFO level.
/// Respects `RUST_LOG_FORMAT` environment variable for output format (json or text).
fn initialize_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting Zondy DNS server");
}

/// Resolve the configuration file path: first argument, `ZONDY_CONFIG`, or
/// the conventional default.
fn config_path() -> String {
    let mut args = std::env::args().skip(1);
    match (args.next(), args.next()) {
        (Some(flag), Some(path)) if flag == "--config" || flag == "-c" => path,
        (Some(path), None) if !path.starts_with('-') => path,
        _ => std::env::var("ZONDY_CONFIG").unwrap_or_else(|_| "/etc/zondy/config.yaml".to_string()),
    }
}

/// Build the Kubernetes client according to the configured credentials.
///
/// Precedence follows the configuration: an explicit kubeconfig, then an
/// endpoint with a bearer token or client certificates, then the ambient
/// (in-cluster or local) configuration.
async fn build_client(config: &Config) -> Result<Client> {
    if let Some(path) = &config.kubeconfig {
        info!(path = %path, "using explicit kubeconfig");
        let kubeconfig = Kubeconfig::read_from(path).context("reading kubeconfig")?;
        let options = KubeConfigOptions {
            context: config.context.clone(),
            ..KubeConfigOptions::default()
        };
        let client_config = kube::Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .context("loading kubeconfig")?;
        return Client::try_from(client_config).context("building client");
    }

    if let Some(endpoint) = &config.endpoint {
        info!(endpoint = %endpoint, "using explicit endpoint");
        let kubeconfig: Kubeconfig = serde_yaml::from_str(&endpoint_kubeconfig(config, endpoint))
            .context("assembling endpoint credentials")?;
        let client_config =
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context("loading endpoint credentials")?;
        return Client::try_from(client_config).context("building client");
    }

    debug!("using ambient cluster configuration");
    Client::try_default().await.context("building client")
}

/// Render the endpoint/token/TLS credentials as a kubeconfig document.
fn endpoint_kubeconfig(config: &Config, endpoint: &str) -> String {
    let mut cluster = format!("    server: {endpoint:?}\n");
    if let Some(ca) = &config.cert_authority {
        cluster.push_str(&format!("    certificate-authority: {ca:?}\n"));
    }
    let mut user = String::new();
    if let Some(token_file) = &config.token_file {
        user.push_str(&format!("    tokenFile: {token_file:?}\n"));
    }
    if let Some(tls) = &config.tls {
        user.push_str(&format!("    client-certificate: {:?}\n", tls.cert));
        user.push_str(&format!("    client-key: {:?}\n", tls.key));
        cluster.push_str(&format!("    certificate-authority: {:?}\n", tls.ca));
    }
    format!(
        "apiVersion: v1\n\
         kind: Config\n\
         clusters:\n\
         - name: default\n\
           cluster:\n{cluster}\
         users:\n\
         - name: default\n\
           user:\n{user}\
         contexts:\n\
         - name: default\n\
           context:\n\
             cluster: default\n\
             user: default\n\
         current-context: default\n"
    )
}

/// Start the Prometheus metrics HTTP server.
fn start_metrics_server(addr: std::net::SocketAddr) -> tokio::task::JoinHandle<()> {
    info!(addr = %addr, path = METRICS_SERVER_PATH, "starting metrics server");

    tokio::spawn(async move {
        async fn metrics_handler() -> String {
            match metrics::gather_metrics() {
                Ok(text) => text,
                Err(e) => {
                    error!("failed to gather metrics: {e}");
                    String::from("# error gathering metrics\n")
                }
            }
        }

        let app = Router::new().route(METRICS_SERVER_PATH, get(metrics_handler));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("failed to bind metrics server to {addr}: {e}");
                return;
            }
        };
        if let Err(e) = axum::serve(listener, app).await {
            error!("metrics server error: {e}");
        }
    })
}

async fn async_main() -> Result<()> {
    initialize_logging();

    let path = config_path();
    let config = Config::load(&path).with_context(|| format!("loading configuration {path}"))?;
    info!(
        mode = config.mode.as_str(),
        zones = ?config.zones,
        transitive = config.transitive,
        "configuration loaded"
    );

    let client = build_client(&config).await?;

    let selector = config.labels.as_ref().map(|s| s.as_str().to_string());
    let entry_source = Arc::new(KubeSource::<CoreDNSEntry>::new(
        client.clone(),
        &config.namespaces,
        selector.clone(),
    ));
    let zone_source = (config.mode == Mode::Primary).then(|| {
        Arc::new(KubeSource::<HostedZone>::new(
            client.clone(),
            &config.namespaces,
            selector,
        )) as Arc<dyn zondy::controller::source::ResourceSource<HostedZone>>
    });

    let controller = Controller::new(ControlOpts::from_config(&config), entry_source, zone_source);

    let run_controller = {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move { controller.run().await })
    };

    controller.wait_for_sync().await;
    if controller.has_synced() {
        info!("initial sync complete");
    } else {
        warn!("initial sync still incomplete, serving SERVFAIL for misses");
    }

    let _metrics_handle = start_metrics_server(config.metrics_addr);

    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&controller), &config));
    let frontend = DnsFrontend::new(dispatcher, config.listen);

    let shutdown_result: Result<()> = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            info!("received SIGINT, initiating graceful shutdown");
            result.map_err(anyhow::Error::from)
        }

        result = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                sigterm.recv().await;
                Ok::<(), anyhow::Error>(())
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
                Ok::<(), anyhow::Error>(())
            }
        } => {
            info!("received SIGTERM, initiating graceful shutdown");
            result
        }

        result = frontend.run() => {
            error!("DNS front-end exited unexpectedly: {result:?}");
            result.map_err(anyhow::Error::from)
        }
    };

    if let Err(e) = controller.stop() {
        warn!("stopping controller: {e}");
    }
    let _ = run_controller.await;

    shutdown_result?;
    info!("graceful shutdown completed");
    Ok(())
}
