//! Prometheus scrape endpoint, served until the run shuts down.

use crate::shutdown::wait_for_shutdown;
use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use anyhow::Context;
use std::future::IntoFuture;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::trace;

pub struct MetricsServer {
    listener: TcpListener,
    prom_handle: PrometheusHandle,
    shutdown_rx: watch::Receiver<bool>,
}

impl MetricsServer {
    /// `listener` must already be bound; the server is not spawned here.
    pub fn new(
        listener: TcpListener,
        prom_handle: PrometheusHandle,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            listener,
            prom_handle,
            shutdown_rx,
        }
    }

    /// Serves scrapes until shutdown.
    pub async fn run(self) -> anyhow::Result<()> {
        let Self {
            listener,
            prom_handle,
            mut shutdown_rx,
        } = self;
        let router = Router::new().route(
            "/metrics",
            get(move || std::future::ready(prom_handle.render())),
        );

        let served = tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown_rx) => Ok(()),
            result = axum::serve(listener, router).into_future() => result,
        };
        trace!("Metrics server stopped.");
        served.context("metrics server failed")
    }
}
