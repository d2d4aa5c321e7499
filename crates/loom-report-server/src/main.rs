// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error report collector binary.

use std::net::SocketAddr;

use clap::Parser;
use loom_report_server::{create_router, AppState, ServerArgs};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = ServerArgs::parse();

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| args.log_level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tokio::fs::create_dir_all(&args.upload_dir).await?;
	let state = AppState::from_args(&args)?;
	let app = create_router(state, &args.path);

	let listener = tokio::net::TcpListener::bind(args.listen).await?;
	tracing::info!(
		listen = %args.listen,
		path = %args.path,
		upload_dir = %args.upload_dir.display(),
		max_size_mb = args.max_size_mb,
		notify = args.notify_smtp_host.is_some(),
		"starting loom-report-server"
	);

	axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	tracing::info!("loom-report-server stopped");
	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "failed to listen for shutdown signal");
	}
}
