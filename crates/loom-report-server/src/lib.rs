// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reference collector for reports sent by `loom-report`'s HTTP transport.

pub mod config;
pub mod error;
pub mod state;
pub mod upload;

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::ServerArgs;
pub use error::{Result, ServerError};
pub use state::AppState;
pub use upload::{ReceivedFile, UploadPolicy};

/// Routes `POST <path>` to the upload handler.
///
/// Serve with `into_make_service_with_connect_info::<SocketAddr>()`; the
/// handler needs the client address.
pub fn create_router(state: AppState, path: &str) -> Router {
	let limit = state.policy().body_limit();
	Router::new()
		.route(path, post(upload::receive_upload))
		.layer(DefaultBodyLimit::max(limit))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}
