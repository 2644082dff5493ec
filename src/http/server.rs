//! HTTP server wiring

use super::handler::{
    blame_handler, branch_form_handler, branch_refspec_handler, commits_handler,
    delete_branch_handler, merge_handler, provenance_handler, pull_handler, pull_ref_handler,
    push_handler, push_ref_handler, sparql_handler, sparql_ref_handler,
};
use crate::store::QuitStore;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// HTTP server exposing the store
pub struct HttpServer {
    store: Arc<QuitStore>,
    port: u16,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(store: Arc<QuitStore>, port: u16) -> Self {
        Self { store, port }
    }

    /// The route table, shared by the server and the handler tests
    pub fn router(store: Arc<QuitStore>) -> Router {
        let routes = Router::new()
            .route("/sparql", get(sparql_handler).post(sparql_handler))
            .route(
                "/sparql/:refspec",
                get(sparql_ref_handler).post(sparql_ref_handler),
            )
            .route(
                "/provenance",
                get(provenance_handler).post(provenance_handler),
            )
            .route("/branch", post(branch_form_handler))
            .route("/branch/:refspec", post(branch_refspec_handler))
            .route("/delete/branch/:branch", post(delete_branch_handler))
            .route("/merge", post(merge_handler))
            .route("/pull/:remote", get(pull_handler).post(pull_handler))
            .route(
                "/pull/:remote/:branch",
                get(pull_ref_handler).post(pull_ref_handler),
            )
            .route("/push/:remote", get(push_handler).post(push_handler))
            .route(
                "/push/:remote/:branch",
                get(push_ref_handler).post(push_ref_handler),
            )
            .route("/blame/:refspec", get(blame_handler))
            .route("/commits", get(commits_handler))
            .layer(CorsLayer::permissive());

        match store.config().basepath.clone() {
            Some(basepath) if !basepath.is_empty() && basepath != "/" => {
                let prefix = if basepath.starts_with('/') {
                    basepath
                } else {
                    format!("/{}", basepath)
                };
                Router::new().nest(&prefix, routes).with_state(store)
            }
            _ => routes.with_state(store),
        }
    }

    /// Start serving
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error>> {
        let app = Self::router(Arc::clone(&self.store));
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!("SPARQL endpoint available at http://localhost:{}/sparql", self.port);

        axum::serve(listener, app).await?;
        Ok(())
    }
}
