//! tenantguard gateway binary.
//!
//! - Config from `TENANTGUARD_CONFIG` (default `tenantguard.yaml`), strict parsing
//! - Collaborators seeded from `dev_fixtures` when configured
//! - Ops routes + `/v1/tenant` behind the governance middleware

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use tenantguard_gateway::directory::Fixtures;
use tenantguard_gateway::{app_state, config, router, Collaborators};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = config::config_path();
    let cfg = config::load_from_file(&path).expect("config load failed");
    let listen: SocketAddr = cfg
        .server
        .listen
        .parse()
        .expect("server.listen must be a valid SocketAddr");

    let fixtures = match &cfg.dev_fixtures {
        Some(p) => Fixtures::load_from_file(p).expect("fixtures load failed"),
        None => {
            tracing::warn!("no dev_fixtures configured; every tenant will resolve as not found");
            Fixtures::default()
        }
    };
    let (directory, membership, usage) = fixtures.into_stores();
    let deps = Collaborators {
        directory: Arc::new(directory),
        membership: Arc::new(membership),
        usage: Arc::new(usage),
    };

    let state = app_state::AppState::new(cfg, deps).expect("governor init failed");
    let app = router::build_router(state);

    tracing::info!(%listen, config = %path, "tenantguard-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen).await.expect("failed to bind");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server failed");
}
