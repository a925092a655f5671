use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::routes::router;
use crate::state::ManagementState;

const MAX_BODY_BYTES: usize = 64 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const PORT_SEARCH_ATTEMPTS: u16 = 20;

/// Bind the management API starting at `preferred_port`, walking upward on
/// `AddrInUse` so a second local instance doesn't simply fail to start.
/// Returns the socket actually bound.
pub async fn serve(state: ManagementState, preferred_port: u16) -> anyhow::Result<SocketAddr> {
    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES));

    let mut port = preferred_port;
    let listener = loop {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => break listener,
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                warn!(port, "management API port in use, trying next port");
                port += 1;
                if port >= preferred_port + PORT_SEARCH_ATTEMPTS {
                    anyhow::bail!(
                        "could not bind management API after {PORT_SEARCH_ATTEMPTS} attempts starting at {preferred_port}"
                    );
                }
            }
            Err(err) => return Err(err.into()),
        }
    };

    let bound = listener.local_addr()?;
    info!(addr = %bound, "management API listening");
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!(error = %err, "management API server exited");
        }
    });
    Ok(bound)
}
