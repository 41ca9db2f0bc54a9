//! Best-effort reachability probe run when a site is registered

use sitebroker_egress::{Connection, Method};
use std::time::Duration;
use tracing::{debug, warn};

const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(5);

/// Endpoint that needs valid credentials on any WordPress REST API
const PREFLIGHT_PATH: &str = "users/me";

/// Probe the site's primary API. Returns whether it answered with success;
/// failures are logged and never abort registration.
pub async fn probe(conn: &Connection) -> bool {
    let result = conn
        .request(Method::GET, PREFLIGHT_PATH)
        .timeout(PREFLIGHT_TIMEOUT)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            debug!(tenant_id = %conn.tenant_id(), "Preflight probe succeeded");
            true
        }
        Ok(response) => {
            warn!(
                tenant_id = %conn.tenant_id(),
                url = %conn.url(PREFLIGHT_PATH),
                status = response.status().as_u16(),
                "Preflight probe rejected; site stays registered"
            );
            false
        }
        Err(e) => {
            warn!(
                tenant_id = %conn.tenant_id(),
                url = %conn.url(PREFLIGHT_PATH),
                "Preflight probe failed; site stays registered: {}",
                e
            );
            false
        }
    }
}
