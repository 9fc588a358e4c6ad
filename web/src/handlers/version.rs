//! `GET /version`.

use axum::Json;
use serde::Serialize;

/// Response body for `/version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionBody {
    /// The crate version this binary was built from.
    pub version: &'static str,
    /// The short git commit hash baked in at build time, if available.
    pub git_sha: &'static str,
}

/// Reports the running binary's version, for support escalation and
/// canary rollout checks.
#[allow(clippy::unused_async)]
pub async fn version() -> Json<VersionBody> {
    Json(VersionBody {
        version: env!("CARGO_PKG_VERSION"),
        git_sha: option_env!("GIT_SHA").unwrap_or("unknown"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_version_reports_crate_version() {
        let Json(body) = version().await;
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }
}
