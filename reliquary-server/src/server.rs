// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Router assembly and the listening loop. */

use axum::{
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    handlers::{api, autoindex, commonjs, debian, pypi},
    state::SharedState,
};

/// Build the full `/api/v1/` router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/v1/", get(api::home))
        // Raw upload/download.
        .route(
            "/api/v1/raw/{channel}/{index}/{relic_name}",
            get(api::get_relic).put(api::put_relic),
        )
        // Autoindex (nginx autoindex compatible).
        .route("/api/v1/autoindex/{channel}/{index}/", get(autoindex::autoindex))
        // Python package index (PEP-503), proxy flavor first.
        .route(
            "/api/v1/python/proxy/{channel}/{index}/simple/",
            get(pypi::proxy_simple),
        )
        .route(
            "/api/v1/python/proxy/{channel}/{index}/simple/{package}/",
            get(pypi::proxy_simple_package),
        )
        .route(
            "/api/v1/python/proxy/{channel}/{index}/packages/{parta}/{partb}/{hash}/{package}",
            get(pypi::proxy_package),
        )
        .route("/api/v1/python/{channel}/{index}/simple/", get(pypi::simple_index))
        .route(
            "/api/v1/python/{channel}/{index}/simple/{package}/",
            get(pypi::simple_package),
        )
        // CommonJS registry (npm compatible).
        .route(
            "/api/v1/commonjs/proxy/package/{channel}/{index}/{package}/{version}",
            get(commonjs::proxy_package),
        )
        .route(
            "/api/v1/commonjs/proxy/{channel}/{index}/",
            get(commonjs::proxy_registry_root),
        )
        .route(
            "/api/v1/commonjs/proxy/{channel}/{index}/{package}/",
            get(commonjs::proxy_package_root),
        )
        .route(
            "/api/v1/commonjs/proxy/{channel}/{index}/{package}/{version}/",
            get(commonjs::proxy_package_version),
        )
        .route("/api/v1/commonjs/{channel}/{index}/", get(commonjs::registry_root))
        .route(
            "/api/v1/commonjs/{channel}/{index}/{package}/",
            get(commonjs::package_root),
        )
        .route(
            "/api/v1/commonjs/{channel}/{index}/{package}/{version}/",
            get(commonjs::package_version),
        )
        // Debian repository tree.
        .route("/api/v1/debian/{channel}/", get(debian::channel_index))
        .route("/api/v1/debian/{channel}/dist/", get(debian::dist_root_index))
        .route("/api/v1/debian/{channel}/dist/{index}/", get(debian::dist_index))
        .route(
            "/api/v1/debian/{channel}/dist/{index}/Release",
            get(debian::dist_release),
        )
        .route(
            "/api/v1/debian/{channel}/dist/{index}/main/",
            get(debian::comp_index),
        )
        .route(
            "/api/v1/debian/{channel}/dist/{index}/main/{binary_arch}/",
            get(debian::arch_index),
        )
        .route(
            "/api/v1/debian/{channel}/dist/{index}/main/{binary_arch}/Release",
            get(debian::arch_release),
        )
        .route(
            "/api/v1/debian/{channel}/dist/{index}/main/{binary_arch}/Packages",
            get(debian::arch_packages),
        )
        .route(
            "/api/v1/debian/{channel}/dist/{index}/main/{binary_arch}/Packages.gz",
            get(debian::arch_packages_gz),
        )
        .route(
            "/api/v1/debian/{channel}/dist/{index}/main/{binary_arch}/Packages.bz2",
            get(debian::arch_packages_bz2),
        )
        .route("/api/v1/debian/{channel}/pool/", get(debian::pool_root_index))
        .route(
            "/api/v1/debian/{channel}/pool/{index}/",
            get(debian::pool_dist_index),
        )
        .route(
            "/api/v1/debian/{channel}/pool/{index}/{relic_name}",
            get(debian::pool_package),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until interrupted.
pub async fn serve(state: SharedState, bind: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
