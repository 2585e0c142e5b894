// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! CommonJS/npm-compatible registry documents.

Self-hosted documents are assembled from the catalog; proxy documents come
from the public npm registry with every tarball URL rewritten to point
back at this server, so the actual downloads are fetched once and then
served locally.
*/

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use reliquary::{fetch::fetch_relic_if_missing, names::CommonjsName, ReliquaryError};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use url::Url;

use crate::{
    download::download_response,
    errors::{json_response, ApiError},
    handlers::{raw_relic_url, request_base, route_url},
    state::SharedState,
};

const NPM_UPSTREAM: &str = "http://registry.npmjs.org";

fn pretty_json(value: &Value) -> Response {
    let body = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    json_response(StatusCode::OK, body)
}

/// The local proxy-package URL carrying the original tarball location in
/// an `upstream` query parameter.
fn proxy_package_url(
    base: &str,
    channel: &str,
    index: &str,
    package: &str,
    version: &str,
    tarball: &str,
) -> String {
    let route = route_url(
        base,
        &["commonjs", "proxy", "package", channel, index, package, version],
        false,
    );

    match Url::parse(&route) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("upstream", tarball);
            url.to_string()
        }
        Err(_) => route,
    }
}

/// `GET /api/v1/commonjs/{channel}/{index}/` — map of package name to
/// package-root URL.
pub async fn registry_root(
    State(state): State<SharedState>,
    Path((channel, index)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let indexobj = state
        .store
        .index_by_names(&channel, &index)
        .await?
        .ok_or(ReliquaryError::NotFound)?;

    let base = request_base(&headers);
    let mut packages = Map::new();

    for relic in state.store.relics_of_index(indexobj.id).await? {
        let package = CommonjsName::parse(&relic.name).package;
        let url = route_url(&base, &["commonjs", &channel, &index, &package], true);
        packages.entry(package).or_insert_with(|| json!(url));
    }

    Ok(pretty_json(&Value::Object(packages)))
}

/// `GET /api/v1/commonjs/{channel}/{index}/{package}/` — the package-root
/// document with its versions map.
pub async fn package_root(
    State(state): State<SharedState>,
    Path((channel, index, package)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let indexobj = state
        .store
        .index_by_names(&channel, &index)
        .await?
        .ok_or(ReliquaryError::NotFound)?;

    let base = request_base(&headers);
    let wanted = package.trim().to_lowercase();
    let mut versions = Map::new();

    for relic in state.store.relics_of_index(indexobj.id).await? {
        let parsed = CommonjsName::parse(&relic.name);
        let Some(version) = parsed.version else {
            continue;
        };

        if parsed.package.trim().to_lowercase() == wanted {
            let tarball = raw_relic_url(&base, &channel, &index, &relic.name);
            versions.insert(
                version.clone(),
                json!({
                    "name": parsed.package,
                    "version": version,
                    "dist": {"tarball": tarball},
                }),
            );
        }
    }

    Ok(pretty_json(&json!({
        "name": package,
        "versions": versions,
    })))
}

/// `GET /api/v1/commonjs/{channel}/{index}/{package}/{version}/` — the
/// single matching version object.
pub async fn package_version(
    State(state): State<SharedState>,
    Path((channel, index, package, version)): Path<(String, String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let indexobj = state
        .store
        .index_by_names(&channel, &index)
        .await?
        .ok_or(ReliquaryError::NotFound)?;

    let base = request_base(&headers);
    let wanted = package.trim().to_lowercase();
    let mut document = Map::new();

    for relic in state.store.relics_of_index(indexobj.id).await? {
        let parsed = CommonjsName::parse(&relic.name);

        if parsed.package.trim().to_lowercase() == wanted
            && parsed.version.as_deref() == Some(version.as_str())
        {
            let tarball = raw_relic_url(&base, &channel, &index, &relic.name);
            document.insert("name".to_string(), json!(parsed.package));
            document.insert("version".to_string(), json!(version));
            document.insert("dist".to_string(), json!({"tarball": tarball}));
        }
    }

    Ok(pretty_json(&Value::Object(document)))
}

async fn upstream_json(state: &SharedState, url: &str) -> Result<Value, ApiError> {
    let response = state.http.get(url).send().await?;

    if response.status().as_u16() != 200 {
        return Err(ReliquaryError::UpstreamFailed(response.status().as_u16()).into());
    }

    response
        .json::<Value>()
        .await
        .map_err(|_| ReliquaryError::DecodeFailed.into())
}

/// `GET /api/v1/commonjs/proxy/{channel}/{index}/` — passthrough of the
/// upstream's full package listing.
pub async fn proxy_registry_root(
    State(state): State<SharedState>,
    Path((_channel, _index)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let response = state.http.get(format!("{}/-/all", NPM_UPSTREAM)).send().await?;

    if response.status().as_u16() != 200 {
        return Err(ReliquaryError::UpstreamFailed(response.status().as_u16()).into());
    }

    let text = response.text().await?;
    Ok((
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html")],
        text,
    )
        .into_response())
}

/// `GET /api/v1/commonjs/proxy/{channel}/{index}/{package}/` — the
/// upstream package-root document with every `dist.tarball` rewritten to
/// the local proxy-package route.
pub async fn proxy_package_root(
    State(state): State<SharedState>,
    Path((channel, index, package)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let mut data = upstream_json(&state, &format!("{}/{}/", NPM_UPSTREAM, package)).await?;
    let base = request_base(&headers);

    let Some(versions) = data.get_mut("versions").and_then(|v| v.as_object_mut()) else {
        return Ok(json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"status":"error - no versions"}"#,
        ));
    };

    for (version, object) in versions.iter_mut() {
        let Some(dist) = object.get_mut("dist") else {
            return Ok(json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"status":"error - no dist"}"#,
            ));
        };
        let Some(tarball) = dist.get("tarball").and_then(|t| t.as_str()) else {
            return Ok(json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"status":"error - no tarball"}"#,
            ));
        };

        let tarball = tarball.replace('\\', "");
        let rewritten = proxy_package_url(&base, &channel, &index, &package, version, &tarball);
        dist["tarball"] = json!(rewritten);
    }

    Ok(pretty_json(&data))
}

/// `GET /api/v1/commonjs/proxy/{channel}/{index}/{package}/{version}/` —
/// the upstream version document with its tarball rewritten.
pub async fn proxy_package_version(
    State(state): State<SharedState>,
    Path((channel, index, package, version)): Path<(String, String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let mut data =
        upstream_json(&state, &format!("{}/{}/{}/", NPM_UPSTREAM, package, version)).await?;
    let base = request_base(&headers);

    let Some(dist) = data.get_mut("dist") else {
        return Ok(json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"status":"error - no dist"}"#,
        ));
    };
    let Some(tarball) = dist.get("tarball").and_then(|t| t.as_str()) else {
        return Ok(json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"status":"error - no tarball"}"#,
        ));
    };

    let tarball = tarball.replace('\\', "");
    let rewritten = proxy_package_url(&base, &channel, &index, &package, &version, &tarball);
    dist["tarball"] = json!(rewritten);

    Ok(pretty_json(&data))
}

/// `GET /api/v1/commonjs/proxy/package/{channel}/{index}/{package}/{version}?upstream=<url>`
///
/// The download side of the proxy: fetch the tarball from the upstream
/// URL recorded in the rewritten registry document, persist it under the
/// npm naming convention, and emit it.
pub async fn proxy_package(
    State(state): State<SharedState>,
    Path((channel, index, package, version)): Path<(String, String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let Some(upstream) = params.get("upstream") else {
        return Ok(json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"status":"error","no upstream url given"}"#,
        ));
    };

    // npm distributions are tarballs named <package>-<version>.tgz.
    let relic_name = format!("{}-{}.tgz", package, version);

    let fetched = fetch_relic_if_missing(
        &state.store,
        &state.settings,
        &state.http,
        &state.locks,
        &channel,
        &index,
        &relic_name,
        upstream,
    )
    .await;

    if let Err(e) = fetched {
        match e {
            ReliquaryError::UpstreamFailed(_) | ReliquaryError::Http(_) => return Err(e.into()),
            _ => {}
        }
    }

    download_response(&state, &channel, &index, &relic_name).await
}
