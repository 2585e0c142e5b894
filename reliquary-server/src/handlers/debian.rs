// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! The Debian repository tree: directory listings, generated metadata and
pool downloads.

Layout served per channel:

```text
<channel>/
    dist/<index>/Release
    dist/<index>/main/binary-<arch>/{Release,Packages,Packages.gz,Packages.bz2}
    pool/<index>/<relic_name>
```
*/

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use reliquary::{io::Compression, metadata, ReliquaryError};

use crate::{
    download::download_response,
    errors::ApiError,
    handlers::route_url,
    listing::{directory_listing, ListingItem},
    state::SharedState,
};

fn arch_from_segment(segment: &str) -> Result<&str, ApiError> {
    segment
        .strip_prefix("binary-")
        .ok_or_else(|| ReliquaryError::NotFound.into())
}

async fn channel_index_items(
    state: &SharedState,
    base: &str,
    channel: &str,
    route_prefix: &str,
) -> Result<Vec<ListingItem>, ApiError> {
    let channelobj = state
        .store
        .channel_by_name(channel)
        .await?
        .ok_or(ReliquaryError::NotFound)?;

    let mut items = state
        .store
        .indices_of_channel(channelobj.id)
        .await?
        .into_iter()
        .map(|index| {
            ListingItem::folder(
                route_url(base, &["debian", channel, route_prefix, &index.name], true),
                index.name,
            )
        })
        .collect::<Vec<_>>();
    items.sort_by(|a, b| a.text.cmp(&b.text));

    Ok(items)
}

/// `GET /api/v1/debian/{channel}/` — the channel root: `dist` and `pool`.
pub async fn channel_index(
    State(state): State<SharedState>,
    Path(channel): Path<String>,
    headers: axum::http::HeaderMap,
) -> Result<Response, ApiError> {
    state
        .store
        .channel_by_name(&channel)
        .await?
        .ok_or(ReliquaryError::NotFound)?;

    let base = crate::handlers::request_base(&headers);
    let items = vec![
        ListingItem::folder(route_url(&base, &["debian", &channel, "dist"], true), "dist"),
        ListingItem::folder(route_url(&base, &["debian", &channel, "pool"], true), "pool"),
    ];

    Ok(directory_listing(&format!("Index of /{}", channel), &items, false).into_response())
}

/// `GET /api/v1/debian/{channel}/dist/` — one folder per index.
pub async fn dist_root_index(
    State(state): State<SharedState>,
    Path(channel): Path<String>,
    headers: axum::http::HeaderMap,
) -> Result<Response, ApiError> {
    let base = crate::handlers::request_base(&headers);
    let items = channel_index_items(&state, &base, &channel, "dist").await?;

    Ok(
        directory_listing(&format!("Index of /{}/dist/", channel), &items, true)
            .into_response(),
    )
}

/// `GET /api/v1/debian/{channel}/pool/` — one folder per index.
pub async fn pool_root_index(
    State(state): State<SharedState>,
    Path(channel): Path<String>,
    headers: axum::http::HeaderMap,
) -> Result<Response, ApiError> {
    let base = crate::handlers::request_base(&headers);
    let items = channel_index_items(&state, &base, &channel, "pool").await?;

    Ok(
        directory_listing(&format!("Index of /{}/pool/", channel), &items, true)
            .into_response(),
    )
}

/// `GET /api/v1/debian/{channel}/dist/{index}/` — `main` plus the
/// distribution `Release`.
pub async fn dist_index(
    State(state): State<SharedState>,
    Path((channel, index)): Path<(String, String)>,
    headers: axum::http::HeaderMap,
) -> Result<Response, ApiError> {
    state
        .store
        .index_by_names(&channel, &index)
        .await?
        .ok_or(ReliquaryError::NotFound)?;

    let base = crate::handlers::request_base(&headers);
    let items = vec![
        ListingItem::folder(
            route_url(&base, &["debian", &channel, "dist", &index, "main"], true),
            "main",
        ),
        ListingItem::file(
            route_url(
                &base,
                &["debian", &channel, "dist", &index, "Release"],
                false,
            ),
            "Release",
        ),
    ];

    Ok(directory_listing(
        &format!("Index of /{}/dist/{}/", channel, index),
        &items,
        true,
    )
    .into_response())
}

/// `GET /api/v1/debian/{channel}/dist/{index}/main/` — one folder per
/// enumerated architecture.
pub async fn comp_index(
    State(state): State<SharedState>,
    Path((channel, index)): Path<(String, String)>,
    headers: axum::http::HeaderMap,
) -> Result<Response, ApiError> {
    let indexobj = state
        .store
        .index_by_names(&channel, &index)
        .await?
        .ok_or(ReliquaryError::NotFound)?;

    let base = crate::handlers::request_base(&headers);
    let mut items = metadata::unique_architectures(&state.store, indexobj.id)
        .await?
        .into_iter()
        .map(|arch| {
            let segment = format!("binary-{}", arch);
            ListingItem::folder(
                route_url(
                    &base,
                    &["debian", &channel, "dist", &index, "main", &segment],
                    true,
                ),
                segment.clone(),
            )
        })
        .collect::<Vec<_>>();
    items.sort_by(|a, b| a.text.cmp(&b.text));

    Ok(directory_listing(
        &format!("Index of /{}/dist/{}/main/", channel, index),
        &items,
        true,
    )
    .into_response())
}

/// `GET /api/v1/debian/{channel}/dist/{index}/main/binary-{arch}/` — the
/// four metadata files.
pub async fn arch_index(
    State(state): State<SharedState>,
    Path((channel, index, binary_arch)): Path<(String, String, String)>,
    headers: axum::http::HeaderMap,
) -> Result<Response, ApiError> {
    arch_from_segment(&binary_arch)?;

    state
        .store
        .index_by_names(&channel, &index)
        .await?
        .ok_or(ReliquaryError::NotFound)?;

    let base = crate::handlers::request_base(&headers);
    let mut items = ["Release", "Packages", "Packages.gz", "Packages.bz2"]
        .iter()
        .map(|file| {
            ListingItem::file(
                route_url(
                    &base,
                    &["debian", &channel, "dist", &index, "main", &binary_arch, file],
                    false,
                ),
                *file,
            )
        })
        .collect::<Vec<_>>();
    items.sort_by(|a, b| a.text.cmp(&b.text));

    Ok(directory_listing(
        &format!("Index of /{}/dist/{}/main/{}", channel, index, binary_arch),
        &items,
        true,
    )
    .into_response())
}

async fn packages_response(
    state: &SharedState,
    channel: &str,
    index: &str,
    binary_arch: &str,
    compression: Compression,
) -> Result<Response, ApiError> {
    let arch = arch_from_segment(binary_arch)?.trim().to_lowercase();

    state
        .store
        .index_by_names(channel, index)
        .await?
        .ok_or(ReliquaryError::NotFound)?;

    let blob =
        metadata::packages_index(&state.store, channel, index, &arch, compression, false).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, compression.content_type())],
        blob.data,
    )
        .into_response())
}

/// `GET .../main/binary-{arch}/Packages`
pub async fn arch_packages(
    State(state): State<SharedState>,
    Path((channel, index, binary_arch)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    packages_response(&state, &channel, &index, &binary_arch, Compression::None).await
}

/// `GET .../main/binary-{arch}/Packages.gz`
pub async fn arch_packages_gz(
    State(state): State<SharedState>,
    Path((channel, index, binary_arch)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    packages_response(&state, &channel, &index, &binary_arch, Compression::Gzip).await
}

/// `GET .../main/binary-{arch}/Packages.bz2`
pub async fn arch_packages_bz2(
    State(state): State<SharedState>,
    Path((channel, index, binary_arch)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    packages_response(&state, &channel, &index, &binary_arch, Compression::Bzip2).await
}

/// `GET .../main/binary-{arch}/Release` — the fixed per-architecture
/// stanza.
pub async fn arch_release(
    Path((_channel, _index, binary_arch)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let arch = arch_from_segment(&binary_arch)?;
    let blob = metadata::arch_release(arch);

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        blob.data,
    )
        .into_response())
}

/// `GET /api/v1/debian/{channel}/dist/{index}/Release` — the
/// per-distribution manifest.
pub async fn dist_release(
    State(state): State<SharedState>,
    Path((channel, index)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    state
        .store
        .index_by_names(&channel, &index)
        .await?
        .ok_or(ReliquaryError::NotFound)?;

    let data = metadata::distribution_release(&state.store, &channel, &index).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        data,
    )
        .into_response())
}

/// `GET /api/v1/debian/{channel}/pool/{index}/` — the relic files.
pub async fn pool_dist_index(
    State(state): State<SharedState>,
    Path((channel, index)): Path<(String, String)>,
    headers: axum::http::HeaderMap,
) -> Result<Response, ApiError> {
    let indexobj = state
        .store
        .index_by_names(&channel, &index)
        .await?
        .ok_or(ReliquaryError::NotFound)?;

    let base = crate::handlers::request_base(&headers);
    let mut items = state
        .store
        .relics_of_index(indexobj.id)
        .await?
        .into_iter()
        .map(|relic| {
            ListingItem::file(
                route_url(
                    &base,
                    &["debian", &channel, "pool", &index, &relic.name],
                    false,
                ),
                relic.name,
            )
        })
        .collect::<Vec<_>>();
    items.sort_by(|a, b| a.text.cmp(&b.text));

    Ok(directory_listing(
        &format!("Index of /{}/pool/{}/", channel, index),
        &items,
        true,
    )
    .into_response())
}

/// `GET /api/v1/debian/{channel}/pool/{index}/{relic_name}` — download a
/// pool file.
pub async fn pool_package(
    State(state): State<SharedState>,
    Path((channel, index, relic_name)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    download_response(&state, &channel, &index, &relic_name).await
}
