// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Artifact index and repository metadata engine.

Reliquary stores binary artifacts (*relics*) in a plain filesystem tree of
the shape `<root>/<channel>/<index>/<relic_name>` and keeps a relational
catalog of what lives there. On top of the catalog it produces the metadata
that package managers expect: a PEP-503 simple index, a CommonJS/npm
registry document tree, and Debian `Packages`/`Release` repository indices.

The crate is the protocol-agnostic core. It knows nothing about HTTP
routing; the companion `reliquary-server` crate wires these primitives to
an HTTP surface.

A tour of the main modules:

* [store] — the catalog: channels, indices, relics, extracted Debian
  control data and the metadata blob cache, backed by SQLite through a
  [store::Store] handle with explicit transactions.
* [paths] — validation of `(channel, index, relic_name)` triples against
  the configured storage root, including traversal containment.
* [names] — pure filename decoders for CommonJS, PyPI and Debian artifact
  naming conventions.
* [control] — RFC822-style control file primitives shared by the `.deb`
  reader and the Debian metadata engine.
* [deb] — `.deb` archive reading, control extraction and checksumming, plus
  a small builder used to synthesize packages in tests.
* [reindex] — the filesystem-to-catalog reconciliation sweep.
* [metadata] — generation of Debian `Packages` (plain, gzip, bzip2),
  per-architecture `Release` and per-distribution `Release` documents,
  memoized through the catalog's blob cache.
* [fetch] — the proxy-mode fetch-and-persist path for relics that are not
  yet stored locally.
*/

pub mod control;
pub mod deb;
pub mod error;
pub mod fetch;
pub mod io;
pub mod metadata;
pub mod names;
pub mod paths;
pub mod reindex;
pub mod settings;
pub mod store;

pub use error::{ReliquaryError, Result};
