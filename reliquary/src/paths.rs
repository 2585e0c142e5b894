// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Validation of relic storage paths.

Every path that reaches the filesystem is derived from
`(channel, index, relic_name)` route parameters supplied by clients, so
each component is validated against a restricted character set and the
joined path is lexically normalized and checked for containment inside the
configured storage root before any I/O happens. Containment failure is a
hard error, never a not-found.
*/

use {
    crate::error::{ReliquaryError, Result},
    once_cell::sync::Lazy,
    regex::Regex,
    std::path::{Component, Path, PathBuf},
};

static FORBIDDEN_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\-/ .]").expect("static regex should compile"));

/// Which part of a relic location failed validation.
///
/// The HTTP boundary renders different error bodies for the channel/index
/// folder and the relic name itself.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PathScope {
    Location,
    RelicName,
}

impl std::fmt::Display for PathScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Location => write!(f, "channel/index"),
            Self::RelicName => write!(f, "relic name"),
        }
    }
}

/// A validated set of storage paths for a relic location.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RelicPaths {
    /// The normalized storage root.
    pub root: PathBuf,

    /// The directory holding relics for the channel/index pair.
    pub folder: PathBuf,

    /// The full relic path, when a relic name was supplied.
    pub file: Option<PathBuf>,
}

/// Lexically normalize a path, resolving `.` and `..` components without
/// touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut components = path.components().peekable();
    let mut ret = if let Some(c @ Component::Prefix(..)) = components.peek().copied() {
        components.next();
        PathBuf::from(c.as_os_str())
    } else {
        PathBuf::new()
    };

    for component in components {
        match component {
            Component::Prefix(..) => unreachable!(),
            Component::RootDir => {
                ret.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                ret.pop();
            }
            Component::Normal(c) => {
                ret.push(c);
            }
        }
    }

    ret
}

fn check_component(path: &Path, root: &Path, scope: PathScope) -> Result<()> {
    if !path.starts_with(root) {
        return Err(ReliquaryError::PathEscape(scope));
    }

    if FORBIDDEN_CHARS.is_match(&path.to_string_lossy()) {
        return Err(ReliquaryError::InvalidName(scope));
    }

    Ok(())
}

/// Resolve and validate the storage paths for `(channel, index)` and an
/// optional relic name under the configured root.
pub fn resolve_relic_paths(
    root: Option<&Path>,
    channel: &str,
    index: &str,
    relic_name: Option<&str>,
) -> Result<RelicPaths> {
    let root = normalize_path(root.ok_or(ReliquaryError::NotConfigured)?);

    let folder = normalize_path(&root.join(channel).join(index));
    check_component(&folder, &root, PathScope::Location)?;

    let file = if let Some(name) = relic_name {
        let file = normalize_path(&folder.join(name));
        check_component(&file, &root, PathScope::RelicName)?;
        Some(file)
    } else {
        None
    };

    Ok(RelicPaths { root, folder, file })
}
