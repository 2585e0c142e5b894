// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Filename decoders for the supported packaging conventions.

Each decoder is a pure function from a relic filename to its components.
The CommonJS and PyPI decoders never fail: an unrecognized name degrades to
the whole filename acting as the package name. The Debian decoder is the
exception — a non-matching name means the file is not a Debian artifact at
all, which callers use to skip it during architecture enumeration.
*/

use {once_cell::sync::Lazy, regex::Regex};

// CommonJS packages/1.1: <name>-<semver>.<ext>, semver 2.0 with optional
// pre-release and build metadata.
static COMMONJS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([\w.-]+)-((?:0|[1-9]\d*)\.(?:0|[1-9]\d*)\.(?:0|[1-9]\d*)(?:-[0-9a-z-]+(?:\.[0-9a-z-]+)*)?(?:\+[0-9a-z-]+(?:\.[0-9a-z-]+)*)?)\.(tar\.gz|tgz)$",
    )
    .expect("static regex should compile")
});

// Legacy sdist/egg naming: <name>-<pep440 version>[-<pyver>].<ext>
// e.g. pytz-2016.10-py2.4.egg, pytz-2016.10.tar.gz
static PYPI_SDIST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([\w.-]+)-((?:(?:\d+!)?\d+(?:\.\d+)*)(?:(?:a|b|rc)?\d+)?(?:\.post\d+)?(?:\.dev\d+)?(?:\+[A-Za-z0-9.]+)?)(?:-([\w.]+))?\.(tgz|tar\.gz|zip|tar\.bz2|tbz2|egg)$",
    )
    .expect("static regex should compile")
});

// PEP-491 wheel naming:
// <name>-<version>[-<build tag>]-<python tag>-<abi tag>-<platform tag>.whl
static PYPI_WHEEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([\w.-]+)-((?:(?:\d+!)?\d+(?:\.\d+)*)(?:(?:a|b|rc)?\d+)?(?:\.post\d+)?(?:\.dev\d+)?(?:\+[A-Za-z0-9.]+)?)(?:-(\d\w*))?-(\w+(?:\.\w+)*)-(\w+)-(\w+)\.whl$",
    )
    .expect("static regex should compile")
});

// Permissive last resort: a name, a dotted numeric version, a remainder.
static PYPI_FALLBACK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*)-(\d+(?:\.\d+)+)(.*)$").expect("static regex should compile"));

static DEBIAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([a-z0-9][a-z0-9.+-]*)_([0-9][0-9A-Za-z.+~:-]*)(?:_([A-Za-z0-9-]+))?\.((?:orig\.)?tar\.gz|diff\.gz|dsc|deb)$",
    )
    .expect("static regex should compile")
});

static PYPI_NORMALIZE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-_.]+").expect("static regex should compile"));

/// Decoded CommonJS artifact name.
///
/// `version` and `extension` are absent when the name did not conform, in
/// which case `package` carries the whole filename.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommonjsName {
    pub package: String,
    pub version: Option<String>,
    pub extension: Option<String>,
}

impl CommonjsName {
    pub fn parse(name: &str) -> Self {
        if let Some(captures) = COMMONJS_RE.captures(name) {
            Self {
                package: captures[1].to_string(),
                version: Some(captures[2].to_string()),
                extension: Some(captures[3].to_string()),
            }
        } else {
            Self {
                package: name.to_string(),
                version: None,
                extension: None,
            }
        }
    }
}

/// Decoded PyPI artifact name.
///
/// Decoding follows PEP-440/PEP-491 with a permissive fallback for the
/// non-conforming names observed in the wild. On total failure `package`
/// carries the whole filename.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PypiName {
    pub package: String,
    pub version: Option<String>,
    pub extension: Option<String>,
}

impl PypiName {
    pub fn parse(name: &str) -> Self {
        if let Some(captures) = PYPI_SDIST_RE.captures(name) {
            return Self {
                package: captures[1].to_string(),
                version: Some(captures[2].to_string()),
                extension: Some(captures[4].to_string()),
            };
        }

        if let Some(captures) = PYPI_WHEEL_RE.captures(name) {
            return Self {
                package: captures[1].to_string(),
                version: Some(captures[2].to_string()),
                extension: Some("whl".to_string()),
            };
        }

        if let Some(captures) = PYPI_FALLBACK_RE.captures(name) {
            return Self {
                package: captures[1].to_string(),
                version: Some(captures[2].to_string()),
                extension: Some(captures[3].trim_matches('.').to_string()),
            };
        }

        Self {
            package: name.to_string(),
            version: None,
            extension: None,
        }
    }
}

/// Decoded Debian artifact name: `<package>_<version>[_<arch>].<ext>`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DebianName {
    pub package: String,
    pub version: String,
    pub architecture: Option<String>,
    pub extension: String,
}

impl DebianName {
    /// Decode a Debian artifact filename.
    ///
    /// Returns [None] when the name is not a Debian artifact.
    pub fn parse(name: &str) -> Option<Self> {
        let captures = DEBIAN_RE.captures(name)?;

        Some(Self {
            package: captures[1].to_string(),
            version: captures[2].to_string(),
            architecture: captures.get(3).map(|m| m.as_str().to_string()),
            extension: captures[4].to_string(),
        })
    }

    /// Reassemble the filename this instance was decoded from.
    pub fn to_filename(&self) -> String {
        match &self.architecture {
            Some(arch) => format!("{}_{}_{}.{}", self.package, self.version, arch, self.extension),
            None => format!("{}_{}.{}", self.package, self.version, self.extension),
        }
    }
}

/// PEP-503 package name normalization: runs of `-`, `_` and `.` collapse to
/// a single `-` and the result is lowercased.
pub fn normalize_pypi_package_name(name: &str) -> String {
    PYPI_NORMALIZE_RE.replace_all(name, "-").to_lowercase()
}
