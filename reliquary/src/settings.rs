// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Runtime configuration.

Settings are read from a TOML file:

```toml
[reliquary]
location = "/srv/reliquary"
realm = "reliquary"
auth = "alice:secret:admin bob:hunter2"
xsendfile_enabled = false
xsendfile_frontend = "nginx"

[database]
url = "sqlite://reliquary.db"
```

The `auth` value is a whitespace-separated list of credentials of the form
`user:password[:group1,group2,...]`.
*/

use {
    crate::error::Result,
    serde::Deserialize,
    std::path::{Path, PathBuf},
};

fn default_realm() -> String {
    "reliquary".to_string()
}

fn default_frontend() -> String {
    "nginx".to_string()
}

/// Top-level settings document.
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub reliquary: ReliquarySettings,
    pub database: DatabaseSettings,
}

/// Settings governing storage and the HTTP surface.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ReliquarySettings {
    /// Filesystem root for all relics.
    pub location: Option<PathBuf>,

    /// HTTP basic auth realm.
    pub realm: String,

    /// Whitespace-separated `user:password[:groups]` credentials.
    pub auth: String,

    /// Whether downloads are off-loaded to a front-end web server.
    pub xsendfile_enabled: bool,

    /// The front-end web server flavor. Only `nginx` is supported.
    pub xsendfile_frontend: String,
}

impl Default for ReliquarySettings {
    fn default() -> Self {
        Self {
            location: None,
            realm: default_realm(),
            auth: String::new(),
            xsendfile_enabled: false,
            xsendfile_frontend: default_frontend(),
        }
    }
}

/// Database connection settings.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
}

/// A single parsed credential from the `auth` setting.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Credential {
    pub username: String,
    pub password: String,
    pub groups: Vec<String>,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

impl ReliquarySettings {
    /// Parse the configured credentials.
    ///
    /// Malformed entries (no password part) are skipped.
    pub fn credentials(&self) -> Vec<Credential> {
        self.auth
            .split_whitespace()
            .filter_map(|item| {
                let mut parts = item.splitn(3, ':');
                let username = parts.next()?.to_string();
                let password = parts.next()?.to_string();
                let groups = parts
                    .next()
                    .map(|g| g.split(',').map(|s| s.to_string()).collect())
                    .unwrap_or_default();

                Some(Credential {
                    username,
                    password,
                    groups,
                })
            })
            .collect()
    }

    /// Check a username/password pair against the configured credentials.
    ///
    /// The username compare is case-insensitive and whitespace-trimmed; the
    /// password compare is exact. Returns the group list on success.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<Vec<String>> {
        let wanted = username.trim().to_lowercase();

        self.credentials()
            .into_iter()
            .find(|c| c.username.trim().to_lowercase() == wanted && c.password == password)
            .map(|c| c.groups)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::error::Result};

    fn settings(auth: &str) -> ReliquarySettings {
        ReliquarySettings {
            auth: auth.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_credentials_with_groups() {
        let creds = settings("alice:secret:admin,release bob:pw").credentials();

        assert_eq!(creds.len(), 2);
        assert_eq!(creds[0].username, "alice");
        assert_eq!(creds[0].groups, vec!["admin", "release"]);
        assert!(creds[1].groups.is_empty());
    }

    #[test]
    fn authenticates_case_insensitive_username() {
        let s = settings("Alice:secret");

        assert!(s.authenticate("alice", "secret").is_some());
        assert!(s.authenticate(" ALICE ", "secret").is_some());
        assert!(s.authenticate("alice", "SECRET").is_none());
        assert!(s.authenticate("mallory", "secret").is_none());
    }

    #[test]
    fn loads_toml_document() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("reliquary.toml");
        std::fs::write(
            &path,
            "[reliquary]\nlocation = \"/srv/reliquary\"\n\n[database]\nurl = \"sqlite::memory:\"\n",
        )?;

        let settings = Settings::from_file(&path)?;
        assert_eq!(
            settings.reliquary.location.as_deref(),
            Some(Path::new("/srv/reliquary"))
        );
        assert_eq!(settings.reliquary.realm, "reliquary");
        assert_eq!(settings.database.url, "sqlite::memory:");

        Ok(())
    }
}
