//! Sandbox Registry
//!
//! Maps strategy directories to identities and resolved configuration, and
//! discovers strategy directories under the configured root.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::domain::{CONFIG_FILE, ENTRY_FILE, SandboxId, StrategyConfig, base_name};

/// Strategy directory lookup rooted at one directory.
#[derive(Debug, Clone)]
pub struct SandboxRegistry {
    root: PathBuf,
}

impl SandboxRegistry {
    /// Create a registry over `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Strategies root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Identity of a strategy directory.
    ///
    /// Relative paths are resolved against the working directory first, so
    /// `.`, `./x` and `strategies/x` name the same sandbox as their absolute
    /// form.
    #[must_use]
    pub fn identity(dir: &Path) -> SandboxId {
        let resolved =
            std::path::absolute(dir).map_or_else(|_| dir.to_path_buf(), |abs| lexical(&abs));
        SandboxId::for_directory(&resolved)
    }

    /// Whether `dir` is a directory holding the entry file.
    #[must_use]
    pub fn is_strategy_dir(dir: &Path) -> bool {
        dir.is_dir() && dir.join(ENTRY_FILE).is_file()
    }

    /// Every direct subdirectory of the root containing the entry file,
    /// sorted by path.
    pub fn discover(&self) -> io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if Self::is_strategy_dir(&path) {
                dirs.push(path);
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Resolve `config.json` in `dir`, degrading to defaults on any problem.
    #[must_use]
    pub fn resolve_config(dir: &Path) -> StrategyConfig {
        let dir_name = base_name(dir);
        let path = dir.join(CONFIG_FILE);

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return StrategyConfig::defaults_for(&dir_name);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable strategy config, using defaults");
                return StrategyConfig::defaults_for(&dir_name);
            }
        };

        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(document) => StrategyConfig::resolve(&dir_name, Some(&document)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Malformed strategy config, using defaults");
                StrategyConfig::defaults_for(&dir_name)
            }
        }
    }
}

fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn strategy(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(ENTRY_FILE), "print('hi')\n").unwrap();
        dir
    }

    #[test]
    fn discovers_only_strategy_dirs_sorted() {
        let root = tempfile::tempdir().unwrap();
        strategy(root.path(), "zeta");
        strategy(root.path(), "alpha");
        fs::create_dir(root.path().join("empty")).unwrap();
        fs::write(root.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(root.path().join("wrong_entry")).unwrap();
        fs::write(root.path().join("wrong_entry").join("main.py"), "x").unwrap();

        let found = SandboxRegistry::new(root.path()).discover().unwrap();

        let names: Vec<_> = found.iter().map(|p| base_name(p)).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn relative_paths_resolve_to_the_directory_name() {
        let cwd = std::env::current_dir().unwrap();

        assert_eq!(
            SandboxRegistry::identity(Path::new(".")),
            SandboxId::for_directory(&cwd)
        );
        assert_eq!(SandboxRegistry::identity(Path::new("./x")).as_str(), "strategy-x");
        assert_eq!(
            SandboxRegistry::identity(Path::new("strategies/x")).as_str(),
            "strategy-x"
        );
        assert_eq!(
            SandboxRegistry::identity(Path::new("strategies/x/..")).as_str(),
            "strategy-strategies"
        );
        assert_eq!(
            SandboxRegistry::identity(&cwd.join("strategies/x")),
            SandboxRegistry::identity(Path::new("strategies/x"))
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let registry = SandboxRegistry::new(root.path().join("nope"));
        assert!(registry.discover().is_err());
    }

    #[test]
    fn config_file_is_optional() {
        let root = tempfile::tempdir().unwrap();
        let dir = strategy(root.path(), "bob_momentum");

        let config = SandboxRegistry::resolve_config(&dir);

        assert_eq!(config.user_id, "bob_momentum");
    }

    #[test]
    fn config_file_is_read() {
        let root = tempfile::tempdir().unwrap();
        let dir = strategy(root.path(), "example_alice");
        fs::write(
            dir.join(CONFIG_FILE),
            r#"{"user_id": "alice", "env": {"SYMBOL": "MSFT"}}"#,
        )
        .unwrap();

        let config = SandboxRegistry::resolve_config(&dir);

        assert_eq!(config.user_id, "alice");
        assert_eq!(config.name, "example_alice");
        assert_eq!(config.env["SYMBOL"], "MSFT");
    }

    #[test]
    fn malformed_config_degrades() {
        let root = tempfile::tempdir().unwrap();
        let dir = strategy(root.path(), "broken");
        fs::write(dir.join(CONFIG_FILE), "{ user_id: ").unwrap();

        let config = SandboxRegistry::resolve_config(&dir);

        assert_eq!(config, StrategyConfig::defaults_for("broken"));
    }
}
