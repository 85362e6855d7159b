//! Configuration for portage.
//!
//! Loaded from `--config PATH`, or `portage.toml` in the working directory
//! when present. Every field is optional; CLI flags override file values.
//!
//! ```toml
//! [translate]
//! rules = "rules/go-crystal.toml"
//! strict = true
//! out_dir = "crystal/src"
//!
//! [verify]
//! timeout_ms = 30000
//! crystal = "/usr/local/bin/crystal"
//! recorded = "testdata/recorded.json"
//!
//! [output]
//! pretty = true
//! colors = "auto"
//! ```

use anyhow::Context;
use portage_report::PrettyConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "portage.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslateConfig {
    /// Rule table replacing the built-in one.
    pub rules: Option<PathBuf>,
    /// Fail on rule ties instead of picking the first rule.
    pub strict: bool,
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifyConfig {
    pub timeout_ms: u64,
    /// Crystal compiler executable.
    pub crystal: PathBuf,
    /// Recorded source outputs to cross-check test literals against.
    pub recorded: Option<PathBuf>,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            crystal: PathBuf::from("crystal"),
            recorded: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortageConfig {
    pub translate: TranslateConfig,
    pub verify: VerifyConfig,
    pub output: PrettyConfig,
}

impl PortageConfig {
    /// Load `explicit`, else `portage.toml` in `cwd` if it exists, else defaults.
    ///
    /// A path given explicitly must exist.
    pub fn load(explicit: Option<&Path>, cwd: &Path) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let implicit = cwd.join(CONFIG_FILE);
                if !implicit.is_file() {
                    return Ok(Self::default());
                }
                implicit
            }
        };
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config.relative_to(path.parent().unwrap_or(cwd)))
    }

    /// Resolve relative paths against the config file's directory.
    fn relative_to(mut self, base: &Path) -> Self {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        if let Some(rules) = self.translate.rules.as_mut() {
            resolve(rules);
        }
        if let Some(out_dir) = self.translate.out_dir.as_mut() {
            resolve(out_dir);
        }
        if let Some(recorded) = self.verify.recorded.as_mut() {
            resolve(recorded);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portage_report::ColorMode;
    use tempfile::TempDir;

    #[test]
    fn test_missing_implicit_config_is_default() {
        let dir = TempDir::new().unwrap();
        let config = PortageConfig::load(None, dir.path()).unwrap();
        assert_eq!(config, PortageConfig::default());
        assert_eq!(config.verify.timeout_ms, 30_000);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[translate]\nstrict = true\nrules = \"rules.toml\"\n\n[output]\ncolors = \"never\"\n",
        )
        .unwrap();
        let config = PortageConfig::load(None, dir.path()).unwrap();
        assert!(config.translate.strict);
        assert_eq!(config.translate.rules, Some(dir.path().join("rules.toml")));
        assert_eq!(config.output.colors, Some(ColorMode::Never));
        assert_eq!(config.verify, VerifyConfig::default());
    }

    #[test]
    fn test_explicit_config_must_exist_and_parse() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(PortageConfig::load(Some(&missing), dir.path()).is_err());

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[translate]\nstrikt = true\n").unwrap();
        let err = PortageConfig::load(Some(&bad), dir.path()).unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }
}
