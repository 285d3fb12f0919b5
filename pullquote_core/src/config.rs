use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::QuoteError;
use crate::QuoteResult;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = [
	"pullquote.toml",
	".pullquote.toml",
	".config/pullquote.toml",
];

/// Configuration loaded from a `pullquote.toml` file.
///
/// ```toml
/// disable_gitignore = false
///
/// [walk]
/// extensions = ["md", "markdown"]
/// skip_dirs = ["testdata", "vendor"]
/// exclude = ["CHANGELOG.md", "docs/generated/"]
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct QuoteConfig {
	/// Settings for `--walk` discovery.
	#[serde(default)]
	pub walk: WalkConfig,
	/// When true, `.gitignore` files are not used for filtering during
	/// `--walk`. Explicit paths are never filtered.
	#[serde(default)]
	pub disable_gitignore: bool,
}

/// Which files `--walk` picks up.
#[derive(Debug, Clone, Deserialize)]
pub struct WalkConfig {
	/// File extensions treated as documents, compared case-insensitively.
	#[serde(default = "default_extensions")]
	pub extensions: Vec<String>,
	/// Directory names skipped wherever they appear. Hidden directories are
	/// always skipped.
	#[serde(default = "default_skip_dirs")]
	pub skip_dirs: Vec<String>,
	/// Gitignore-style patterns for files and directories to skip, relative
	/// to the walk root.
	///
	/// Examples: `"build/"`, `"*.generated.md"`, `"!important.md"`.
	#[serde(default)]
	pub exclude: Vec<String>,
}

impl Default for WalkConfig {
	fn default() -> Self {
		Self {
			extensions: default_extensions(),
			skip_dirs: default_skip_dirs(),
			exclude: Vec::new(),
		}
	}
}

impl WalkConfig {
	pub fn is_document(&self, path: &Path) -> bool {
		let Some(extension) = path.extension().and_then(|extension| extension.to_str()) else {
			return false;
		};

		self.extensions
			.iter()
			.any(|candidate| candidate.eq_ignore_ascii_case(extension))
	}

	pub fn is_skipped_dir(&self, name: &str) -> bool {
		name.starts_with('.') || self.skip_dirs.iter().any(|skip| skip == name)
	}
}

fn default_extensions() -> Vec<String> {
	vec!["md".to_string()]
}

fn default_skip_dirs() -> Vec<String> {
	vec!["testdata".to_string()]
}

impl QuoteConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if there is no config file.
	pub fn load(root: &Path) -> QuoteResult<Option<QuoteConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content =
			std::fs::read_to_string(&config_path).map_err(|e| QuoteError::io(&config_path, e))?;
		let config: QuoteConfig =
			toml::from_str(&content).map_err(|e| QuoteError::ConfigParse(e.to_string()))?;

		tracing::debug!(path = %config_path.display(), "loaded config");

		Ok(Some(config))
	}
}
