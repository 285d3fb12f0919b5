use std::collections::HashSet;
use std::fmt;
use std::io::BufRead;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;
use tokio::sync::mpsc::Sender;

use crate::CancelSignal;
use crate::QuoteConfig;
use crate::QuoteError;
use crate::QuoteResult;
use crate::WalkConfig;

/// Where the documents of a run come from.
///
/// Sources are visited in order: explicit paths, then the newline separated
/// path list, then the walk. Every path is made absolute against `root` and
/// each document is produced at most once.
pub struct Discovery {
	root: PathBuf,
	paths: Vec<PathBuf>,
	list: Option<Box<dyn BufRead + Send>>,
	walk: Option<PathBuf>,
}

impl fmt::Debug for Discovery {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Discovery")
			.field("root", &self.root)
			.field("paths", &self.paths)
			.field("list", &self.list.is_some())
			.field("walk", &self.walk)
			.finish()
	}
}

impl Discovery {
	/// Relative paths are resolved against `root`.
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			paths: Vec::new(),
			list: None,
			walk: None,
		}
	}

	#[must_use]
	pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
		self.paths.push(path.into());
		self
	}

	#[must_use]
	pub fn paths<I, P>(mut self, paths: I) -> Self
	where
		I: IntoIterator<Item = P>,
		P: Into<PathBuf>,
	{
		self.paths.extend(paths.into_iter().map(Into::into));
		self
	}

	/// Read additional document paths, one per line.
	#[must_use]
	pub fn list(mut self, reader: impl BufRead + Send + 'static) -> Self {
		self.list = Some(Box::new(reader));
		self
	}

	/// Recursively collect documents below `dir`.
	#[must_use]
	pub fn walk(mut self, dir: impl Into<PathBuf>) -> Self {
		self.walk = Some(dir.into());
		self
	}

	/// Send every discovered document to `sender`.
	///
	/// Blocks while the channel is full. Returns early once `cancel` fires or
	/// the receiving side is closed.
	pub(crate) fn produce(
		self,
		config: &QuoteConfig,
		sender: &Sender<PathBuf>,
		cancel: &CancelSignal,
	) -> QuoteResult<()> {
		let Self {
			root,
			paths,
			list,
			walk,
		} = self;
		let mut seen = HashSet::new();
		let mut send = |path: &Path| -> bool {
			if cancel.is_cancelled() {
				return false;
			}

			let path = standardize(&root, path);
			if !seen.insert(path.clone()) {
				tracing::trace!(path = %path.display(), "skipping duplicate document");
				return true;
			}

			sender.blocking_send(path).is_ok()
		};

		for path in &paths {
			if !send(path) {
				return Ok(());
			}
		}

		if let Some(list) = list {
			for line in list.lines() {
				let line = line.map_err(|source| QuoteError::io("<stdin>", source))?;
				let line = line.trim();
				if line.is_empty() {
					continue;
				}
				if !send(Path::new(line)) {
					return Ok(());
				}
			}
		}

		if let Some(dir) = walk {
			let dir = standardize(&root, &dir);
			for path in walk_documents(&dir, config, cancel)? {
				if !send(&path) {
					return Ok(());
				}
			}
		}

		Ok(())
	}
}

/// Make `path` absolute against `root` and drop `.` and `..` components.
pub fn standardize(root: &Path, path: &Path) -> PathBuf {
	let joined = if path.is_absolute() {
		path.to_path_buf()
	} else {
		root.join(path)
	};

	let mut cleaned = PathBuf::new();
	for component in joined.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => {
				cleaned.pop();
			}
			other => cleaned.push(other),
		}
	}

	cleaned
}

/// Collect every document below `root`, sorted.
///
/// Hidden directories and the configured skip directories are never entered.
/// Files matched by the root `.gitignore` (unless disabled) or by the
/// configured exclude patterns are left out.
pub fn collect_documents(root: &Path, config: &QuoteConfig) -> QuoteResult<Vec<PathBuf>> {
	walk_documents(root, config, &CancelSignal::new())
}

/// Like [`collect_documents`], returning what was found so far once `cancel`
/// fires.
pub(crate) fn walk_documents(root: &Path, config: &QuoteConfig, cancel: &CancelSignal) -> QuoteResult<Vec<PathBuf>> {
	let gitignore = if config.disable_gitignore {
		Gitignore::empty()
	} else {
		build_gitignore(root)
	};
	let exclude = build_exclude_matcher(root, &config.walk.exclude)?;
	let mut walker = Walker {
		config: &config.walk,
		gitignore: &gitignore,
		exclude: &exclude,
		cancel,
		visited: HashSet::new(),
		files: Vec::new(),
	};

	walker.walk(root)?;

	let mut files = walker.files;
	files.sort();
	tracing::debug!(root = %root.display(), documents = files.len(), "walked documents");

	Ok(files)
}

fn build_exclude_matcher(root: &Path, patterns: &[String]) -> QuoteResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			QuoteError::ConfigParse(format!("invalid exclude pattern `{pattern}`: {e}"))
		})?;
	}
	builder
		.build()
		.map_err(|e| QuoteError::ConfigParse(format!("failed to build exclude rules: {e}")))
}

fn build_gitignore(root: &Path) -> Gitignore {
	let mut builder = GitignoreBuilder::new(root);
	let gitignore_path = root.join(".gitignore");
	if gitignore_path.is_file() {
		if let Some(error) = builder.add(&gitignore_path) {
			tracing::warn!(path = %gitignore_path.display(), %error, "ignoring unreadable .gitignore");
		}
	}
	builder.build().unwrap_or_else(|_| Gitignore::empty())
}

struct Walker<'a> {
	config: &'a WalkConfig,
	gitignore: &'a Gitignore,
	exclude: &'a Gitignore,
	cancel: &'a CancelSignal,
	visited: HashSet<PathBuf>,
	files: Vec<PathBuf>,
}

impl Walker<'_> {
	fn walk(&mut self, dir: &Path) -> QuoteResult<()> {
		if self.cancel.is_cancelled() {
			return Ok(());
		}

		// Symlinked directories can point back up the tree.
		let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
		if !self.visited.insert(canonical) {
			tracing::debug!(dir = %dir.display(), "directory already visited");
			return Ok(());
		}

		let entries = std::fs::read_dir(dir).map_err(|source| QuoteError::io(dir, source))?;

		for entry in entries {
			if self.cancel.is_cancelled() {
				return Ok(());
			}

			let entry = entry.map_err(|source| QuoteError::io(dir, source))?;
			let path = entry.path();
			let is_dir = path.is_dir();

			if is_dir {
				let skipped = path
					.file_name()
					.and_then(|name| name.to_str())
					.is_some_and(|name| self.config.is_skipped_dir(name));
				if skipped {
					continue;
				}
			}

			if self.gitignore.matched(&path, is_dir).is_ignore()
				|| self.exclude.matched(&path, is_dir).is_ignore()
			{
				continue;
			}

			if is_dir {
				self.walk(&path)?;
			} else if self.config.is_document(&path) {
				self.files.push(path);
			}
		}

		Ok(())
	}
}
