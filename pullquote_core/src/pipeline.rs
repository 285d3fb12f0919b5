use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::task::JoinSet;

use crate::Discovery;
use crate::GoSourceExtractor;
use crate::JsonPathExtractor;
use crate::QuoteConfig;
use crate::QuoteError;
use crate::QuoteResult;
use crate::Resolver;
use crate::extract::PathExtractor;
use crate::extract::SymbolExtractor;
use crate::read_markers;
use crate::rewrite;

/// How many discovered paths may wait for a worker before discovery blocks.
pub const DISCOVERY_BUFFER: usize = 64;

/// Cooperative cancellation shared by discovery, the workers and the caller.
#[derive(Debug, Clone)]
pub struct CancelSignal {
	sender: Arc<watch::Sender<bool>>,
}

impl Default for CancelSignal {
	fn default() -> Self {
		Self::new()
	}
}

impl CancelSignal {
	pub fn new() -> Self {
		let (sender, _) = watch::channel(false);
		Self {
			sender: Arc::new(sender),
		}
	}

	pub fn cancel(&self) {
		self.sender.send_replace(true);
	}

	pub fn is_cancelled(&self) -> bool {
		*self.sender.borrow()
	}

	/// Completes once [`cancel`](Self::cancel) has been called.
	pub async fn cancelled(&self) {
		let mut receiver = self.sender.subscribe();
		let _ = receiver.wait_for(|cancelled| *cancelled).await;
	}
}

pub struct RunOptions {
	/// Report what would change without writing anything.
	pub check: bool,
	pub discovery: Discovery,
	pub config: QuoteConfig,
}

/// A document whose content changed during the run.
#[derive(Debug)]
pub struct DocumentChange {
	pub path: PathBuf,
	pub original: String,
	pub updated: String,
	pub(crate) staged: Option<NamedTempFile>,
}

#[derive(Debug, Default)]
pub struct RunReport {
	/// Number of documents processed.
	pub documents: usize,
	/// Changed documents sorted by path.
	pub changes: Vec<DocumentChange>,
}

impl RunReport {
	pub fn has_changes(&self) -> bool {
		!self.changes.is_empty()
	}
}

/// Runs documents through marker reading, resolution and rewriting.
#[derive(Clone)]
pub struct Pipeline {
	symbols: Arc<dyn SymbolExtractor>,
	paths: Arc<dyn PathExtractor>,
}

impl Default for Pipeline {
	fn default() -> Self {
		Self::new(Arc::new(GoSourceExtractor), Arc::new(JsonPathExtractor))
	}
}

impl Pipeline {
	pub fn new(symbols: Arc<dyn SymbolExtractor>, paths: Arc<dyn PathExtractor>) -> Self {
		Self { symbols, paths }
	}

	/// Rewrite a single document in memory.
	///
	/// Returns the original and updated content when the document changed and
	/// `None` when it has no markers or is already up to date. A document that
	/// is not valid UTF-8 is only an error when it contains markers.
	pub fn process_document(&self, path: &Path) -> QuoteResult<Option<(String, String)>> {
		let bytes = std::fs::read(path).map_err(|source| QuoteError::io(path, source))?;
		let original = match String::from_utf8(bytes) {
			Ok(original) => original,
			Err(error) => {
				let lossy = String::from_utf8_lossy(error.as_bytes());
				if read_markers(&lossy)?.is_empty() {
					tracing::debug!(path = %path.display(), "skipping non UTF-8 document without markers");
					return Ok(None);
				}
				return Err(QuoteError::InvalidUtf8 {
					path: path.to_path_buf(),
				});
			}
		};
		let markers = read_markers(&original)?;

		if markers.is_empty() {
			tracing::trace!(path = %path.display(), "no markers");
			return Ok(None);
		}

		let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
		let resolved = Resolver::new(base_dir, self.symbols.as_ref(), self.paths.as_ref()).resolve(&markers)?;
		let updated = rewrite(&original, &markers, &resolved);

		tracing::debug!(
			path = %path.display(),
			markers = markers.len(),
			changed = updated != original,
			"processed document"
		);

		if updated == original {
			Ok(None)
		} else {
			Ok(Some((original, updated)))
		}
	}

	/// Process every discovered document concurrently.
	///
	/// Nothing is written unless every document succeeds. In check mode nothing
	/// is written at all. When documents fail, the error names the one with the
	/// smallest path and counts the rest.
	pub async fn run(&self, options: RunOptions, cancel: &CancelSignal) -> QuoteResult<RunReport> {
		let RunOptions {
			check,
			discovery,
			config,
		} = options;
		let (sender, mut receiver) = mpsc::channel(DISCOVERY_BUFFER);
		let producer_cancel = cancel.clone();
		let producer = tokio::task::spawn_blocking(move || discovery.produce(&config, &sender, &producer_cancel));
		let mut workers = JoinSet::new();

		loop {
			tokio::select! {
				biased;
				() = cancel.cancelled() => break,
				path = receiver.recv() => {
					let Some(path) = path else {
						break;
					};
					let pipeline = self.clone();
					let worker_cancel = cancel.clone();
					workers.spawn_blocking(move || {
						let result = pipeline.stage(&path, check, &worker_cancel);
						(path, result)
					});
				}
			}
		}

		if cancel.is_cancelled() {
			workers.abort_all();
			stop_discovery(receiver, producer).await;
			while workers.join_next().await.is_some() {}
			tracing::debug!("run cancelled");
			return Err(QuoteError::Cancelled);
		}

		let mut documents = 0;
		let mut changes = Vec::new();
		let mut failures = Vec::new();

		while let Some(joined) = workers.join_next().await {
			let (path, result) = joined.map_err(|error| QuoteError::Worker(error.to_string()))?;
			documents += 1;
			match result {
				Ok(Some(change)) => changes.push(change),
				Ok(None) => {}
				Err(error) => failures.push((path, error)),
			}
		}

		match producer.await {
			Ok(result) => result?,
			Err(error) => return Err(QuoteError::Worker(error.to_string())),
		}

		if let Some(error) = aggregate(failures) {
			return Err(error);
		}

		changes.sort_by(|a, b| a.path.cmp(&b.path));

		if !check {
			persist_changes(&mut changes)?;
		}

		tracing::info!(documents, changed = changes.len(), check, "run finished");

		Ok(RunReport { documents, changes })
	}

	/// Process `path` and, outside check mode, write the new content to a
	/// temporary file beside it.
	fn stage(&self, path: &Path, check: bool, cancel: &CancelSignal) -> QuoteResult<Option<DocumentChange>> {
		if cancel.is_cancelled() {
			return Err(QuoteError::Cancelled);
		}

		let Some((original, updated)) = self.process_document(path)? else {
			return Ok(None);
		};

		let staged = if check {
			None
		} else {
			Some(stage_file(path, &updated)?)
		};

		Ok(Some(DocumentChange {
			path: path.to_path_buf(),
			original,
			updated,
			staged,
		}))
	}
}

pub(crate) fn stage_file(path: &Path, content: &str) -> QuoteResult<NamedTempFile> {
	use std::io::Write;

	let parent = path.parent().unwrap_or_else(|| Path::new("."));
	let io_error = |source: std::io::Error| QuoteError::io(path, source);
	let mut file = NamedTempFile::new_in(parent).map_err(io_error)?;

	file.write_all(content.as_bytes()).map_err(io_error)?;
	file.flush().map_err(io_error)?;

	let permissions = std::fs::metadata(path).map_err(io_error)?.permissions();
	std::fs::set_permissions(file.path(), permissions).map_err(io_error)?;

	Ok(file)
}

/// Release a discovery producer after cancellation.
///
/// The producer may be blocked on a full channel, so the channel is closed
/// and drained before the producer is awaited.
pub(crate) async fn stop_discovery(
	mut receiver: mpsc::Receiver<PathBuf>,
	producer: JoinHandle<QuoteResult<()>>,
) {
	receiver.close();
	while receiver.recv().await.is_some() {}
	if let Err(error) = producer.await {
		tracing::warn!(%error, "discovery task failed");
	}
}

/// Rename every staged document into place, in order.
///
/// A rename cannot be undone, so when one fails the documents already written
/// are logged before the error is returned.
pub(crate) fn persist_changes(changes: &mut [DocumentChange]) -> QuoteResult<()> {
	let mut written: Vec<PathBuf> = Vec::new();

	for change in changes.iter_mut() {
		let Some(staged) = change.staged.take() else {
			continue;
		};

		if let Err(error) = staged.persist(&change.path) {
			tracing::error!(
				path = %change.path.display(),
				written = ?written,
				"failed to write document after {} already written",
				written.len()
			);
			return Err(QuoteError::io(&change.path, error.error));
		}

		tracing::debug!(path = %change.path.display(), "updated document");
		written.push(change.path.clone());
	}

	Ok(())
}

fn aggregate(mut failures: Vec<(PathBuf, QuoteError)>) -> Option<QuoteError> {
	for (path, error) in &failures {
		tracing::warn!(path = %path.display(), %error, "document failed");
	}

	failures.sort_by(|a, b| a.0.cmp(&b.0));
	let others = failures.len().saturating_sub(1);
	let (path, source) = failures.into_iter().next()?;

	Some(QuoteError::DocumentFailed {
		path,
		others,
		source: Box::new(source),
	})
}
