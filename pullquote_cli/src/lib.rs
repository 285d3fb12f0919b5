use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use pullquote_core::Discovery;

/// The path argument that reads document paths from stdin.
pub const STDIN_PATH: &str = "-";

#[derive(Debug, Parser)]
#[command(
	author,
	version,
	about = "Keep snippets quoted in markdown documents in sync with their source.",
	long_about = "pullquote rewrites the content between marker comments in markdown \
	              documents with text extracted from elsewhere:\n\n  <!-- pullquote \
	              src=main.go start=\"^func main\" end=\"^}\" -->  a line range of a file\n  \
	              <!-- goquote ./pkg#Server.Run -->  a Go declaration\n  <!-- jsonquote \
	              data.json#/items/0 -->  a value from a JSON file\n\nEach marker is closed by \
	              `<!-- /pullquote -->`, `<!-- /goquote -->` or `<!-- /jsonquote -->`. Documents \
	              are only written once every document has been processed successfully."
)]
#[allow(clippy::struct_excessive_bools)]
pub struct QuoteCli {
	/// Report documents that are out of date without writing them. Exits with
	/// status 2 when any document would change.
	#[arg(long, default_value_t = false)]
	pub check: bool,

	/// Print a unified diff for every document that changes.
	#[arg(long, default_value_t = false)]
	pub diff: bool,

	/// Discover documents by walking the working directory.
	#[arg(long, default_value_t = false)]
	pub walk: bool,

	/// Enable debug logging. `PULLQUOTE_LOG` takes precedence when set.
	#[arg(long, short, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, default_value_t = false)]
	pub no_color: bool,

	/// Documents to process. `-` reads newline separated paths from stdin.
	#[arg(value_name = "PATH")]
	pub paths: Vec<PathBuf>,
}

impl QuoteCli {
	pub fn reads_stdin(&self) -> bool {
		self.paths.iter().any(|path| path.as_os_str() == STDIN_PATH)
	}

	/// Explicit document paths, without the stdin marker.
	pub fn document_paths(&self) -> impl Iterator<Item = &PathBuf> {
		self.paths
			.iter()
			.filter(|path| path.as_os_str() != STDIN_PATH)
	}

	/// Describe where the documents of this invocation come from, relative
	/// paths being resolved against `root`.
	pub fn discovery(&self, root: &Path) -> Discovery {
		let mut discovery = Discovery::new(root).paths(self.document_paths().cloned());

		if self.reads_stdin() {
			discovery = discovery.list(BufReader::new(std::io::stdin()));
		}

		if self.walk {
			discovery = discovery.walk(root);
		}

		discovery
	}
}
