//! `pullquote_core` keeps snippets embedded in markdown documents in sync with
//! the files they were taken from.
//!
//! A document marks the region to fill with an HTML comment pair:
//!
//! ```markdown
//! <!-- pullquote src=main.go start="^func main" end="^}" fmt=codefence -->
//! <!-- /pullquote -->
//! ```
//!
//! Three kinds of marker are recognised:
//!
//! - `pullquote` copies a line range from a file, from the first line matching
//!   `start` to the line where `end` has matched `endcount` times.
//! - `goquote` copies a Go declaration, for example `goquote ./pkg#Server.Run`.
//! - `jsonquote` copies a value from a JSON file, for example
//!   `jsonquote data.json#/items/0`.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Document
//!   → CommentScanner (finds HTML comments outside code fences)
//!   → TokenScanner (splits marker attributes into words and `=`)
//!   → Marker::parse (validates attributes into a typed Marker)
//!   → Resolver (pull quotes, SymbolExtractor, PathExtractor)
//!   → rewrite (replaces the content between each marker pair)
//! ```
//!
//! [`Pipeline::run`] drives many documents concurrently and only writes
//! changes once every document has succeeded.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pullquote_core::CancelSignal;
//! use pullquote_core::Discovery;
//! use pullquote_core::Pipeline;
//! use pullquote_core::QuoteConfig;
//! use pullquote_core::RunOptions;
//!
//! # async fn run() -> pullquote_core::QuoteResult<()> {
//! let options = RunOptions {
//! 	check: true,
//! 	discovery: Discovery::new(".").path("README.md"),
//! 	config: QuoteConfig::default(),
//! };
//! let report = Pipeline::default().run(options, &CancelSignal::new()).await?;
//!
//! for change in &report.changes {
//! 	eprintln!("{} is out of date", change.path.display());
//! }
//! # Ok(())
//! # }
//! ```

pub use config::*;
pub use discovery::*;
pub use error::*;
pub use go_source::*;
pub use json_path::*;
pub use marker::*;
pub use pipeline::*;
pub use reader::*;
pub use resolve::*;
pub use rewrite::*;

pub mod config;
mod discovery;
#[allow(unused_assignments)]
mod error;
pub mod extract;
mod go_source;
mod json_path;
mod marker;
mod pipeline;
mod reader;
mod resolve;
mod rewrite;
pub mod scanner;
pub mod tokens;
