use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::MarkerKind;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum QuoteError {
	#[error("{}: {source}", .path.display())]
	#[diagnostic(code(pullquote::io_error))]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("{}: document contains markers but is not valid UTF-8", .path.display())]
	#[diagnostic(
		code(pullquote::invalid_utf8),
		help("documents with markers must be UTF-8 encoded")
	)]
	InvalidUtf8 { path: PathBuf },

	#[error("parsing {kind} at offset {offset}: {source}")]
	#[diagnostic(
		code(pullquote::syntax),
		help("quote values containing spaces, `=` or quotes and escape embedded quotes with `\\`")
	)]
	Parse {
		kind: MarkerKind,
		offset: usize,
		#[source]
		source: TokenError,
	},

	#[error("validating {kind} at offset {offset}: {source}")]
	#[diagnostic(code(pullquote::invalid_marker))]
	Validate {
		kind: MarkerKind,
		offset: usize,
		#[source]
		source: MarkerError,
	},

	#[error("unexpected {tag} at offset {offset}: {comment:?}")]
	#[diagnostic(
		code(pullquote::unexpected_close),
		help("every closing tag must follow an opening tag of the same kind")
	)]
	UnexpectedClose {
		tag: String,
		offset: usize,
		comment: String,
	},

	#[error("{}: never matched start: {pattern:?}", .path.display())]
	#[diagnostic(code(pullquote::never_matched_start))]
	NeverMatchedStart { path: PathBuf, pattern: String },

	#[error("{}: never matched end: {pattern:?}", .path.display())]
	#[diagnostic(
		code(pullquote::never_matched_end),
		help("check the `end` pattern and `endcount` against the source file")
	)]
	NeverMatchedEnd { path: PathBuf, pattern: String },

	#[error("error within {location}: {source}")]
	#[diagnostic(code(pullquote::extract))]
	Extract {
		kind: MarkerKind,
		location: String,
		#[source]
		source: ExtractError,
	},

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(pullquote::config_parse),
		help("check that pullquote.toml is valid TOML with an optional [walk] section")
	)]
	ConfigParse(String),

	#[error("{} failed{}: {source}", .path.display(), others_suffix(.others))]
	#[diagnostic(code(pullquote::document_failed))]
	DocumentFailed {
		path: PathBuf,
		others: usize,
		#[source]
		source: Box<QuoteError>,
	},

	#[error("worker task failed: {0}")]
	#[diagnostic(code(pullquote::worker))]
	Worker(String),

	#[error("operation cancelled")]
	#[diagnostic(code(pullquote::cancelled))]
	Cancelled,
}

impl QuoteError {
	pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source,
		}
	}
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn others_suffix(others: &usize) -> String {
	if *others == 0 {
		String::new()
	} else {
		format!(" (along with {others} others)")
	}
}

/// Failure while splitting the attribute text of a marker into tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TokenError {
	/// Input ended inside an open quote or right after a backslash.
	#[error("unterminated token")]
	Unterminated { offset: usize },
}

/// A marker whose attributes are well formed tokens but do not describe a
/// valid quote.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum MarkerError {
	#[error("fmt must be example, codefence, blockquote, or none")]
	InvalidFormat,
	#[error("\"{0}\" cannot be unset")]
	Unset(&'static str),
	#[error("pullquote: invalid keys: {}", .0.join(", "))]
	InvalidKeys(Vec<String>),
	#[error("{kind}: unknown keys: {}", .keys.join(", "))]
	UnknownKeys { kind: MarkerKind, keys: Vec<String> },
	#[error("key {0} already seen")]
	AlreadySeen(String),
	#[error("\"{0}\" requires value")]
	RequiresValue(String),
	#[error("\"{0}\" does not take a value")]
	NoValue(String),
	#[error("invalid {key} {pattern:?}: {source}")]
	InvalidPattern {
		key: &'static str,
		pattern: String,
		#[source]
		source: regex::Error,
	},
	#[error("invalid endcount {0:?}")]
	InvalidEndCount(String),
	#[error("\"{key}\" must look like location#name, got {value:?}")]
	InvalidObjectPath { key: &'static str, value: String },
}

/// Errors reported by the symbol and path extractors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractError {
	#[error("couldn't find {0:?}")]
	NotFound(String),
	#[error("unable to parse {path}: {reason}")]
	ParseFailure { path: String, reason: String },
	#[error("unable to read source: {0}")]
	Read(#[source] std::io::Error),
	#[error("malformed json: {0}")]
	MalformedJson(String),
	#[error("bad path segment {segment:?}: {reason}")]
	BadPathSegment { segment: String, reason: String },
	#[error("{}: {source}", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
}

pub type QuoteResult<T> = Result<T, QuoteError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
