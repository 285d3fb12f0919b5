use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;

use regex::Regex;

use crate::ExtractError;
use crate::Format;
use crate::Marker;
use crate::MarkerKind;
use crate::MarkerTarget;
use crate::QuoteError;
use crate::QuoteResult;
use crate::extract::PathExtractor;
use crate::extract::PathRequest;
use crate::extract::SymbolExtractor;
use crate::extract::SymbolRequest;

/// The text substituted into one marker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedContent {
	pub text: String,
	/// Code and expected output, present only for example markers whose
	/// source could be split.
	pub parts: Option<(String, String)>,
}

impl ResolvedContent {
	pub fn new(text: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			parts: None,
		}
	}
}

/// Resolves the markers of one document. Relative paths are taken from the
/// directory holding the document.
pub struct Resolver<'a> {
	base_dir: &'a Path,
	symbols: &'a dyn SymbolExtractor,
	paths: &'a dyn PathExtractor,
}

impl<'a> Resolver<'a> {
	pub fn new(base_dir: &'a Path, symbols: &'a dyn SymbolExtractor, paths: &'a dyn PathExtractor) -> Self {
		Self {
			base_dir,
			symbols,
			paths,
		}
	}

	/// Resolve every marker, returning contents in marker order.
	///
	/// Go markers are resolved in one batch, then JSON markers in one batch,
	/// then pull markers with one pass over each distinct source file.
	pub fn resolve(&self, markers: &[Marker]) -> QuoteResult<Vec<ResolvedContent>> {
		let mut resolved = vec![ResolvedContent::default(); markers.len()];

		self.resolve_symbols(markers, &mut resolved)?;
		self.resolve_paths(markers, &mut resolved)?;
		self.resolve_pulls(markers, &mut resolved)?;

		Ok(resolved)
	}

	fn resolve_symbols(&self, markers: &[Marker], resolved: &mut [ResolvedContent]) -> QuoteResult<()> {
		let (indices, requests): (Vec<usize>, Vec<SymbolRequest>) = markers
			.iter()
			.enumerate()
			.filter_map(|(index, marker)| {
				let MarkerTarget::Go { location, symbol } = &marker.target else {
					return None;
				};
				let request = SymbolRequest {
					location: self.go_location(location),
					symbol: symbol.clone(),
					flags: marker.flags,
				};
				Some((index, request))
			})
			.unzip();

		if requests.is_empty() {
			return Ok(());
		}

		let results = self.symbols.extract_all(&requests);

		for ((index, request), result) in indices.into_iter().zip(&requests).zip(results) {
			let extracted = result.map_err(|source| extract_error(MarkerKind::Go, &request.location, source))?;
			let parts = if markers[index].format == Format::Example {
				self.symbols.split_example(&extracted.text)
			} else {
				None
			};

			if markers[index].format == Format::Example && parts.is_none() {
				tracing::debug!(symbol = %request.symbol, "example has no output section");
			}

			resolved[index] = ResolvedContent {
				text: extracted.text,
				parts,
			};
		}

		Ok(())
	}

	fn resolve_paths(&self, markers: &[Marker], resolved: &mut [ResolvedContent]) -> QuoteResult<()> {
		let (indices, requests): (Vec<usize>, Vec<PathRequest>) = markers
			.iter()
			.enumerate()
			.filter_map(|(index, marker)| {
				let MarkerTarget::Json { location, path } = &marker.target else {
					return None;
				};
				let request = PathRequest {
					location: self.relative(location),
					path: path.clone(),
					flags: marker.flags,
				};
				Some((index, request))
			})
			.unzip();

		if requests.is_empty() {
			return Ok(());
		}

		let results = self.paths.extract_all(&requests);

		for ((index, request), result) in indices.into_iter().zip(&requests).zip(results) {
			let text = result.map_err(|source| {
				extract_error(MarkerKind::Json, &request.location.display().to_string(), source)
			})?;
			resolved[index] = ResolvedContent::new(text);
		}

		Ok(())
	}

	fn resolve_pulls(&self, markers: &[Marker], resolved: &mut [ResolvedContent]) -> QuoteResult<()> {
		let mut done = vec![false; markers.len()];

		for (index, marker) in markers.iter().enumerate() {
			let MarkerTarget::Pull { src, .. } = &marker.target else {
				continue;
			};
			if done[index] {
				continue;
			}

			let mut indices = Vec::new();
			let mut patterns = Vec::new();

			for (other, candidate) in markers.iter().enumerate().skip(index) {
				match &candidate.target {
					MarkerTarget::Pull {
						src: other_src,
						start,
						end,
						end_count,
					} if other_src == src => {
						indices.push(other);
						patterns.push(PullPattern {
							start,
							end,
							end_count: *end_count,
						});
					}
					_ => {}
				}
			}

			let path = self.relative(src);
			tracing::debug!(file = %path.display(), markers = indices.len(), "matching pull quotes");

			let texts = match_pull_quotes(&path, &patterns)?;
			for (other, text) in indices.into_iter().zip(texts) {
				done[other] = true;
				resolved[other] = ResolvedContent::new(text);
			}
		}

		Ok(())
	}

	fn relative(&self, path: &str) -> PathBuf {
		self.base_dir.join(path)
	}

	/// Go locations that exist relative to the document are resolved against
	/// it. Anything else is handed to the extractor as written.
	fn go_location(&self, location: &str) -> String {
		let location = if location.is_empty() { "." } else { location };
		let candidate = self.relative(location);

		if candidate.exists() {
			candidate.display().to_string()
		} else {
			location.to_string()
		}
	}
}

fn extract_error(kind: MarkerKind, location: &str, source: ExtractError) -> QuoteError {
	QuoteError::Extract {
		kind,
		location: location.to_string(),
		source,
	}
}

/// The line patterns of one pull marker.
#[derive(Debug, Clone, Copy)]
pub struct PullPattern<'r> {
	pub start: &'r Regex,
	pub end: &'r Regex,
	pub end_count: usize,
}

/// Progress of one pattern during the pass over a file.
struct Matcher<'r> {
	pattern: PullPattern<'r>,
	buffer: Option<String>,
	result: Option<String>,
	ends_remaining: usize,
}

/// Capture the line range of every pattern with a single pass over `path`.
///
/// A range starts at the first line matching `start` and ends at the line
/// where `end` has matched `end_count` times, both inclusive. Patterns are
/// matched against lines without their terminator. Trailing line terminators
/// are trimmed from each capture.
pub fn match_pull_quotes(path: &Path, patterns: &[PullPattern<'_>]) -> QuoteResult<Vec<String>> {
	let file = File::open(path).map_err(|source| QuoteError::io(path, source))?;
	let mut reader = BufReader::new(file);

	let mut matchers: Vec<Matcher<'_>> = patterns
		.iter()
		.map(|pattern| {
			Matcher {
				pattern: *pattern,
				buffer: None,
				result: None,
				ends_remaining: pattern.end_count.max(1),
			}
		})
		.collect();
	let mut pending = matchers.len();
	let mut line = String::new();

	while pending > 0 {
		line.clear();
		let read = reader
			.read_line(&mut line)
			.map_err(|source| QuoteError::io(path, source))?;
		if read == 0 {
			break;
		}

		let content = line.trim_end_matches(['\r', '\n']);

		for matcher in &mut matchers {
			if matcher.result.is_some() {
				continue;
			}

			if matcher.buffer.is_none() {
				if !matcher.pattern.start.is_match(content) {
					continue;
				}
				matcher.buffer = Some(String::new());
			}

			if let Some(buffer) = matcher.buffer.as_mut() {
				buffer.push_str(&line);
			}

			if matcher.pattern.end.is_match(content) {
				matcher.ends_remaining -= 1;
				if matcher.ends_remaining == 0 {
					let buffer = matcher.buffer.take().unwrap_or_default();
					matcher.result = Some(buffer.trim_end_matches(['\r', '\n']).to_string());
					pending -= 1;
				}
			}
		}
	}

	matchers
		.into_iter()
		.map(|matcher| {
			match (matcher.result, matcher.buffer) {
				(Some(result), _) => Ok(result),
				(None, Some(_)) => {
					Err(QuoteError::NeverMatchedEnd {
						path: path.to_path_buf(),
						pattern: matcher.pattern.end.as_str().to_string(),
					})
				}
				(None, None) => {
					Err(QuoteError::NeverMatchedStart {
						path: path.to_path_buf(),
						pattern: matcher.pattern.start.as_str().to_string(),
					})
				}
			}
		})
		.collect()
}
