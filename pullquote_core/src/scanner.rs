use std::borrow::Cow;
use std::ops::Range;

use crate::TokenError;

const COMMENT_OPEN: &[u8] = b"<!--";
const COMMENT_CLOSE: &[u8] = b"-->";

/// What a [`Lexeme`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexemeKind {
	/// A complete `<!-- ... -->` comment, delimiters included.
	Comment,
	/// A bare or quoted attribute word with quotes and escapes resolved.
	Word,
	/// A literal `=` separating a key from its value.
	Equals,
}

/// One item produced by a [`Scanner`] together with its byte span in the
/// scanned input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme<'a> {
	pub kind: LexemeKind,
	pub text: Cow<'a, str>,
	pub span: Range<usize>,
}

impl Lexeme<'_> {
	pub fn is_equals(&self) -> bool {
		self.kind == LexemeKind::Equals
	}
}

/// Incremental scanner shared by the comment finder and the attribute
/// tokenizer. Each call yields the next lexeme or `None` once the input is
/// exhausted. A scanner is not restartable.
pub trait Scanner<'a> {
	fn scan(&mut self) -> Result<Option<Lexeme<'a>>, TokenError>;
}

/// Drain a scanner into a vector, stopping at the first error.
pub fn scan_all<'a>(scanner: &mut impl Scanner<'a>) -> Result<Vec<Lexeme<'a>>, TokenError> {
	let mut lexemes = Vec::new();

	while let Some(lexeme) = scanner.scan()? {
		lexemes.push(lexeme);
	}

	Ok(lexemes)
}

/// Finds `<!-- ... -->` comments in a document, skipping any that sit inside a
/// fenced code block.
///
/// A fence opens on a line that starts (after indentation) with three or more
/// backticks or tildes. It closes on a later line made only of the same
/// character repeated at least as many times. Everything after a fence that
/// never closes is skipped.
pub struct CommentScanner<'a> {
	document: &'a str,
	position: usize,
	/// The next fence at or after `position`. `Some(None)` caches that there
	/// are no more fences.
	next_fence: Option<Option<Fence>>,
}

#[derive(Debug, Clone, Copy)]
struct Fence {
	start: usize,
	/// Offset just past the closing fence line, `None` when unclosed.
	end: Option<usize>,
}

impl<'a> CommentScanner<'a> {
	pub fn new(document: &'a str) -> Self {
		Self {
			document,
			position: 0,
			next_fence: None,
		}
	}

	fn fence(&mut self) -> Option<Fence> {
		if let Some(fence) = self.next_fence {
			return fence;
		}

		let fence = find_fence(self.document, self.position);
		self.next_fence = Some(fence);
		fence
	}
}

impl<'a> Iterator for CommentScanner<'a> {
	type Item = Lexeme<'a>;

	fn next(&mut self) -> Option<Self::Item> {
		let len = self.document.len();

		while self.position < len {
			let fence = self.fence();
			let limit = fence.map_or(len, |fence| fence.start);

			if let Some(span) = find_comment(&self.document.as_bytes()[..limit], self.position) {
				self.position = span.end;

				return Some(Lexeme {
					kind: LexemeKind::Comment,
					text: Cow::Borrowed(&self.document[span.clone()]),
					span,
				});
			}

			match fence {
				Some(Fence {
					end: Some(end), ..
				}) => {
					self.position = end;
					self.next_fence = None;
				}
				_ => self.position = len,
			}
		}

		None
	}
}

/// Finding comments cannot fail.
impl<'a> Scanner<'a> for CommentScanner<'a> {
	fn scan(&mut self) -> Result<Option<Lexeme<'a>>, TokenError> {
		Ok(self.next())
	}
}

/// Byte offset of the first occurrence of `needle` in `haystack`.
pub fn memstr(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	haystack
		.windows(needle.len())
		.position(|window| window == needle)
}

fn memrstr(haystack: &[u8], needle: &[u8]) -> Option<usize> {
	haystack
		.windows(needle.len())
		.rposition(|window| window == needle)
}

/// Locate the first complete comment in `bytes[from..]`. When several openers
/// precede the first `-->`, the last one wins.
fn find_comment(bytes: &[u8], from: usize) -> Option<Range<usize>> {
	let open = from + memstr(&bytes[from..], COMMENT_OPEN)?;
	let body = open + COMMENT_OPEN.len();
	let close = body + memstr(&bytes[body..], COMMENT_CLOSE)?;
	let start = open + memrstr(&bytes[open..close], COMMENT_OPEN).unwrap_or(0);

	Some(start..close + COMMENT_CLOSE.len())
}

/// Return the `(char, run length)` of a fence opening `line`, if any.
fn fence_marker(line: &str) -> Option<(char, usize)> {
	let stripped = line.trim_start();
	let backticks = stripped.chars().take_while(|&c| c == '`').count();
	let tildes = stripped.chars().take_while(|&c| c == '~').count();

	if backticks >= 3 {
		Some(('`', backticks))
	} else if tildes >= 3 {
		Some(('~', tildes))
	} else {
		None
	}
}

fn find_fence(document: &str, from: usize) -> Option<Fence> {
	// fences only open at the start of a line
	let mut offset = if from == 0 || document.as_bytes().get(from - 1) == Some(&b'\n') {
		from
	} else {
		from + document.get(from..)?.find('\n')? + 1
	};

	let mut open: Option<(usize, char, usize)> = None;

	while offset < document.len() {
		let line_end = document[offset..]
			.find('\n')
			.map_or(document.len(), |index| offset + index);
		let line = &document[offset..line_end];
		let next = line_end + 1;

		match open {
			None => {
				if let Some((fence_char, fence_len)) = fence_marker(line) {
					open = Some((offset, fence_char, fence_len));
				}
			}
			Some((start, fence_char, fence_len)) => {
				let stripped = line.trim_start();
				let closing_len = stripped.chars().take_while(|&c| c == fence_char).count();

				if closing_len >= fence_len && stripped[closing_len..].trim().is_empty() {
					return Some(Fence {
						start,
						end: Some(next.min(document.len())),
					});
				}
			}
		}

		offset = next;
	}

	open.map(|(start, ..)| {
		Fence {
			start,
			end: None,
		}
	})
}
