use std::fs;
use std::io;
use std::ops::Range;
use std::path::Path;
use std::path::PathBuf;

use logos::Logos;

use crate::ExtractError;
use crate::MarkerFlags;
use crate::extract::Extracted;
use crate::extract::SymbolExtractor;

/// Go source tokens, just precise enough to balance brackets and find
/// statement boundaries. Whitespace other than newlines is skipped because Go
/// ends statements at newlines.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\f]+")]
enum GoToken {
	#[regex(r"//[^\n]*", allow_greedy = true)]
	LineComment,
	#[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
	BlockComment,
	#[regex(r#""([^"\\\n]|\\[^\n])*""#)]
	Str,
	#[regex(r"`[^`]*`")]
	RawStr,
	#[regex(r"'([^'\\\n]|\\[^\n])*'")]
	Rune,
	#[regex(r"[a-zA-Z_\x{80}-\x{10FFFF}][a-zA-Z0-9_\x{80}-\x{10FFFF}]*")]
	Ident,
	#[regex(r"[0-9][0-9a-zA-Z_.]*")]
	Number,
	#[token("\n")]
	Newline,
	#[token("{")]
	LBrace,
	#[token("}")]
	RBrace,
	#[token("(")]
	LParen,
	#[token(")")]
	RParen,
	#[token("[")]
	LBracket,
	#[token("]")]
	RBracket,
	#[token(",")]
	Comma,
	#[token(";")]
	Semicolon,
	#[token(".")]
	Dot,
	#[token(":=")]
	Define,
	#[regex(r"[-+*/%&|^<>!=:~]+")]
	Operator,
}

impl GoToken {
	fn is_comment(self) -> bool {
		matches!(self, Self::LineComment | Self::BlockComment)
	}

	fn opens(self) -> bool {
		matches!(self, Self::LBrace | Self::LParen | Self::LBracket)
	}

	fn closes(self) -> bool {
		matches!(self, Self::RBrace | Self::RParen | Self::RBracket)
	}
}

/// Finds top level and nested declarations in Go source files without
/// type checking them.
///
/// Functions and methods (`Type.Method` restricts the match to a receiver
/// type), `type`, `var` and `const` declarations and `name :=` statements are
/// recognised. The first match in source order wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoSourceExtractor;

impl SymbolExtractor for GoSourceExtractor {
	fn extract(&self, location: &str, symbol: &str, flags: MarkerFlags) -> Result<Extracted, ExtractError> {
		for path in source_files(location)? {
			let source = fs::read_to_string(&path).map_err(|source| {
				if source.kind() == io::ErrorKind::InvalidData {
					ExtractError::ParseFailure {
						path: path.display().to_string(),
						reason: source.to_string(),
					}
				} else {
					ExtractError::Io {
						path: path.clone(),
						source,
					}
				}
			})?;

			let Some(found) = GoFile::new(&source).find(symbol, flags) else {
				continue;
			};

			tracing::debug!(file = %path.display(), symbol, "found declaration");

			let text = &source[found.range];
			let text = if flags.contains(MarkerFlags::NO_REFORMAT) {
				text.to_string()
			} else {
				realign(text)
			};

			return Ok(Extracted {
				text,
				doc: found.doc.map(|doc| source[doc].to_string()),
			});
		}

		Err(ExtractError::NotFound(symbol.to_string()))
	}

	fn split_example(&self, text: &str) -> Option<(String, String)> {
		split_example(text)
	}
}

/// The `.go` files behind a location: the file itself, or every Go file of a
/// directory with regular files sorted before `_test.go` files.
fn source_files(location: &str) -> Result<Vec<PathBuf>, ExtractError> {
	let path = Path::new(location);
	let Ok(metadata) = fs::metadata(path) else {
		return Err(ExtractError::NotFound(location.to_string()));
	};

	if metadata.is_file() {
		return Ok(vec![path.to_path_buf()]);
	}

	let entries = fs::read_dir(path).map_err(|source| {
		ExtractError::Io {
			path: path.to_path_buf(),
			source,
		}
	})?;

	let mut sources = Vec::new();
	let mut tests = Vec::new();

	for entry in entries {
		let entry = entry.map_err(|source| {
			ExtractError::Io {
				path: path.to_path_buf(),
				source,
			}
		})?;
		let file = entry.path();
		let name = entry.file_name().to_string_lossy().to_string();

		if !name.ends_with(".go") || !file.is_file() {
			continue;
		}

		if name.ends_with("_test.go") {
			tests.push(file);
		} else {
			sources.push(file);
		}
	}

	if sources.is_empty() && tests.is_empty() {
		return Err(ExtractError::ParseFailure {
			path: location.to_string(),
			reason: "no Go files in directory".to_string(),
		});
	}

	sources.sort();
	tests.sort();
	sources.extend(tests);

	Ok(sources)
}

/// Byte ranges of a matched declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Found {
	/// The declaration, starting at its doc comment when it has one.
	range: Range<usize>,
	doc: Option<Range<usize>>,
}

struct Token {
	kind: GoToken,
	span: Range<usize>,
}

struct GoFile<'s> {
	source: &'s str,
	tokens: Vec<Token>,
}

impl<'s> GoFile<'s> {
	fn new(source: &'s str) -> Self {
		let tokens = GoToken::lexer(source)
			.spanned()
			.filter_map(|(kind, span)| kind.ok().map(|kind| Token { kind, span }))
			.collect();

		Self { source, tokens }
	}

	fn kind(&self, index: usize) -> GoToken {
		self.tokens[index].kind
	}

	fn text(&self, index: usize) -> &'s str {
		&self.source[self.tokens[index].span.clone()]
	}

	fn is_ident(&self, index: usize, text: &str) -> bool {
		self.kind(index) == GoToken::Ident && self.text(index) == text
	}

	/// Whether a newline after this token ends the statement, following Go's
	/// semicolon insertion rule.
	fn ends_line(&self, index: usize) -> bool {
		match self.kind(index) {
			GoToken::Ident
			| GoToken::Number
			| GoToken::Str
			| GoToken::RawStr
			| GoToken::Rune
			| GoToken::RParen
			| GoToken::RBracket
			| GoToken::RBrace => true,
			GoToken::Operator => matches!(self.text(index), "++" | "--"),
			_ => false,
		}
	}

	fn next_significant(&self, index: usize) -> Option<usize> {
		(index + 1..self.tokens.len()).find(|&next| {
			let kind = self.kind(next);
			!kind.is_comment() && kind != GoToken::Newline
		})
	}

	fn previous_code(&self, index: usize) -> Option<usize> {
		(0..index).rev().find(|&previous| !self.kind(previous).is_comment())
	}

	fn at_statement_start(&self, index: usize) -> bool {
		self.previous_code(index).is_none_or(|previous| {
			matches!(
				self.kind(previous),
				GoToken::Newline | GoToken::Semicolon | GoToken::LBrace
			)
		})
	}

	/// Index of the bracket closing the one opened at `open`.
	fn matching(&self, open: usize) -> Option<usize> {
		let mut depth = 0usize;

		for index in open..self.tokens.len() {
			let kind = self.kind(index);
			if kind.opens() {
				depth += 1;
			} else if kind.closes() {
				depth -= 1;
				if depth == 0 {
					return Some(index);
				}
			}
		}

		None
	}

	/// Index of the last token of the statement starting at `from`. A header
	/// statement (`if x := f(); ...`) also ends at an opening brace.
	fn statement_end(&self, from: usize, header: bool) -> Option<usize> {
		let mut depth = 0usize;
		let mut last = None;

		for index in from..self.tokens.len() {
			let kind = self.kind(index);

			match kind {
				GoToken::LineComment | GoToken::BlockComment => continue,
				GoToken::Newline => {
					if depth == 0 && last.is_some_and(|last| self.ends_line(last)) {
						break;
					}
					continue;
				}
				GoToken::Semicolon if depth == 0 => break,
				GoToken::LBrace if depth == 0 && header => break,
				_ if kind.opens() => depth += 1,
				_ if kind.closes() => {
					if depth == 0 {
						break;
					}
					depth -= 1;
				}
				_ => {}
			}

			last = Some(index);
		}

		last
	}

	/// Index of the first line of the `//` comment block directly above the
	/// statement starting at `index`.
	fn doc_start(&self, index: usize) -> Option<usize> {
		let mut start = None;
		let mut current = index;

		while current >= 2
			&& self.kind(current - 1) == GoToken::Newline
			&& self.kind(current - 2) == GoToken::LineComment
		{
			let comment = current - 2;
			if comment > 0 && self.kind(comment - 1) != GoToken::Newline {
				break;
			}

			start = Some(comment);
			current = comment;
		}

		start
	}

	/// The source range from the doc comment of `first` through `last`.
	fn found(&self, first: usize, last: usize) -> Found {
		let end = self.tokens[last].span.end;
		let doc = self.doc_start(first).map(|doc| {
			// the doc comment ends on the line above `first`
			self.tokens[doc].span.start..self.tokens[first - 2].span.end
		});
		let start = doc
			.as_ref()
			.map_or(self.tokens[first].span.start, |doc| doc.start);

		Found {
			range: start..end,
			doc,
		}
	}

	fn find(&self, symbol: &str, flags: MarkerFlags) -> Option<Found> {
		let (receiver, name) = match symbol.split_once('.') {
			Some((receiver, name)) => (Some(receiver), name),
			None => (None, symbol),
		};
		let mut depth = 0usize;

		for index in 0..self.tokens.len() {
			let kind = self.kind(index);

			let found = match kind {
				GoToken::Ident if depth == 0 && self.text(index) == "func" && self.at_statement_start(index) => {
					self.function(index, receiver, name)
				}
				GoToken::Ident
					if receiver.is_none()
						&& matches!(self.text(index), "type" | "var" | "const")
						&& self.at_statement_start(index) =>
				{
					self.declaration(index, name, flags)
				}
				GoToken::Define if receiver.is_none() => self.short_variable(index, name),
				_ if kind.opens() => {
					depth += 1;
					None
				}
				_ if kind.closes() => {
					depth = depth.saturating_sub(1);
					None
				}
				_ => None,
			};

			if found.is_some() {
				return found;
			}
		}

		None
	}

	/// `func [(receiver)] Name[...](...) [results] { ... }`
	fn function(&self, keyword: usize, receiver: Option<&str>, name: &str) -> Option<Found> {
		let mut index = self.next_significant(keyword)?;
		let mut receiver_type = None;

		if self.kind(index) == GoToken::LParen {
			let close = self.matching(index)?;
			receiver_type = self.receiver_type(index, close);
			index = self.next_significant(close)?;
		}

		if !self.is_ident(index, name) {
			return None;
		}

		if receiver.is_some_and(|wanted| receiver_type != Some(wanted)) {
			return None;
		}

		let last = self.function_end(index)?;
		Some(self.found(keyword, last))
	}

	/// The receiver's type name, skipping the receiver name, pointers and type
	/// parameters.
	fn receiver_type(&self, open: usize, close: usize) -> Option<&'s str> {
		let mut brackets = 0usize;
		let mut name = None;

		for index in open + 1..close {
			match self.kind(index) {
				GoToken::LBracket => brackets += 1,
				GoToken::RBracket => brackets = brackets.saturating_sub(1),
				GoToken::Ident if brackets == 0 => name = Some(self.text(index)),
				_ => {}
			}
		}

		name
	}

	/// Index of the closing brace of a function body, or of the last token of
	/// a body-less declaration.
	fn function_end(&self, name: usize) -> Option<usize> {
		let mut depth = 0usize;
		let mut last = name;
		let mut index = name + 1;

		while index < self.tokens.len() {
			let kind = self.kind(index);

			match kind {
				GoToken::LineComment | GoToken::BlockComment => {}
				GoToken::Newline if depth == 0 && self.ends_line(last) => return Some(last),
				GoToken::Newline => {}
				GoToken::LBrace if depth == 0 => {
					let close = self.matching(index)?;
					// `struct { ... }` and `interface { ... }` result types
					if self.is_ident(last, "struct") || self.is_ident(last, "interface") {
						last = close;
						index = close + 1;
						continue;
					}
					return Some(close);
				}
				_ if kind.opens() => {
					depth += 1;
					last = index;
				}
				_ if kind.closes() => {
					depth = depth.saturating_sub(1);
					last = index;
				}
				_ => last = index,
			}

			index += 1;
		}

		Some(last)
	}

	/// `type`, `var` and `const` declarations, single or grouped.
	fn declaration(&self, keyword: usize, name: &str, flags: MarkerFlags) -> Option<Found> {
		let is_type = self.text(keyword) == "type";
		let next = self.next_significant(keyword)?;

		if self.kind(next) != GoToken::LParen {
			let last = self.statement_end(next, false)?;
			return self
				.declares(is_type, next, name)
				.then(|| self.found(keyword, last));
		}

		let close = self.matching(next)?;
		let mut index = next + 1;

		while index < close {
			let kind = self.kind(index);
			if kind.is_comment() || matches!(kind, GoToken::Newline | GoToken::Semicolon) {
				index += 1;
				continue;
			}

			let last = self.statement_end(index, false).unwrap_or(index);

			if self.declares(is_type, index, name) {
				return Some(if flags.contains(MarkerFlags::INCLUDE_GROUP) {
					self.found(keyword, close)
				} else {
					self.found(index, last)
				});
			}

			index = last + 1;
		}

		None
	}

	/// Whether the declaration starting at `start` names `name`. Type declarations
	/// name one identifier, var and const declarations a comma separated list.
	fn declares(&self, is_type: bool, start: usize, name: &str) -> bool {
		if is_type {
			return self.is_ident(start, name);
		}

		let mut index = start;
		loop {
			if self.kind(index) != GoToken::Ident {
				return false;
			}
			if self.text(index) == name {
				return true;
			}
			match self.tokens.get(index + 1) {
				Some(token) if token.kind == GoToken::Comma && index + 2 < self.tokens.len() => index += 2,
				_ => return false,
			}
		}
	}

	/// `a, name := ...` statements. Range clauses are not assignments.
	fn short_variable(&self, define: usize, name: &str) -> Option<Found> {
		let mut start = define;
		let mut declared = false;

		while let Some(previous) = start.checked_sub(1) {
			if self.kind(previous) != GoToken::Ident {
				break;
			}
			declared |= self.text(previous) == name;
			start = previous;

			match start.checked_sub(1) {
				Some(comma) if self.kind(comma) == GoToken::Comma => start = comma,
				_ => break,
			}
		}

		if self.kind(start) == GoToken::Comma {
			start += 1;
		}

		if !declared {
			return None;
		}

		let value = self.next_significant(define)?;
		if self.is_ident(value, "range") {
			return None;
		}

		let header = self.previous_code(start).is_some_and(|previous| {
			matches!(self.text(previous), "if" | "for" | "switch" | "select")
		});
		let last = self.statement_end(start, header)?;
		let range = self.tokens[start].span.start..self.tokens[last].span.end;

		Some(Found { range, doc: None })
	}
}

/// Remove the indentation a nested declaration carries from its surroundings.
///
/// The second line is expected to sit one tab deeper than the first, or level
/// with it when the text starts with a comment. Any excess is removed from
/// every line.
pub fn realign(text: &str) -> String {
	let expected = usize::from(!text.starts_with("//"));
	let Some((_, rest)) = text.split_once('\n') else {
		return text.to_string();
	};

	let indent = rest.bytes().take_while(|&byte| byte == b'\t').count();
	let Some(excess) = indent.checked_sub(expected).filter(|&excess| excess > 0) else {
		return text.to_string();
	};

	text.split('\n')
		.map(|line| strip_tabs(line, excess))
		.collect::<Vec<_>>()
		.join("\n")
}

fn strip_tabs(line: &str, limit: usize) -> &str {
	let tabs = line.bytes().take(limit).take_while(|&byte| byte == b'\t').count();
	&line[tabs..]
}

/// The text after `//` and one optional space, if `line` is a line comment.
fn comment_text(line: &str) -> Option<&str> {
	let rest = line.trim_start().strip_prefix("//")?;
	let mut chars = rest.chars();

	match chars.next() {
		Some(c) if c.is_whitespace() => Some(chars.as_str()),
		_ => Some(rest),
	}
}

fn is_output_comment(line: &str) -> bool {
	line.trim_start()
		.strip_prefix("//")
		.is_some_and(|rest| rest.trim() == "Output:")
}

/// Split a Go example function into its body and its expected output.
///
/// The body is de-indented by the tab depth of its first line. Output lines
/// are the comments following `// Output:` with the comment prefix removed.
/// Returns `None` when the function has no `// Output:` line.
pub fn split_example(text: &str) -> Option<(String, String)> {
	let mut lines = text.lines().skip_while(|line| !line.starts_with("func "));
	lines.next()?;

	let mut code = Vec::new();
	let mut output = Vec::new();
	let mut seen_output = false;
	let mut prefix = None;

	for line in lines {
		if seen_output {
			output.extend(comment_text(line));
			continue;
		}

		if is_output_comment(line) {
			seen_output = true;
			continue;
		}

		let depth = *prefix.get_or_insert_with(|| line.bytes().take_while(|&byte| byte == b'\t').count());
		code.push(strip_tabs(line, depth));
	}

	seen_output.then(|| (code.join("\n"), output.join("\n")))
}
