use std::borrow::Cow;

use logos::Logos;
use logos::SpannedIter;

use crate::TokenError;
use crate::scanner::Lexeme;
use crate::scanner::LexemeKind;
use crate::scanner::Scanner;

/// Raw tokens produced by logos for the attribute text of a marker.
///
/// A word is any run of unquoted characters, quoted sections and escaped
/// characters, so `a"b c"d` is a single word. Anything logos cannot match is a
/// stray quote or backslash with nothing left to close it.
#[derive(Logos, Debug, PartialEq, Eq)]
#[logos(skip r"\s+")]
enum RawToken {
	#[token("=")]
	Equals,
	#[regex(r#"([^\s="'\\]|\\[\s\S]|"([^"\\]|\\[\s\S])*"|'([^'\\]|\\[\s\S])*')+"#)]
	Word,
}

/// Splits the text between `<!--` and `-->` into words and `=` separators.
/// Spans are relative to the scanned text.
pub struct TokenScanner<'a> {
	source: &'a str,
	tokens: SpannedIter<'a, RawToken>,
}

impl<'a> TokenScanner<'a> {
	pub fn new(source: &'a str) -> Self {
		Self {
			source,
			tokens: RawToken::lexer(source).spanned(),
		}
	}
}

impl<'a> Scanner<'a> for TokenScanner<'a> {
	fn scan(&mut self) -> Result<Option<Lexeme<'a>>, TokenError> {
		let Some((token, span)) = self.tokens.next() else {
			return Ok(None);
		};
		let slice = &self.source[span.clone()];

		let lexeme = match token {
			Ok(RawToken::Equals) => {
				Lexeme {
					kind: LexemeKind::Equals,
					text: Cow::Borrowed(slice),
					span,
				}
			}
			Ok(RawToken::Word) => {
				Lexeme {
					kind: LexemeKind::Word,
					text: unescape(slice),
					span,
				}
			}
			Err(()) => return Err(TokenError::Unterminated { offset: span.start }),
		};

		Ok(Some(lexeme))
	}
}

/// Whether `\c` collapses to `c`. Other escapes keep their backslash so that
/// regular expressions such as `\(` survive unquoting.
fn is_escapable(c: char) -> bool {
	matches!(c, '"' | '\'' | '\\' | '=') || c.is_whitespace()
}

/// Remove quotes from a word and resolve its escapes.
pub fn unescape(word: &str) -> Cow<'_, str> {
	if !word.contains(['"', '\'', '\\']) {
		return Cow::Borrowed(word);
	}

	let mut value = String::with_capacity(word.len());
	let mut quote: Option<char> = None;
	let mut chars = word.chars();

	while let Some(c) = chars.next() {
		match c {
			'\\' => {
				match chars.next() {
					Some(next) if is_escapable(next) => value.push(next),
					Some(next) => {
						value.push('\\');
						value.push(next);
					}
					None => value.push('\\'),
				}
			}
			'"' | '\'' if quote.is_none() => quote = Some(c),
			_ if quote == Some(c) => quote = None,
			_ => value.push(c),
		}
	}

	Cow::Owned(value)
}

/// Quote `value` so that [`unescape`] returns it unchanged.
pub fn quote(value: &str) -> String {
	let mut quoted = String::with_capacity(value.len() + 2);
	quoted.push('"');

	for c in value.chars() {
		if matches!(c, '"' | '\\') {
			quoted.push('\\');
		}
		quoted.push(c);
	}

	quoted.push('"');
	quoted
}
