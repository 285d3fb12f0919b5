use std::collections::BTreeSet;
use std::collections::HashSet;
use std::fmt;
use std::ops::BitOrAssign;
use std::ops::Range;

use regex::Regex;

use crate::MarkerError;
use crate::scanner::Lexeme;
use crate::tokens::quote;

const KEY_SRC: &str = "src";
const KEY_START: &str = "start";
const KEY_END: &str = "end";
const KEY_END_COUNT: &str = "endcount";
const KEY_FMT: &str = "fmt";
const KEY_LANG: &str = "lang";
const KEY_GO_PATH: &str = "gopath";
const KEY_JSON_PATH: &str = "jsonpath";
const KEY_NO_REFORMAT: &str = "noreformat";
const KEY_INCLUDE_GROUP: &str = "includegroup";

const KEYS_COMMON: [&str; 2] = [KEY_FMT, KEY_LANG];
const KEYS_PULL_REQUIRED: [&str; 3] = [KEY_SRC, KEY_START, KEY_END];
const KEYS_PULL_OPTIONAL: [&str; 1] = [KEY_END_COUNT];
const KEYS_GO: [&str; 3] = [KEY_GO_PATH, KEY_NO_REFORMAT, KEY_INCLUDE_GROUP];
const KEYS_JSON: [&str; 2] = [KEY_JSON_PATH, KEY_NO_REFORMAT];
const KEYS_FLAGS: [&str; 2] = [KEY_NO_REFORMAT, KEY_INCLUDE_GROUP];

/// The kind of a marker, named after its opening tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
	/// `<!-- pullquote -->`: a regex delimited line range of a file.
	Pull,
	/// `<!-- goquote -->`: a named Go declaration.
	Go,
	/// `<!-- jsonquote -->`: a value inside a JSON document.
	Json,
}

impl MarkerKind {
	pub const ALL: [Self; 3] = [Self::Pull, Self::Go, Self::Json];

	/// The keyword that opens a marker of this kind.
	pub fn tag(self) -> &'static str {
		match self {
			Self::Pull => "pullquote",
			Self::Go => "goquote",
			Self::Json => "jsonquote",
		}
	}

	/// The keyword that closes a marker of this kind.
	pub fn closing_tag(self) -> &'static str {
		match self {
			Self::Pull => "/pullquote",
			Self::Go => "/goquote",
			Self::Json => "/jsonquote",
		}
	}

	pub fn from_tag(tag: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|kind| kind.tag() == tag)
	}

	pub fn from_closing_tag(tag: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|kind| kind.closing_tag() == tag)
	}

	/// The full comment written when a close has to be synthesized.
	pub fn closing_comment(self) -> String {
		format!("<!-- {} -->", self.closing_tag())
	}

	/// The key that holds the `location#name` object path, if any.
	fn path_key(self) -> Option<&'static str> {
		match self {
			Self::Pull => None,
			Self::Go => Some(KEY_GO_PATH),
			Self::Json => Some(KEY_JSON_PATH),
		}
	}
}

impl fmt::Display for MarkerKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.tag())
	}
}

/// How the resolved content is presented inside the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
	/// The content as is, surrounded by newlines.
	#[default]
	None,
	/// A fenced code block tagged with the marker's language.
	CodeFence,
	/// Every line prefixed with `> `.
	BlockQuote,
	/// `Code:` and `Output:` fences split from a Go example function.
	Example,
}

impl Format {
	pub fn from_name(name: &str) -> Option<Self> {
		match name {
			"none" => Some(Self::None),
			"codefence" => Some(Self::CodeFence),
			"blockquote" => Some(Self::BlockQuote),
			"example" => Some(Self::Example),
			_ => None,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Self::None => "none",
			Self::CodeFence => "codefence",
			Self::BlockQuote => "blockquote",
			Self::Example => "example",
		}
	}
}

/// Resolver hints attached to a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct MarkerFlags(u8);

impl MarkerFlags {
	/// Keep extracted code exactly as it appears in the source.
	pub const NO_REFORMAT: Self = Self(1);
	/// Quote the whole enclosing declaration group instead of one member.
	pub const INCLUDE_GROUP: Self = Self(1 << 1);

	pub const fn empty() -> Self {
		Self(0)
	}

	pub const fn contains(self, other: Self) -> bool {
		self.0 & other.0 == other.0
	}

	pub fn insert(&mut self, other: Self) {
		self.0 |= other.0;
	}
}

impl BitOrAssign for MarkerFlags {
	fn bitor_assign(&mut self, rhs: Self) {
		self.insert(rhs);
	}
}

/// Where a marker's content comes from.
#[derive(Debug, Clone)]
pub enum MarkerTarget {
	/// A line range of `src` starting at a line matching `start` and ending
	/// at the `end_count`th following line matching `end`.
	Pull {
		src: String,
		start: Regex,
		end: Regex,
		end_count: usize,
	},
	/// A declaration named `symbol` within `location`.
	Go { location: String, symbol: String },
	/// The value at slash delimited `path` within the JSON file `location`.
	Json { location: String, path: String },
}

impl PartialEq for MarkerTarget {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(
				Self::Pull {
					src,
					start,
					end,
					end_count,
				},
				Self::Pull {
					src: other_src,
					start: other_start,
					end: other_end,
					end_count: other_end_count,
				},
			) => {
				src == other_src
					&& start.as_str() == other_start.as_str()
					&& end.as_str() == other_end.as_str()
					&& end_count == other_end_count
			}
			(
				Self::Go { location, symbol },
				Self::Go {
					location: other_location,
					symbol: other_symbol,
				},
			) => location == other_location && symbol == other_symbol,
			(
				Self::Json { location, path },
				Self::Json {
					location: other_location,
					path: other_path,
				},
			) => location == other_location && path == other_path,
			_ => false,
		}
	}
}

/// A parsed and validated marker along with its position in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
	pub target: MarkerTarget,
	/// Byte span of the opening `<!-- ... -->` comment.
	pub open: Range<usize>,
	/// Byte span of the closing comment, `None` if the document ended first.
	pub close: Option<Range<usize>>,
	pub format: Format,
	pub language: String,
	pub flags: MarkerFlags,
}

impl Marker {
	pub fn kind(&self) -> MarkerKind {
		match self.target {
			MarkerTarget::Pull { .. } => MarkerKind::Pull,
			MarkerTarget::Go { .. } => MarkerKind::Go,
			MarkerTarget::Json { .. } => MarkerKind::Json,
		}
	}

	/// Byte range replaced by the marker's content. Empty for a marker that
	/// was never closed.
	pub fn content_range(&self) -> Range<usize> {
		let end = self.close.as_ref().map_or(self.open.end, |close| close.start);
		self.open.end..end
	}

	/// Build a marker of `kind` from the attribute lexemes that follow its
	/// opening keyword.
	pub fn parse(kind: MarkerKind, lexemes: &[Lexeme<'_>], open: Range<usize>) -> Result<Self, MarkerError> {
		let attributes = Attributes::collect(kind, lexemes);
		attributes.validate(kind, open)
	}
}

/// A debugging representation. This is not guaranteed to parse back into the
/// same marker.
impl fmt::Display for Marker {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<!-- {}", self.kind())?;

		match &self.target {
			MarkerTarget::Pull {
				src,
				start,
				end,
				end_count,
			} => {
				write!(
					f,
					" src={} start={} end={}",
					quote(src),
					quote(start.as_str()),
					quote(end.as_str())
				)?;
				if *end_count != 1 {
					write!(f, " endcount={end_count}")?;
				}
			}
			MarkerTarget::Go { location, symbol } => {
				write!(f, " {}", quote(&format!("{location}#{symbol}")))?;
			}
			MarkerTarget::Json { location, path } => {
				write!(f, " {}", quote(&format!("{location}#{path}")))?;
			}
		}

		write!(f, " fmt={}", self.format.name())?;
		if !self.language.is_empty() {
			write!(f, " lang={}", quote(&self.language))?;
		}
		if self.flags.contains(MarkerFlags::NO_REFORMAT) {
			f.write_str(" noreformat")?;
		}
		if self.flags.contains(MarkerFlags::INCLUDE_GROUP) {
			f.write_str(" includegroup")?;
		}

		f.write_str(" -->")
	}
}

/// One `key`, `key=value` or implicit object path read from a marker.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Attribute {
	key: String,
	value: Option<String>,
}

/// The raw attributes of one marker in the order they were written.
#[derive(Debug, Default)]
struct Attributes {
	entries: Vec<Attribute>,
}

impl Attributes {
	/// Assemble `key = value` triples and bare keys from the lexemes. For Go
	/// and JSON markers a leading value that is not itself a key is the
	/// object path.
	fn collect(kind: MarkerKind, lexemes: &[Lexeme<'_>]) -> Self {
		let mut attributes = Self::default();
		let mut rest = lexemes;

		if let (Some(path_key), [first, tail @ ..]) = (kind.path_key(), rest) {
			let is_key = tail.first().is_some_and(Lexeme::is_equals);
			if !first.is_equals() && !is_key {
				attributes.push(path_key, Some(first.text.to_string()));
				rest = tail;
			}
		}

		let mut window: Vec<&Lexeme<'_>> = Vec::with_capacity(3);

		for lexeme in rest {
			window.push(lexeme);

			match *window.as_slice() {
				[key, next] if !next.is_equals() => {
					attributes.push(&key.text, None);
					window.remove(0);
				}
				[key, _, value] => {
					attributes.push(&key.text, Some(value.text.to_string()));
					window.clear();
				}
				_ => {}
			}
		}

		for key in window {
			attributes.push(&key.text, None);
		}

		attributes
	}

	fn push(&mut self, key: &str, value: Option<String>) {
		self.entries.push(Attribute {
			key: key.to_string(),
			value,
		});
	}

	fn has(&self, key: &str) -> bool {
		self.entries.iter().any(|entry| entry.key == key)
	}

	/// The value of the first occurrence of `key`.
	fn value(&self, key: &str) -> Option<&str> {
		self.entries
			.iter()
			.find(|entry| entry.key == key)
			.and_then(|entry| entry.value.as_deref())
	}

	/// Keys not in `allowed`, sorted and de-duplicated.
	fn leftover(&self, allowed: &[&str]) -> Vec<String> {
		self.entries
			.iter()
			.filter(|entry| !allowed.contains(&entry.key.as_str()))
			.map(|entry| entry.key.clone())
			.collect::<BTreeSet<_>>()
			.into_iter()
			.collect()
	}

	fn validate(&self, kind: MarkerKind, open: Range<usize>) -> Result<Marker, MarkerError> {
		let mut format = match self.value(KEY_FMT) {
			Some(name) => Some(Format::from_name(name).ok_or(MarkerError::InvalidFormat)?),
			None => None,
		};
		let mut language = self.value(KEY_LANG).map(str::to_string);

		match kind {
			MarkerKind::Pull => {
				for key in KEYS_PULL_REQUIRED {
					if !self.has(key) {
						return Err(MarkerError::Unset(key));
					}
				}

				let allowed: Vec<&str> = KEYS_COMMON
					.iter()
					.chain(&KEYS_PULL_REQUIRED)
					.chain(&KEYS_PULL_OPTIONAL)
					.copied()
					.collect();
				let leftover = self.leftover(&allowed);
				if !leftover.is_empty() {
					return Err(MarkerError::InvalidKeys(leftover));
				}
			}
			MarkerKind::Go | MarkerKind::Json => {
				let (path_key, valid) = match kind {
					MarkerKind::Go => (KEY_GO_PATH, KEYS_GO.as_slice()),
					_ => (KEY_JSON_PATH, KEYS_JSON.as_slice()),
				};

				if !self.has(path_key) {
					return Err(MarkerError::Unset(path_key));
				}

				if format.is_none() {
					let is_example = kind == MarkerKind::Go
						&& self
							.value(path_key)
							.and_then(|path| path.split_once('#'))
							.is_some_and(|(_, symbol)| symbol.contains("Example"));
					format = Some(if is_example {
						Format::Example
					} else {
						Format::CodeFence
					});
				}
				if language.is_none() {
					language = Some(
						match kind {
							MarkerKind::Go => "go",
							_ => "json",
						}
						.to_string(),
					);
				}

				let allowed: Vec<&str> = KEYS_COMMON.iter().chain(valid).copied().collect();
				let leftover = self.leftover(&allowed);
				if !leftover.is_empty() {
					return Err(MarkerError::UnknownKeys {
						kind,
						keys: leftover,
					});
				}
			}
		}

		let mut seen = HashSet::new();
		for entry in &self.entries {
			if !seen.insert(entry.key.as_str()) {
				return Err(MarkerError::AlreadySeen(entry.key.clone()));
			}
		}

		let mut flags = MarkerFlags::empty();
		for entry in &self.entries {
			let is_flag = KEYS_FLAGS.contains(&entry.key.as_str());
			match (is_flag, &entry.value) {
				(true, Some(_)) => return Err(MarkerError::NoValue(entry.key.clone())),
				(false, None) => return Err(MarkerError::RequiresValue(entry.key.clone())),
				(true, None) if entry.key == KEY_NO_REFORMAT => flags |= MarkerFlags::NO_REFORMAT,
				(true, None) => flags |= MarkerFlags::INCLUDE_GROUP,
				(false, Some(_)) => {}
			}
		}

		let target = match kind {
			MarkerKind::Pull => {
				MarkerTarget::Pull {
					src: self.value(KEY_SRC).unwrap_or_default().to_string(),
					start: self.regex(KEY_START)?,
					end: self.regex(KEY_END)?,
					end_count: self.end_count()?,
				}
			}
			MarkerKind::Go => {
				let (location, symbol) = self.object_path(KEY_GO_PATH)?;
				MarkerTarget::Go { location, symbol }
			}
			MarkerKind::Json => {
				let (location, path) = self.object_path(KEY_JSON_PATH)?;
				MarkerTarget::Json { location, path }
			}
		};

		Ok(Marker {
			target,
			open,
			close: None,
			format: format.unwrap_or_default(),
			language: language.unwrap_or_default(),
			flags,
		})
	}

	fn regex(&self, key: &'static str) -> Result<Regex, MarkerError> {
		let pattern = self.value(key).unwrap_or_default();
		Regex::new(pattern).map_err(|source| {
			MarkerError::InvalidPattern {
				key,
				pattern: pattern.to_string(),
				source,
			}
		})
	}

	fn end_count(&self) -> Result<usize, MarkerError> {
		let Some(value) = self.value(KEY_END_COUNT) else {
			return Ok(1);
		};

		match value.parse::<usize>() {
			Ok(count) if count >= 1 => Ok(count),
			_ => Err(MarkerError::InvalidEndCount(value.to_string())),
		}
	}

	fn object_path(&self, key: &'static str) -> Result<(String, String), MarkerError> {
		let value = self.value(key).unwrap_or_default();

		match value.split_once('#') {
			Some((location, name)) if key == KEY_JSON_PATH || !name.is_empty() => {
				Ok((location.to_string(), name.to_string()))
			}
			_ => {
				Err(MarkerError::InvalidObjectPath {
					key,
					value: value.to_string(),
				})
			}
		}
	}
}
