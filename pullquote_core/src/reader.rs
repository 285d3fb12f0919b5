use crate::Marker;
use crate::MarkerKind;
use crate::QuoteError;
use crate::QuoteResult;
use crate::scanner::CommentScanner;
use crate::scanner::LexemeKind;
use crate::scanner::Scanner;
use crate::scanner::scan_all;
use crate::tokens::TokenScanner;

/// Pairing state while walking the comments of a document.
#[derive(Debug, Clone, Copy)]
enum ReaderState {
	Scanning,
	/// Index of the marker waiting for its closing comment.
	AwaitingClose(usize),
}

/// Find every marker in `document` in document order.
///
/// Opening comments are parsed and validated on the spot. A marker still
/// waiting for its close when another marker opens, or when the document ends,
/// is left with `close: None` and the rewriter writes the closing comment for
/// it. Comments whose first word is not a marker keyword are ignored.
pub fn read_markers(document: &str) -> QuoteResult<Vec<Marker>> {
	let mut markers: Vec<Marker> = Vec::new();
	let mut state = ReaderState::Scanning;

	for comment in CommentScanner::new(document) {
		let offset = comment.span.start;
		let text = comment.text.as_ref();
		let body = &text["<!--".len()..text.len() - "-->".len()];
		let mut tokens = TokenScanner::new(body);

		let first = match tokens.scan() {
			Ok(Some(first)) if first.kind == LexemeKind::Word => first,
			_ => {
				tracing::trace!(offset, comment = text, "skipping comment");
				continue;
			}
		};

		if let Some(kind) = MarkerKind::from_tag(&first.text) {
			let lexemes = scan_all(&mut tokens).map_err(|source| {
				QuoteError::Parse {
					kind,
					offset,
					source,
				}
			})?;
			let marker = Marker::parse(kind, &lexemes, comment.span.clone()).map_err(|source| {
				QuoteError::Validate {
					kind,
					offset,
					source,
				}
			})?;

			tracing::debug!(offset, %marker, "found marker");
			markers.push(marker);
			state = ReaderState::AwaitingClose(markers.len() - 1);
			continue;
		}

		let Some(kind) = MarkerKind::from_closing_tag(&first.text) else {
			tracing::trace!(offset, tag = %first.text, "unsupported comment tag");
			continue;
		};

		match state {
			ReaderState::AwaitingClose(index) if markers[index].kind() == kind => {
				markers[index].close = Some(comment.span.clone());
				state = ReaderState::Scanning;
				tracing::debug!(offset, %kind, "found marker end");
			}
			_ => {
				return Err(QuoteError::UnexpectedClose {
					tag: first.text.to_string(),
					offset,
					comment: text.to_string(),
				});
			}
		}
	}

	if let ReaderState::AwaitingClose(index) = state {
		tracing::debug!(
			offset = markers[index].open.start,
			"marker not closed before end of document"
		);
	}

	Ok(markers)
}
