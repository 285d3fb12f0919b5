use crate::Format;
use crate::Marker;
use crate::ResolvedContent;

/// Produce `document` with the content of every marker replaced.
///
/// Bytes outside the markers' content ranges are copied unchanged. A marker
/// without a closing comment gets one written after its new content, and the
/// rest of the document follows as it was.
pub fn rewrite(document: &str, markers: &[Marker], resolved: &[ResolvedContent]) -> String {
	let mut output = String::with_capacity(document.len());
	let mut copied = 0;

	for (marker, content) in markers.iter().zip(resolved) {
		let range = marker.content_range();

		output.push_str(&document[copied..range.start]);
		write_content(&mut output, marker, content);

		if marker.close.is_none() {
			output.push_str(&marker.kind().closing_comment());
		}

		copied = range.end;
	}

	output.push_str(&document[copied..]);
	output
}

fn write_content(output: &mut String, marker: &Marker, content: &ResolvedContent) {
	match (marker.format, &content.parts) {
		(Format::Example, Some((code, result))) => {
			output.push_str("\nCode:");
			write_fence(output, code, &marker.language);
			output.push_str("Output:");
			write_fence(output, result, "");
		}
		(Format::Example | Format::CodeFence, _) => write_fence(output, &content.text, &marker.language),
		(Format::BlockQuote, _) => {
			output.push_str("\n> ");
			output.push_str(&content.text.replace('\n', "\n> "));
			output.push('\n');
		}
		(Format::None, _) => {
			output.push('\n');
			output.push_str(&content.text);
			output.push('\n');
		}
	}
}

/// Write `text` in a fenced block, switching to tildes when the text contains
/// a backtick fence of its own.
fn write_fence(output: &mut String, text: &str, language: &str) {
	let fence = if text.starts_with("```") || text.contains("\n```") {
		"~~~"
	} else {
		"```"
	};

	output.push('\n');
	output.push_str(fence);
	output.push_str(language);
	output.push('\n');
	output.push_str(text);
	output.push('\n');
	output.push_str(fence);
	output.push('\n');
}
