use std::collections::HashMap;
use std::io::Read;

use serde_json::Value;
use serde_json::value::RawValue;

use crate::ExtractError;
use crate::MarkerFlags;
use crate::extract::PathExtractor;

/// Selects a value from a JSON document with a slash delimited path such as
/// `/items/0/name`. Object keys and array indices are both supported and an
/// empty path selects the whole document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPathExtractor;

impl PathExtractor for JsonPathExtractor {
	fn extract(&self, reader: &mut dyn Read, path: &str, flags: MarkerFlags) -> Result<String, ExtractError> {
		let mut source = String::new();
		reader
			.read_to_string(&mut source)
			.map_err(ExtractError::Read)?;

		let value = select(&source, path)?;

		if flags.contains(MarkerFlags::NO_REFORMAT) {
			return Ok(value.get().to_string());
		}

		let parsed: Value = serde_json::from_str(value.get()).map_err(malformed)?;
		serde_json::to_string_pretty(&parsed).map_err(malformed)
	}
}

fn malformed(error: serde_json::Error) -> ExtractError {
	ExtractError::MalformedJson(error.to_string())
}

/// Walk `path` through `source` without materialising the values that are not
/// selected.
fn select<'a>(source: &'a str, path: &str) -> Result<&'a RawValue, ExtractError> {
	let mut current: &RawValue = serde_json::from_str(source).map_err(malformed)?;
	let segments = path.strip_prefix('/').unwrap_or(path);

	if path.is_empty() {
		return Ok(current);
	}

	for segment in segments.split('/') {
		current = match current.get().trim_start().as_bytes().first() {
			Some(b'{') => {
				let object: HashMap<String, &RawValue> = serde_json::from_str(current.get()).map_err(malformed)?;
				object
					.get(segment)
					.copied()
					.ok_or_else(|| ExtractError::NotFound(segment.to_string()))?
			}
			Some(b'[') => {
				let index: usize = segment.parse().map_err(|_| {
					ExtractError::BadPathSegment {
						segment: segment.to_string(),
						reason: "expected an array index".to_string(),
					}
				})?;
				let array: Vec<&RawValue> = serde_json::from_str(current.get()).map_err(malformed)?;
				array
					.get(index)
					.copied()
					.ok_or_else(|| ExtractError::NotFound(segment.to_string()))?
			}
			_ => {
				return Err(ExtractError::BadPathSegment {
					segment: segment.to_string(),
					reason: "cannot index into a scalar".to_string(),
				});
			}
		};
	}

	Ok(current)
}
