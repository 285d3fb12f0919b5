use std::io::Read;
use std::path::PathBuf;

use crate::ExtractError;
use crate::MarkerFlags;

/// Source text for a named declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extracted {
	/// The declaration, including its doc comment when it has one.
	pub text: String,
	/// The doc comment on its own.
	pub doc: Option<String>,
}

/// One declaration lookup in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRequest {
	pub location: String,
	pub symbol: String,
	pub flags: MarkerFlags,
}

/// One JSON lookup in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRequest {
	pub location: PathBuf,
	pub path: String,
	pub flags: MarkerFlags,
}

/// Looks up named declarations in source code.
pub trait SymbolExtractor: Send + Sync {
	/// Find `symbol` within `location`, which is a file, a directory or an
	/// importable package specifier.
	fn extract(&self, location: &str, symbol: &str, flags: MarkerFlags) -> Result<Extracted, ExtractError>;

	/// Resolve several lookups at once. Results are in request order.
	fn extract_all(&self, requests: &[SymbolRequest]) -> Vec<Result<Extracted, ExtractError>> {
		requests
			.iter()
			.map(|request| self.extract(&request.location, &request.symbol, request.flags))
			.collect()
	}

	/// Split an example function into its code and its expected output.
	/// `None` when there is no output section.
	fn split_example(&self, text: &str) -> Option<(String, String)>;
}

/// Looks up a value by path inside a structured document.
pub trait PathExtractor: Send + Sync {
	fn extract(&self, reader: &mut dyn Read, path: &str, flags: MarkerFlags) -> Result<String, ExtractError>;

	/// Resolve several lookups at once. Results are in request order.
	fn extract_all(&self, requests: &[PathRequest]) -> Vec<Result<String, ExtractError>> {
		requests
			.iter()
			.map(|request| {
				let source = std::fs::read_to_string(&request.location).map_err(|source| {
					ExtractError::Io {
						path: request.location.clone(),
						source,
					}
				})?;
				self.extract(&mut source.as_bytes(), &request.path, request.flags)
			})
			.collect()
	}
}
