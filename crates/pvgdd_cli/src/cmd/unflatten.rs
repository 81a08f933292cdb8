use std::path::PathBuf;

use pvgdd::gdd::{FlatEncoding, FlatValue, Registry, Result};

use crate::cmd::util::{ValueJson, emit_json, print_tree};

/// Adopt a flat buffer, rebase offsets if needed, and print the tree.
pub fn run(path: PathBuf, json: bool) -> Result<()> {
	let bytes = std::fs::read(&path)?;
	let mut flat = FlatValue::from_bytes(bytes)?;
	let received = flat.encoding();
	if received == FlatEncoding::Offsets {
		flat.convert_offsets_to_address()?;
	}
	let value = flat.to_value()?;
	let registry = Registry::with_standard_types()?;

	if json {
		emit_json(&UnflattenJson {
			path: path.display().to_string(),
			encoding: received.as_str(),
			bytes: flat.len(),
			nodes: flat.node_count()?,
			value: ValueJson::build(&registry, &value)?,
		});
		return Ok(());
	}

	println!("path: {}", path.display());
	println!("encoding: {}", received.as_str());
	println!("bytes: {}", flat.len());
	println!("nodes: {}", flat.node_count()?);
	print_tree(&registry, &value, 0)
}

#[derive(serde::Serialize)]
struct UnflattenJson {
	path: String,
	encoding: &'static str,
	bytes: usize,
	nodes: usize,
	value: ValueJson,
}
