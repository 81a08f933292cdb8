use std::path::PathBuf;

use pvgdd::gdd::{GddError, Registry, Result};

use crate::cmd::util::emit_json;

/// Flatten an instance of the standard prototype `name` in offset form.
pub fn run(name: String, out: Option<PathBuf>, json: bool) -> Result<()> {
	let registry = Registry::with_standard_types()?;
	let tag = registry.tag_of(&name).ok_or_else(|| GddError::UnknownName { name: name.clone() })?;
	let instance = registry.get_instance(tag)?;
	let flat = instance.flatten_with_offsets(vec![0_u8; instance.total_size_bytes()].into_boxed_slice())?;

	if let Some(path) = &out {
		std::fs::write(path, flat.as_bytes())?;
	}

	let application_types = flat.application_types()?;
	if json {
		emit_json(&FlattenJson {
			name,
			tag,
			kind: registry.kind(tag).as_str(),
			bytes: flat.len(),
			nodes: application_types.len(),
			encoding: flat.encoding().as_str(),
			out: out.map(|path| path.display().to_string()),
			application_types,
		});
		return Ok(());
	}

	println!("name: {name}");
	println!("tag: {tag}");
	println!("kind: {}", registry.kind(tag));
	println!("bytes: {}", flat.len());
	println!("encoding: {}", flat.encoding().as_str());
	println!("index\ttag\tname");
	for (index, app) in application_types.iter().enumerate() {
		println!("{index}\t{app}\t{}", registry.name_of(*app).unwrap_or_else(|| "-".to_owned()));
	}
	if let Some(path) = out {
		println!("wrote: {}", path.display());
	}
	Ok(())
}

#[derive(serde::Serialize)]
struct FlattenJson {
	name: String,
	tag: u16,
	kind: &'static str,
	bytes: usize,
	nodes: usize,
	encoding: &'static str,
	out: Option<String>,
	application_types: Vec<u16>,
}
