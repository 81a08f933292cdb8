use std::path::PathBuf;

use pvgdd::gdd::{Registry, Result, TaggedValue, WireHeader};

use crate::cmd::util::{ValueJson, app_label, bounds_label, data_format, emit_json, format_label, render_values};

pub fn run(path: PathBuf, local: bool, json: bool) -> Result<()> {
	let bytes = std::fs::read(&path)?;
	let format = data_format(local);
	let (header, header_len) = WireHeader::parse(&bytes, format)?;
	let (value, consumed) = TaggedValue::from_wire(&bytes, format)?;
	let registry = Registry::with_standard_types()?;

	if json {
		emit_json(&DecodeJson {
			path: path.display().to_string(),
			format: format_label(format),
			header_bytes: header_len,
			consumed,
			trailing: bytes.len() - consumed,
			value: ValueJson::build(&registry, &value)?,
		});
		return Ok(());
	}

	println!("path: {}", path.display());
	println!("format: {}", format_label(format));
	println!("header_bytes: {header_len}");
	println!("consumed: {consumed}");
	println!("app: {}", app_label(&registry, header.app));
	println!("type: {}", header.prim);
	println!("bounds: {}", bounds_label(&value));
	println!("elements: {}", header.element_count()?);
	println!("status: {}", header.stat);
	println!("severity: {}", header.sevr);
	println!("time: {}.{:09}", header.time.sec, header.time.nsec);
	for (index, item) in render_values(&value)?.iter().enumerate() {
		println!("  [{index}] {item}");
	}
	Ok(())
}

#[derive(serde::Serialize)]
struct DecodeJson {
	path: String,
	format: &'static str,
	header_bytes: usize,
	consumed: usize,
	trailing: usize,
	value: ValueJson,
}
