use std::path::PathBuf;

use pvgdd::gdd::{AitString, PrimitiveType, Registry, Result, TaggedValue, TimeStamp};

use crate::cmd::util::{data_format, format_label, hex};

/// Build a value of `prim` from text and print or write its wire bytes.
///
/// One text gives a scalar, several give a one-dimensional array. Names not
/// in the standard registry are registered on the fly.
pub fn run(prim: PrimitiveType, app: String, local: bool, now: bool, out: Option<PathBuf>, values: Vec<String>) -> Result<()> {
	let registry = Registry::with_standard_types()?;
	let tag = match registry.tag_of(&app) {
		Some(tag) => tag,
		None => registry.register(&app)?,
	};

	let value = build(tag, prim, &values)?;
	if now {
		value.set_time_stamp(TimeStamp::now());
	}

	let format = data_format(local);
	let bytes = value.to_wire(format)?;
	tracing::debug!(app = %app, tag, %prim, bytes = bytes.len(), "encoded value");

	match out {
		Some(path) => {
			std::fs::write(&path, &bytes)?;
			println!("wrote {} bytes ({}) to {}", bytes.len(), format_label(format), path.display());
		}
		None => println!("{}", hex(&bytes)),
	}
	Ok(())
}

pub(crate) fn build(tag: u16, prim: PrimitiveType, values: &[String]) -> Result<TaggedValue> {
	if let [single] = values {
		let value = TaggedValue::scalar(tag, prim);
		value.put_str(single)?;
		return Ok(value);
	}

	let text = TaggedValue::new(tag);
	text.put_array(&values.iter().map(|item| AitString::copied(item)).collect::<Vec<_>>())?;
	let len = u32::try_from(values.len()).unwrap_or(u32::MAX);
	let value = TaggedValue::array(tag, prim, &[len]);
	value.put_value(&text)?;
	Ok(value)
}
