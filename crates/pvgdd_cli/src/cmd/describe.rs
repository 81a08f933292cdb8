use pvgdd::gdd::{Registry, Result};

use crate::cmd::util::emit_json;

/// Print the standard registry as `#define` lines or JSON rows.
pub fn run(json: bool) -> Result<()> {
	let registry = Registry::with_standard_types()?;

	if json {
		let payload = DescribeJson {
			registered: registry.registered_count(),
			types: registry
				.entries()
				.into_iter()
				.map(|entry| TypeJson {
					tag: entry.tag,
					name: entry.name,
					kind: entry.kind.as_str(),
					nodes: entry.nodes,
				})
				.collect(),
		};
		emit_json(&payload);
		return Ok(());
	}

	print!("{}", registry.describe());
	Ok(())
}

#[derive(serde::Serialize)]
struct DescribeJson {
	registered: usize,
	types: Vec<TypeJson>,
}

#[derive(serde::Serialize)]
struct TypeJson {
	tag: u16,
	name: String,
	kind: &'static str,
	nodes: usize,
}
