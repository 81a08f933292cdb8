use pvgdd::gdd::{AitString, DataFormat, PrimitiveType, Registry, Result, TaggedValue};

/// Clap parser for primitive type names such as `float64` or `fixed_string`.
pub(crate) fn parse_prim(name: &str) -> std::result::Result<PrimitiveType, String> {
	PrimitiveType::from_name(name).ok_or_else(|| {
		let known = PrimitiveType::ALL.iter().map(|prim| prim.as_str()).collect::<Vec<_>>();
		format!("unknown type {name:?}; expected one of {}", known.join(", "))
	})
}

pub(crate) fn data_format(local: bool) -> DataFormat {
	if local { DataFormat::Local } else { DataFormat::Network }
}

pub(crate) fn format_label(format: DataFormat) -> &'static str {
	match format {
		DataFormat::Local => "local",
		DataFormat::Network => "network",
	}
}

/// Lowercase hex without separators.
pub(crate) fn hex(bytes: &[u8]) -> String {
	bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Elements of an atomic value rendered as text; empty for containers and
/// values without storage.
pub(crate) fn render_values(value: &TaggedValue) -> Result<Vec<String>> {
	if value.is_container() {
		return Ok(Vec::new());
	}
	Ok(value.get_array::<AitString>()?.iter().map(|text| text.as_str().to_owned()).collect())
}

/// `name(tag)` label, falling back to the bare tag.
pub(crate) fn app_label(registry: &Registry, app: u16) -> String {
	match registry.name_of(app) {
		Some(name) => format!("{name}({app})"),
		None => app.to_string(),
	}
}

pub(crate) fn bounds_label(value: &TaggedValue) -> String {
	let bounds = value.bounds();
	if bounds.is_empty() {
		return "scalar".to_owned();
	}
	let axes = bounds.iter().map(|bound| format!("{}:{}", bound.first, bound.size)).collect::<Vec<_>>();
	format!("[{}]", axes.join(", "))
}

/// Print one line per node, children indented under their container.
pub(crate) fn print_tree(registry: &Registry, value: &TaggedValue, depth: usize) -> Result<()> {
	let values = render_values(value)?;
	let mut line = format!(
		"{:indent$}{} {} {} stat={} sevr={}",
		"",
		app_label(registry, value.application_type()),
		value.primitive_type(),
		bounds_label(value),
		value.status(),
		value.severity(),
		indent = depth * 2
	);
	if !values.is_empty() {
		line.push_str(" = ");
		line.push_str(&values.join(", "));
	}
	println!("{line}");

	for child in value.children() {
		print_tree(registry, &child, depth + 1)?;
	}
	Ok(())
}

pub(crate) fn emit_json<T: serde::Serialize>(payload: &T) {
	match serde_json::to_string_pretty(payload) {
		Ok(text) => println!("{text}"),
		Err(err) => eprintln!("error: failed to encode json: {err}"),
	}
}

#[derive(serde::Serialize)]
pub(crate) struct BoundJson {
	first: u32,
	size: u32,
}

#[derive(serde::Serialize)]
pub(crate) struct TimeJson {
	sec: u32,
	nsec: u32,
}

/// JSON form of a value tree.
#[derive(serde::Serialize)]
pub(crate) struct ValueJson {
	app: u16,
	name: Option<String>,
	#[serde(rename = "type")]
	prim: &'static str,
	bounds: Vec<BoundJson>,
	status: u16,
	severity: u16,
	time: TimeJson,
	values: Vec<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	children: Vec<ValueJson>,
}

impl ValueJson {
	pub(crate) fn build(registry: &Registry, value: &TaggedValue) -> Result<Self> {
		let time = value.time_stamp();
		Ok(Self {
			app: value.application_type(),
			name: registry.name_of(value.application_type()),
			prim: value.primitive_type().as_str(),
			bounds: value
				.bounds()
				.iter()
				.map(|bound| BoundJson {
					first: bound.first,
					size: bound.size,
				})
				.collect(),
			status: value.status(),
			severity: value.severity(),
			time: TimeJson { sec: time.sec, nsec: time.nsec },
			values: render_values(value)?,
			children: value.children().iter().map(|child| Self::build(registry, child)).collect::<Result<_>>()?,
		})
	}
}
