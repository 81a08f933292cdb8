use crate::gdd::{PrimitiveType, Result, TaggedValue};

use super::Registry;

/// Attribute names registered without a prototype, in tag order.
const PLAIN_ATTRIBUTES: [&str; 16] = [
	"status",
	"severity",
	"timeStamp",
	"name",
	"class",
	"precision",
	"graphicHigh",
	"graphicLow",
	"controlHigh",
	"controlLow",
	"alarmHigh",
	"alarmLow",
	"alarmHighWarning",
	"alarmLowWarning",
	"maxElements",
	"value",
];

struct Tags {
	prec: u16,
	ghigh: u16,
	glow: u16,
	chigh: u16,
	clow: u16,
	ahigh: u16,
	alow: u16,
	awhigh: u16,
	awlow: u16,
	maxele: u16,
	value: u16,
	menu: u16,
	units: u16,
	ackt: u16,
	acks: u16,
}

impl Registry {
	/// Registry preloaded with the standard attribute names and the
	/// `dbr_*` prototypes.
	pub fn with_standard_types() -> Result<Self> {
		let registry = Self::default();
		registry.register_standard_types()?;
		Ok(registry)
	}

	/// Register the standard attribute names and prototypes.
	pub fn register_standard_types(&self) -> Result<()> {
		for name in PLAIN_ATTRIBUTES {
			self.register(name)?;
		}
		let tag = |name: &str| self.tag_of(name).unwrap_or_default();
		let menu = self.register("enums")?;
		let units = self.register_with_prototype("units", TaggedValue::scalar(0, PrimitiveType::String))?;
		let ackt = self.register("ackt")?;
		let acks = self.register("acks")?;
		let tags = Tags {
			prec: tag("precision"),
			ghigh: tag("graphicHigh"),
			glow: tag("graphicLow"),
			chigh: tag("controlHigh"),
			clow: tag("controlLow"),
			ahigh: tag("alarmHigh"),
			alow: tag("alarmLow"),
			awhigh: tag("alarmHighWarning"),
			awlow: tag("alarmLowWarning"),
			maxele: tag("maxElements"),
			value: tag("value"),
			menu,
			units,
			ackt,
			acks,
		};

		self.register_attribute_sets(&tags)?;
		for (prefix, control) in [("dbr_gr", false), ("dbr_ctrl", true)] {
			for (suffix, prim) in [
				("short", Some(PrimitiveType::Int16)),
				("float", Some(PrimitiveType::Float32)),
				("enum", None),
				("char", Some(PrimitiveType::Int8)),
				("long", Some(PrimitiveType::Int32)),
				("double", Some(PrimitiveType::Float64)),
			] {
				let proto = match prim {
					Some(prim) => self.limits_proto(&tags, prim, control)?,
					None => self.enum_proto(&tags)?,
				};
				self.register_with_prototype(&format!("{prefix}_{suffix}"), proto)?;
			}
		}

		let stsack = TaggedValue::container(0);
		stsack.insert(TaggedValue::scalar(tags.value, PrimitiveType::String))?;
		stsack.insert(TaggedValue::scalar(tags.acks, PrimitiveType::Uint16))?;
		stsack.insert(TaggedValue::scalar(tags.ackt, PrimitiveType::Uint16))?;
		self.register_with_prototype("dbr_stsack_string", stsack)?;

		tracing::debug!(registered = self.registered_count(), "standard application types ready");
		Ok(())
	}

	fn register_attribute_sets(&self, tags: &Tags) -> Result<()> {
		let limits = [tags.prec, tags.ghigh, tags.glow, tags.chigh, tags.clow, tags.ahigh, tags.alow, tags.awhigh, tags.awlow];

		let attributes = TaggedValue::container(0);
		for tag in limits {
			attributes.insert(self.get_instance(tag)?)?;
		}
		attributes.insert(self.get_instance(tags.units)?)?;
		attributes.insert(self.get_instance(tags.maxele)?)?;
		self.register_with_prototype("attributes", attributes)?;

		let all = TaggedValue::container(0);
		for tag in limits {
			all.insert(self.get_instance(tag)?)?;
		}
		all.insert(self.get_instance(tags.units)?)?;
		all.insert(self.get_instance(tags.value)?)?;
		self.register_with_prototype("all", all)?;
		Ok(())
	}

	/// Value plus graphic (and optionally control) and alarm limits of `prim`.
	/// Floating point types also carry a precision.
	fn limits_proto(&self, tags: &Tags, prim: PrimitiveType, control: bool) -> Result<TaggedValue> {
		let proto = TaggedValue::container(0);
		proto.insert(TaggedValue::scalar(tags.value, prim))?;
		if matches!(prim, PrimitiveType::Float32 | PrimitiveType::Float64) {
			proto.insert(TaggedValue::scalar(tags.prec, PrimitiveType::Int16))?;
		}
		let mut limits = vec![tags.ghigh, tags.glow];
		if control {
			limits.extend([tags.chigh, tags.clow]);
		}
		limits.extend([tags.ahigh, tags.alow, tags.awhigh, tags.awlow]);
		for tag in limits {
			proto.insert(TaggedValue::scalar(tag, prim))?;
		}
		proto.insert(self.get_instance(tags.units)?)?;
		Ok(proto)
	}

	fn enum_proto(&self, tags: &Tags) -> Result<TaggedValue> {
		let proto = TaggedValue::container(0);
		proto.insert(self.get_instance(tags.menu)?)?;
		proto.insert(TaggedValue::scalar(tags.value, PrimitiveType::Enum16))?;
		Ok(proto)
	}
}
