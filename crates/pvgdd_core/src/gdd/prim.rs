use std::fmt;

/// Closed set of primitive payload representations.
///
/// Discriminants are the wire values written into headers and flat records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum PrimitiveType {
	/// No type assigned yet.
	#[default]
	Invalid = 0,
	/// Signed 8-bit integer.
	Int8 = 1,
	/// Unsigned 8-bit integer.
	Uint8 = 2,
	/// Signed 16-bit integer.
	Int16 = 3,
	/// Unsigned 16-bit integer.
	Uint16 = 4,
	/// Enumeration index (unsigned 16-bit).
	Enum16 = 5,
	/// Signed 32-bit integer.
	Int32 = 6,
	/// Unsigned 32-bit integer.
	Uint32 = 7,
	/// IEEE single precision float.
	Float32 = 8,
	/// IEEE double precision float.
	Float64 = 9,
	/// Null-padded string of fixed capacity.
	FixedString = 10,
	/// Variable length string.
	String = 11,
	/// Ordered sequence of child values.
	Container = 12,
}

impl PrimitiveType {
	/// Number of discriminants.
	pub const COUNT: usize = 13;

	/// All types in discriminant order.
	pub const ALL: [Self; Self::COUNT] = [
		Self::Invalid,
		Self::Int8,
		Self::Uint8,
		Self::Int16,
		Self::Uint16,
		Self::Enum16,
		Self::Int32,
		Self::Uint32,
		Self::Float32,
		Self::Float64,
		Self::FixedString,
		Self::String,
		Self::Container,
	];

	/// Types that participate in the conversion matrix.
	pub const CONVERTIBLE: [Self; 11] = [
		Self::Int8,
		Self::Uint8,
		Self::Int16,
		Self::Uint16,
		Self::Enum16,
		Self::Int32,
		Self::Uint32,
		Self::Float32,
		Self::Float64,
		Self::FixedString,
		Self::String,
	];

	/// Decode a wire discriminant.
	pub fn from_u8(value: u8) -> Option<Self> {
		Self::ALL.get(usize::from(value)).copied()
	}

	/// Table index for this type.
	pub fn index(self) -> usize {
		self as usize
	}

	/// Byte size of one element, `0` for invalid, container, and variable strings.
	pub fn size(self) -> usize {
		match self {
			Self::Invalid | Self::Container | Self::String => 0,
			Self::Int8 | Self::Uint8 => 1,
			Self::Int16 | Self::Uint16 | Self::Enum16 => 2,
			Self::Int32 | Self::Uint32 | Self::Float32 => 4,
			Self::Float64 => 8,
			Self::FixedString => crate::gdd::FIXED_STRING_SIZE,
		}
	}

	/// True for the integer, enum, and float types.
	pub fn is_numeric(self) -> bool {
		matches!(
			self,
			Self::Int8 | Self::Uint8 | Self::Int16 | Self::Uint16 | Self::Enum16 | Self::Int32 | Self::Uint32 | Self::Float32 | Self::Float64
		)
	}

	/// True for the floating point types.
	pub fn is_float(self) -> bool {
		matches!(self, Self::Float32 | Self::Float64)
	}

	/// True for unsigned integer and enum types.
	pub fn is_unsigned(self) -> bool {
		matches!(self, Self::Uint8 | Self::Uint16 | Self::Enum16 | Self::Uint32)
	}

	/// True for the fixed and variable string types.
	pub fn is_string(self) -> bool {
		matches!(self, Self::FixedString | Self::String)
	}

	/// True when the conversion matrix has a row and column for this type.
	pub fn is_convertible(self) -> bool {
		self.is_numeric() || self.is_string()
	}

	/// Inclusive numeric range accepted when parsing text into this type.
	pub fn range(self) -> Option<(f64, f64)> {
		Some(match self {
			Self::Int8 => (f64::from(i8::MIN), f64::from(i8::MAX)),
			Self::Uint8 => (0.0, f64::from(u8::MAX)),
			Self::Int16 => (f64::from(i16::MIN), f64::from(i16::MAX)),
			Self::Uint16 | Self::Enum16 => (0.0, f64::from(u16::MAX)),
			Self::Int32 => (f64::from(i32::MIN), f64::from(i32::MAX)),
			Self::Uint32 => (0.0, f64::from(u32::MAX)),
			Self::Float32 => (-f64::from(f32::MAX), f64::from(f32::MAX)),
			Self::Float64 => (f64::MIN, f64::MAX),
			_ => return None,
		})
	}

	/// Stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Invalid => "invalid",
			Self::Int8 => "int8",
			Self::Uint8 => "uint8",
			Self::Int16 => "int16",
			Self::Uint16 => "uint16",
			Self::Enum16 => "enum16",
			Self::Int32 => "int32",
			Self::Uint32 => "uint32",
			Self::Float32 => "float32",
			Self::Float64 => "float64",
			Self::FixedString => "fixed_string",
			Self::String => "string",
			Self::Container => "container",
		}
	}

	/// Parse a label produced by [`PrimitiveType::as_str`].
	pub fn from_name(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|prim| prim.as_str() == name)
	}
}

impl fmt::Display for PrimitiveType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
