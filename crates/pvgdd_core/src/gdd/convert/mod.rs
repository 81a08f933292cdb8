//! Primitive conversion matrix.
//!
//! Every supported (destination, source) pair owns one function pointer in a
//! compile-time table. Two extra tables wrap the same cells with a byte swap
//! on the way out to, or in from, network order.

mod text;

use std::borrow::Cow;
use std::fmt;

use crate::gdd::{AitString, ArrayData, Elems, ElemsMut, Enum16, FixedString, GddError, PrimitiveType, Result, Scalar};

/// Conversion cell signature: convert `count` elements of `src` into `dst`.
pub type ConvertFn = fn(&mut ElemsMut<'_>, Elems<'_>, usize, &ConvertOptions<'_>) -> Result<usize>;

/// Full dispatch table indexed by `[destination][source]` discriminant.
pub type ConversionTable = [[Option<ConvertFn>; PrimitiveType::COUNT]; PrimitiveType::COUNT];

/// Which byte-order variant of the matrix to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	/// Native order on both sides.
	Normal,
	/// Result is written in network order.
	ToNet,
	/// Source is read from network order.
	FromNet,
}

/// Choice-string lookup injected into enum/string conversions.
pub trait EnumStrings: Send + Sync {
	/// Number of defined choices.
	fn count(&self) -> usize;

	/// Label for `index`, if defined.
	fn label(&self, index: u16) -> Option<&str>;

	/// Index of `label`, if defined.
	fn index_of(&self, label: &str) -> Option<u16> {
		(0..self.count())
			.filter_map(|index| u16::try_from(index).ok())
			.find(|index| self.label(*index) == Some(label))
	}
}

/// Owned list of enum choice strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnumStringTable {
	labels: Vec<String>,
}

impl EnumStringTable {
	/// Build from choice labels in index order.
	pub fn new<I, S>(labels: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			labels: labels.into_iter().map(Into::into).collect(),
		}
	}

	/// Append a choice.
	pub fn push(&mut self, label: impl Into<String>) {
		self.labels.push(label.into());
	}
}

impl EnumStrings for EnumStringTable {
	fn count(&self) -> usize {
		self.labels.len()
	}

	fn label(&self, index: u16) -> Option<&str> {
		self.labels.get(usize::from(index)).map(String::as_str)
	}
}

/// Knobs shared by every conversion cell.
#[derive(Clone, Copy)]
pub struct ConvertOptions<'a> {
	/// Significant digits when rendering floats as text.
	pub precision: usize,
	/// Choice strings for enum/string conversions.
	pub enum_strings: Option<&'a dyn EnumStrings>,
}

impl<'a> ConvertOptions<'a> {
	/// Default float precision.
	pub const DEFAULT_PRECISION: usize = 6;

	/// Use `table` for enum/string conversions.
	pub fn with_enum_strings(mut self, table: &'a dyn EnumStrings) -> Self {
		self.enum_strings = Some(table);
		self
	}

	/// Override float precision.
	pub fn with_precision(mut self, precision: usize) -> Self {
		self.precision = precision;
		self
	}
}

impl Default for ConvertOptions<'_> {
	fn default() -> Self {
		Self {
			precision: Self::DEFAULT_PRECISION,
			enum_strings: None,
		}
	}
}

impl fmt::Debug for ConvertOptions<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConvertOptions")
			.field("precision", &self.precision)
			.field("enum_strings", &self.enum_strings.map(|table| table.count()))
			.finish()
	}
}

mod sealed {
	use std::borrow::Cow;

	use crate::gdd::{ConvertOptions, Result};

	/// Value staged between source and destination cells.
	pub enum Staged<'a> {
		Int(i64),
		Float(f64),
		Enum(u16),
		Text(Cow<'a, str>),
	}

	pub trait Convert: Sized {
		fn stage(&self) -> Staged<'_>;
		fn unstage(value: Staged<'_>, opts: &ConvertOptions<'_>) -> Result<Self>;
		fn swapped(&self) -> Self;
	}
}

use sealed::{Convert, Staged};

/// Element types that can be stored in and converted by tagged values.
pub trait Element: Convert + Clone + Send + Sync + 'static {
	/// Primitive type this element represents.
	const PRIM: PrimitiveType;

	/// Typed view of `elems`, `None` when the element type differs.
	fn slice(elems: Elems<'_>) -> Option<&[Self]>;

	/// Typed mutable view of `elems`, `None` when the element type differs.
	fn slice_mut<'s>(elems: &'s mut ElemsMut<'_>) -> Option<&'s mut [Self]>;

	/// Wrap owned elements as array storage.
	fn into_array(values: Vec<Self>) -> ArrayData;

	/// Wrap one element as a scalar payload.
	fn into_scalar(self) -> Scalar;
}

macro_rules! element_views {
	($ty:ty, $variant:ident) => {
		const PRIM: PrimitiveType = PrimitiveType::$variant;

		fn slice(elems: Elems<'_>) -> Option<&[Self]> {
			match elems {
				Elems::$variant(values) => Some(values),
				_ => None,
			}
		}

		fn slice_mut<'s>(elems: &'s mut ElemsMut<'_>) -> Option<&'s mut [Self]> {
			match elems {
				ElemsMut::$variant(values) => Some(&mut **values),
				_ => None,
			}
		}

		fn into_array(values: Vec<Self>) -> ArrayData {
			ArrayData::$variant(values)
		}
	};
}

macro_rules! numeric_element {
	($ty:ty, $variant:ident, $stage:ident) => {
		impl Convert for $ty {
			fn stage(&self) -> Staged<'_> {
				Staged::$stage((*self).into())
			}

			fn unstage(value: Staged<'_>, opts: &ConvertOptions<'_>) -> Result<Self> {
				Ok(match value {
					Staged::Int(value) => value as $ty,
					Staged::Float(value) => value as $ty,
					Staged::Enum(value) => value as $ty,
					Staged::Text(text) => match text::parse_number(&text, PrimitiveType::$variant, opts)? {
						text::Number::Int(value) => value as $ty,
						text::Number::Float(value) => value as $ty,
					},
				})
			}

			fn swapped(&self) -> Self {
				<$ty>::from_ne_bytes({
					let mut bytes = self.to_ne_bytes();
					bytes.reverse();
					bytes
				})
			}
		}

		impl Element for $ty {
			element_views!($ty, $variant);

			fn into_scalar(self) -> Scalar {
				Scalar::$variant(self)
			}
		}
	};
}

numeric_element!(i8, Int8, Int);
numeric_element!(u8, Uint8, Int);
numeric_element!(i16, Int16, Int);
numeric_element!(u16, Uint16, Int);
numeric_element!(i32, Int32, Int);
numeric_element!(u32, Uint32, Int);
numeric_element!(f32, Float32, Float);
numeric_element!(f64, Float64, Float);

impl Convert for Enum16 {
	fn stage(&self) -> Staged<'_> {
		Staged::Enum(self.0)
	}

	fn unstage(value: Staged<'_>, opts: &ConvertOptions<'_>) -> Result<Self> {
		Ok(Enum16(match value {
			Staged::Int(value) => value as u16,
			Staged::Float(value) => value as u16,
			Staged::Enum(value) => value,
			Staged::Text(text) => match text::parse_number(&text, PrimitiveType::Enum16, opts)? {
				text::Number::Int(value) => value as u16,
				text::Number::Float(value) => value as u16,
			},
		}))
	}

	fn swapped(&self) -> Self {
		Enum16(self.0.swap_bytes())
	}
}

impl Element for Enum16 {
	element_views!(Enum16, Enum16);

	fn into_scalar(self) -> Scalar {
		Scalar::Enum16(self)
	}
}

fn render(value: Staged<'_>, opts: &ConvertOptions<'_>) -> String {
	match value {
		Staged::Int(value) => value.to_string(),
		Staged::Float(value) => text::format_float(value, opts.precision),
		Staged::Enum(index) => text::enum_label(index, opts).into_owned(),
		Staged::Text(text) => text.into_owned(),
	}
}

impl Convert for FixedString {
	fn stage(&self) -> Staged<'_> {
		Staged::Text(self.to_str_lossy())
	}

	fn unstage(value: Staged<'_>, opts: &ConvertOptions<'_>) -> Result<Self> {
		Ok(match value {
			Staged::Text(text) => FixedString::new(&text),
			other => FixedString::new(&render(other, opts)),
		})
	}

	fn swapped(&self) -> Self {
		*self
	}
}

impl Element for FixedString {
	element_views!(FixedString, FixedString);

	fn into_scalar(self) -> Scalar {
		Scalar::FixedString(Box::new(self))
	}
}

impl Convert for AitString {
	fn stage(&self) -> Staged<'_> {
		Staged::Text(Cow::Borrowed(self.as_str()))
	}

	fn unstage(value: Staged<'_>, opts: &ConvertOptions<'_>) -> Result<Self> {
		Ok(AitString::copied(&render(value, opts)))
	}

	fn swapped(&self) -> Self {
		self.clone()
	}
}

impl Element for AitString {
	element_views!(AitString, String);

	fn into_scalar(self) -> Scalar {
		Scalar::String(self)
	}
}

const NORMAL_MODE: u8 = 0;
const TO_NET_MODE: u8 = 1;
const FROM_NET_MODE: u8 = 2;

fn cell<D: Element, S: Element, const MODE: u8>(dst: &mut ElemsMut<'_>, src: Elems<'_>, count: usize, opts: &ConvertOptions<'_>) -> Result<usize> {
	let out = D::slice_mut(dst).ok_or(GddError::TypeMismatch {
		detail: "destination elements do not match conversion cell",
	})?;
	if out.len() < count {
		return Err(GddError::OutOfBounds { index: count, len: out.len() });
	}

	if D::PRIM == S::PRIM {
		let input = D::slice(src).ok_or(GddError::TypeMismatch {
			detail: "source elements do not match conversion cell",
		})?;
		if input.len() < count {
			return Err(GddError::OutOfBounds { index: count, len: input.len() });
		}
		for (slot, value) in out[..count].iter_mut().zip(input) {
			*slot = if MODE == NORMAL_MODE { value.clone() } else { value.swapped() };
		}
		return Ok(count);
	}

	let input = S::slice(src).ok_or(GddError::TypeMismatch {
		detail: "source elements do not match conversion cell",
	})?;
	if input.len() < count {
		return Err(GddError::OutOfBounds { index: count, len: input.len() });
	}
	for (slot, value) in out[..count].iter_mut().zip(input) {
		*slot = match MODE {
			TO_NET_MODE => D::unstage(value.stage(), opts)?.swapped(),
			FROM_NET_MODE => {
				let native = value.swapped();
				D::unstage(native.stage(), opts)?
			}
			_ => D::unstage(value.stage(), opts)?,
		};
	}
	Ok(count)
}

macro_rules! table_row {
	($mode:ident, $dst:ty) => {
		[
			None,
			Some(cell::<$dst, i8, $mode> as ConvertFn),
			Some(cell::<$dst, u8, $mode> as ConvertFn),
			Some(cell::<$dst, i16, $mode> as ConvertFn),
			Some(cell::<$dst, u16, $mode> as ConvertFn),
			Some(cell::<$dst, Enum16, $mode> as ConvertFn),
			Some(cell::<$dst, i32, $mode> as ConvertFn),
			Some(cell::<$dst, u32, $mode> as ConvertFn),
			Some(cell::<$dst, f32, $mode> as ConvertFn),
			Some(cell::<$dst, f64, $mode> as ConvertFn),
			Some(cell::<$dst, FixedString, $mode> as ConvertFn),
			Some(cell::<$dst, AitString, $mode> as ConvertFn),
			None,
		]
	};
}

macro_rules! table {
	($mode:ident) => {
		[
			[None; PrimitiveType::COUNT],
			table_row!($mode, i8),
			table_row!($mode, u8),
			table_row!($mode, i16),
			table_row!($mode, u16),
			table_row!($mode, Enum16),
			table_row!($mode, i32),
			table_row!($mode, u32),
			table_row!($mode, f32),
			table_row!($mode, f64),
			table_row!($mode, FixedString),
			table_row!($mode, AitString),
			[None; PrimitiveType::COUNT],
		]
	};
}

static NORMAL: ConversionTable = table!(NORMAL_MODE);

#[cfg(target_endian = "little")]
static TO_NET_TABLE: ConversionTable = table!(TO_NET_MODE);
#[cfg(target_endian = "little")]
static FROM_NET_TABLE: ConversionTable = table!(FROM_NET_MODE);

#[cfg(target_endian = "little")]
static TO_NET: &ConversionTable = &TO_NET_TABLE;
#[cfg(target_endian = "little")]
static FROM_NET: &ConversionTable = &FROM_NET_TABLE;

// Network order is native order here, so the swap tables are the base table.
#[cfg(target_endian = "big")]
static TO_NET: &ConversionTable = &NORMAL;
#[cfg(target_endian = "big")]
static FROM_NET: &ConversionTable = &NORMAL;

/// Dispatch table for `direction`.
pub fn table(direction: Direction) -> &'static ConversionTable {
	match direction {
		Direction::Normal => &NORMAL,
		Direction::ToNet => TO_NET,
		Direction::FromNet => FROM_NET,
	}
}

/// Look up the cell converting `src` into `dest`.
pub fn lookup(direction: Direction, src: PrimitiveType, dest: PrimitiveType) -> Option<ConvertFn> {
	table(direction)[dest.index()][src.index()]
}

/// Convert `count` elements of `src` into `dst` through the native table.
pub fn convert(dst: &mut ElemsMut<'_>, src: Elems<'_>, count: usize, opts: &ConvertOptions<'_>) -> Result<usize> {
	convert_with(Direction::Normal, dst, src, count, opts)
}

/// Convert `count` elements through the table selected by `direction`.
///
/// Pairs without a cell fail before anything is written. Cells that fail
/// midway leave earlier elements converted.
pub fn convert_with(direction: Direction, dst: &mut ElemsMut<'_>, src: Elems<'_>, count: usize, opts: &ConvertOptions<'_>) -> Result<usize> {
	let (src_type, dest_type) = (src.primitive_type(), dst.primitive_type());
	let cell = lookup(direction, src_type, dest_type);
	debug_assert!(cell.is_some(), "conversion matrix has no {direction:?} cell for {src_type} -> {dest_type}");
	let cell = cell.ok_or(GddError::NoConversion {
		src: src_type,
		dest: dest_type,
	})?;
	tracing::trace!(?direction, %src_type, %dest_type, count, "convert");
	cell(dst, src, count, opts)
}

#[cfg(test)]
mod tests;
