use std::ops::Range;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::gdd::{AitString, FixedString, PrimitiveType};

/// Enumeration index, kept distinct from [`u16`] so enum slots dispatch separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Enum16(pub u16);

/// Inline scalar payload of a dimension-0 value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Scalar {
	/// No value.
	#[default]
	Invalid,
	/// Signed 8-bit integer.
	Int8(i8),
	/// Unsigned 8-bit integer.
	Uint8(u8),
	/// Signed 16-bit integer.
	Int16(i16),
	/// Unsigned 16-bit integer.
	Uint16(u16),
	/// Enumeration index.
	Enum16(Enum16),
	/// Signed 32-bit integer.
	Int32(i32),
	/// Unsigned 32-bit integer.
	Uint32(u32),
	/// Single precision float.
	Float32(f32),
	/// Double precision float.
	Float64(f64),
	/// Fixed capacity string.
	FixedString(Box<FixedString>),
	/// Variable length string.
	String(AitString),
}

impl Scalar {
	/// Zero value for `prim`; invalid and container map to [`Scalar::Invalid`].
	pub fn default_for(prim: PrimitiveType) -> Self {
		match prim {
			PrimitiveType::Invalid | PrimitiveType::Container => Self::Invalid,
			PrimitiveType::Int8 => Self::Int8(0),
			PrimitiveType::Uint8 => Self::Uint8(0),
			PrimitiveType::Int16 => Self::Int16(0),
			PrimitiveType::Uint16 => Self::Uint16(0),
			PrimitiveType::Enum16 => Self::Enum16(Enum16(0)),
			PrimitiveType::Int32 => Self::Int32(0),
			PrimitiveType::Uint32 => Self::Uint32(0),
			PrimitiveType::Float32 => Self::Float32(0.0),
			PrimitiveType::Float64 => Self::Float64(0.0),
			PrimitiveType::FixedString => Self::FixedString(Box::default()),
			PrimitiveType::String => Self::String(AitString::new()),
		}
	}

	/// Primitive type of the stored value.
	pub fn primitive_type(&self) -> PrimitiveType {
		match self {
			Self::Invalid => PrimitiveType::Invalid,
			Self::Int8(_) => PrimitiveType::Int8,
			Self::Uint8(_) => PrimitiveType::Uint8,
			Self::Int16(_) => PrimitiveType::Int16,
			Self::Uint16(_) => PrimitiveType::Uint16,
			Self::Enum16(_) => PrimitiveType::Enum16,
			Self::Int32(_) => PrimitiveType::Int32,
			Self::Uint32(_) => PrimitiveType::Uint32,
			Self::Float32(_) => PrimitiveType::Float32,
			Self::Float64(_) => PrimitiveType::Float64,
			Self::FixedString(_) => PrimitiveType::FixedString,
			Self::String(_) => PrimitiveType::String,
		}
	}

	/// One-element view of the value.
	pub fn as_elems(&self) -> Option<Elems<'_>> {
		Some(match self {
			Self::Invalid => return None,
			Self::Int8(v) => Elems::Int8(std::slice::from_ref(v)),
			Self::Uint8(v) => Elems::Uint8(std::slice::from_ref(v)),
			Self::Int16(v) => Elems::Int16(std::slice::from_ref(v)),
			Self::Uint16(v) => Elems::Uint16(std::slice::from_ref(v)),
			Self::Enum16(v) => Elems::Enum16(std::slice::from_ref(v)),
			Self::Int32(v) => Elems::Int32(std::slice::from_ref(v)),
			Self::Uint32(v) => Elems::Uint32(std::slice::from_ref(v)),
			Self::Float32(v) => Elems::Float32(std::slice::from_ref(v)),
			Self::Float64(v) => Elems::Float64(std::slice::from_ref(v)),
			Self::FixedString(v) => Elems::FixedString(std::slice::from_ref(&**v)),
			Self::String(v) => Elems::String(std::slice::from_ref(v)),
		})
	}

	/// Mutable one-element view of the value.
	pub fn as_elems_mut(&mut self) -> Option<ElemsMut<'_>> {
		Some(match self {
			Self::Invalid => return None,
			Self::Int8(v) => ElemsMut::Int8(std::slice::from_mut(v)),
			Self::Uint8(v) => ElemsMut::Uint8(std::slice::from_mut(v)),
			Self::Int16(v) => ElemsMut::Int16(std::slice::from_mut(v)),
			Self::Uint16(v) => ElemsMut::Uint16(std::slice::from_mut(v)),
			Self::Enum16(v) => ElemsMut::Enum16(std::slice::from_mut(v)),
			Self::Int32(v) => ElemsMut::Int32(std::slice::from_mut(v)),
			Self::Uint32(v) => ElemsMut::Uint32(std::slice::from_mut(v)),
			Self::Float32(v) => ElemsMut::Float32(std::slice::from_mut(v)),
			Self::Float64(v) => ElemsMut::Float64(std::slice::from_mut(v)),
			Self::FixedString(v) => ElemsMut::FixedString(std::slice::from_mut(&mut **v)),
			Self::String(v) => ElemsMut::String(std::slice::from_mut(v)),
		})
	}
}

macro_rules! each_variant {
	($value:expr, $ty:ident, $inner:ident => $body:expr) => {
		match $value {
			$ty::Int8($inner) => $body,
			$ty::Uint8($inner) => $body,
			$ty::Int16($inner) => $body,
			$ty::Uint16($inner) => $body,
			$ty::Enum16($inner) => $body,
			$ty::Int32($inner) => $body,
			$ty::Uint32($inner) => $body,
			$ty::Float32($inner) => $body,
			$ty::Float64($inner) => $body,
			$ty::FixedString($inner) => $body,
			$ty::String($inner) => $body,
		}
	};
}

macro_rules! map_variant {
	($value:expr, $from:ident => $to:ident, $inner:ident => $body:expr) => {
		match $value {
			$from::Int8($inner) => $to::Int8($body),
			$from::Uint8($inner) => $to::Uint8($body),
			$from::Int16($inner) => $to::Int16($body),
			$from::Uint16($inner) => $to::Uint16($body),
			$from::Enum16($inner) => $to::Enum16($body),
			$from::Int32($inner) => $to::Int32($body),
			$from::Uint32($inner) => $to::Uint32($body),
			$from::Float32($inner) => $to::Float32($body),
			$from::Float64($inner) => $to::Float64($body),
			$from::FixedString($inner) => $to::FixedString($body),
			$from::String($inner) => $to::String($body),
		}
	};
}

macro_rules! elem_kind {
	($value:expr, $ty:ident) => {
		match $value {
			$ty::Int8(_) => PrimitiveType::Int8,
			$ty::Uint8(_) => PrimitiveType::Uint8,
			$ty::Int16(_) => PrimitiveType::Int16,
			$ty::Uint16(_) => PrimitiveType::Uint16,
			$ty::Enum16(_) => PrimitiveType::Enum16,
			$ty::Int32(_) => PrimitiveType::Int32,
			$ty::Uint32(_) => PrimitiveType::Uint32,
			$ty::Float32(_) => PrimitiveType::Float32,
			$ty::Float64(_) => PrimitiveType::Float64,
			$ty::FixedString(_) => PrimitiveType::FixedString,
			$ty::String(_) => PrimitiveType::String,
		}
	};
}

/// Owned typed array storage.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
	/// Signed 8-bit elements.
	Int8(Vec<i8>),
	/// Unsigned 8-bit elements.
	Uint8(Vec<u8>),
	/// Signed 16-bit elements.
	Int16(Vec<i16>),
	/// Unsigned 16-bit elements.
	Uint16(Vec<u16>),
	/// Enumeration elements.
	Enum16(Vec<Enum16>),
	/// Signed 32-bit elements.
	Int32(Vec<i32>),
	/// Unsigned 32-bit elements.
	Uint32(Vec<u32>),
	/// Single precision elements.
	Float32(Vec<f32>),
	/// Double precision elements.
	Float64(Vec<f64>),
	/// Fixed string elements.
	FixedString(Vec<FixedString>),
	/// Variable string elements.
	String(Vec<AitString>),
}

impl ArrayData {
	/// Zero-filled storage of `len` elements; `None` for invalid and container.
	pub fn zeroed(prim: PrimitiveType, len: usize) -> Option<Self> {
		Some(match prim {
			PrimitiveType::Invalid | PrimitiveType::Container => return None,
			PrimitiveType::Int8 => Self::Int8(vec![0; len]),
			PrimitiveType::Uint8 => Self::Uint8(vec![0; len]),
			PrimitiveType::Int16 => Self::Int16(vec![0; len]),
			PrimitiveType::Uint16 => Self::Uint16(vec![0; len]),
			PrimitiveType::Enum16 => Self::Enum16(vec![Enum16(0); len]),
			PrimitiveType::Int32 => Self::Int32(vec![0; len]),
			PrimitiveType::Uint32 => Self::Uint32(vec![0; len]),
			PrimitiveType::Float32 => Self::Float32(vec![0.0; len]),
			PrimitiveType::Float64 => Self::Float64(vec![0.0; len]),
			PrimitiveType::FixedString => Self::FixedString(vec![FixedString::default(); len]),
			PrimitiveType::String => Self::String((0..len).map(|_| AitString::new()).collect()),
		})
	}

	/// Element type.
	pub fn primitive_type(&self) -> PrimitiveType {
		elem_kind!(self, ArrayData)
	}

	/// Number of elements.
	pub fn len(&self) -> usize {
		each_variant!(self, ArrayData, values => values.len())
	}

	/// True when no elements are stored.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Shared element view.
	pub fn as_elems(&self) -> Elems<'_> {
		map_variant!(self, ArrayData => Elems, values => values.as_slice())
	}

	/// Mutable element view.
	pub fn as_elems_mut(&mut self) -> ElemsMut<'_> {
		map_variant!(self, ArrayData => ElemsMut, values => values.as_mut_slice())
	}

	/// First element as a scalar payload.
	pub fn first_scalar(&self) -> Option<Scalar> {
		Some(match self {
			Self::Int8(values) => Scalar::Int8(*values.first()?),
			Self::Uint8(values) => Scalar::Uint8(*values.first()?),
			Self::Int16(values) => Scalar::Int16(*values.first()?),
			Self::Uint16(values) => Scalar::Uint16(*values.first()?),
			Self::Enum16(values) => Scalar::Enum16(*values.first()?),
			Self::Int32(values) => Scalar::Int32(*values.first()?),
			Self::Uint32(values) => Scalar::Uint32(*values.first()?),
			Self::Float32(values) => Scalar::Float32(*values.first()?),
			Self::Float64(values) => Scalar::Float64(*values.first()?),
			Self::FixedString(values) => Scalar::FixedString(Box::new(*values.first()?)),
			Self::String(values) => Scalar::String(values.first()?.clone()),
		})
	}

	/// Reset elements in `range` to their zero value.
	pub fn zero_range(&mut self, range: Range<usize>) {
		match self {
			Self::Int8(values) => values[range].fill(0),
			Self::Uint8(values) => values[range].fill(0),
			Self::Int16(values) => values[range].fill(0),
			Self::Uint16(values) => values[range].fill(0),
			Self::Enum16(values) => values[range].fill(Enum16(0)),
			Self::Int32(values) => values[range].fill(0),
			Self::Uint32(values) => values[range].fill(0),
			Self::Float32(values) => values[range].fill(0.0),
			Self::Float64(values) => values[range].fill(0.0),
			Self::FixedString(values) => values[range].fill(FixedString::default()),
			Self::String(values) => values[range].iter_mut().for_each(|value| *value = AitString::new()),
		}
	}
}

/// Borrowed typed element slice.
#[derive(Debug, Clone, Copy)]
pub enum Elems<'a> {
	/// Signed 8-bit elements.
	Int8(&'a [i8]),
	/// Unsigned 8-bit elements.
	Uint8(&'a [u8]),
	/// Signed 16-bit elements.
	Int16(&'a [i16]),
	/// Unsigned 16-bit elements.
	Uint16(&'a [u16]),
	/// Enumeration elements.
	Enum16(&'a [Enum16]),
	/// Signed 32-bit elements.
	Int32(&'a [i32]),
	/// Unsigned 32-bit elements.
	Uint32(&'a [u32]),
	/// Single precision elements.
	Float32(&'a [f32]),
	/// Double precision elements.
	Float64(&'a [f64]),
	/// Fixed string elements.
	FixedString(&'a [FixedString]),
	/// Variable string elements.
	String(&'a [AitString]),
}

impl<'a> Elems<'a> {
	/// Element type.
	pub fn primitive_type(&self) -> PrimitiveType {
		elem_kind!(self, Elems)
	}

	/// Number of elements.
	pub fn len(&self) -> usize {
		each_variant!(self, Elems, values => values.len())
	}

	/// True when empty.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Sub-slice, `None` when `range` is out of bounds.
	pub fn range(self, range: Range<usize>) -> Option<Elems<'a>> {
		if range.start > range.end || range.end > self.len() {
			return None;
		}
		Some(map_variant!(self, Elems => Elems, values => &values[range]))
	}

	/// Copy the elements into owned storage.
	pub fn to_array(&self) -> ArrayData {
		map_variant!(self, Elems => ArrayData, values => values.to_vec())
	}
}

/// Mutable typed element slice.
#[derive(Debug)]
pub enum ElemsMut<'a> {
	/// Signed 8-bit elements.
	Int8(&'a mut [i8]),
	/// Unsigned 8-bit elements.
	Uint8(&'a mut [u8]),
	/// Signed 16-bit elements.
	Int16(&'a mut [i16]),
	/// Unsigned 16-bit elements.
	Uint16(&'a mut [u16]),
	/// Enumeration elements.
	Enum16(&'a mut [Enum16]),
	/// Signed 32-bit elements.
	Int32(&'a mut [i32]),
	/// Unsigned 32-bit elements.
	Uint32(&'a mut [u32]),
	/// Single precision elements.
	Float32(&'a mut [f32]),
	/// Double precision elements.
	Float64(&'a mut [f64]),
	/// Fixed string elements.
	FixedString(&'a mut [FixedString]),
	/// Variable string elements.
	String(&'a mut [AitString]),
}

impl<'a> ElemsMut<'a> {
	/// Element type.
	pub fn primitive_type(&self) -> PrimitiveType {
		elem_kind!(self, ElemsMut)
	}

	/// Number of elements.
	pub fn len(&self) -> usize {
		each_variant!(self, ElemsMut, values => values.len())
	}

	/// True when empty.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Mutable sub-slice, `None` when `range` is out of bounds.
	pub fn range(self, range: Range<usize>) -> Option<ElemsMut<'a>> {
		if range.start > range.end || range.end > self.len() {
			return None;
		}
		Some(map_variant!(self, ElemsMut => ElemsMut, values => &mut values[range]))
	}
}

/// Shared, lockable array storage.
///
/// Clones alias the same elements; writes through one handle are visible
/// through every other.
#[derive(Debug, Clone)]
pub struct ArrayBuffer {
	inner: Arc<Mutex<ArrayData>>,
}

impl ArrayBuffer {
	/// Wrap owned storage.
	pub fn new(data: ArrayData) -> Self {
		Self {
			inner: Arc::new(Mutex::new(data)),
		}
	}

	/// Lock the elements.
	pub fn lock(&self) -> MutexGuard<'_, ArrayData> {
		self.inner.lock()
	}

	/// Owned copy of the current elements.
	pub fn snapshot(&self) -> ArrayData {
		self.inner.lock().clone()
	}

	/// True when both handles alias the same storage.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	/// Take the storage back if this is the last handle.
	pub fn try_into_inner(self) -> Result<ArrayData, Self> {
		Arc::try_unwrap(self.inner).map(Mutex::into_inner).map_err(|inner| Self { inner })
	}
}
