use crate::gdd::bounds::byte_len;
use crate::gdd::bytes::{Cursor, CursorMut};
use crate::gdd::{ArrayData, DataFormat, Elems, Enum16, FIXED_STRING_SIZE, FixedString, GddError, PrimitiveType, Result, ValueFlags};

use super::NODE_SIZE;

pub(crate) const PRIM_AT: usize = 2;
pub(crate) const MARKER_AT: usize = 5;
pub(crate) const NEXT_AT: usize = 24;
pub(crate) const BOUNDS_AT: usize = 32;
pub(crate) const DATA_AT: usize = 40;

/// Decoded node record; fields appear in buffer order, native endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Record {
	pub(crate) app: u16,
	pub(crate) prim: u8,
	pub(crate) dim: u8,
	pub(crate) flags: u8,
	pub(crate) marker: u8,
	pub(crate) stat: u16,
	pub(crate) sevr: u16,
	pub(crate) nsec: u32,
	pub(crate) sec: u32,
	pub(crate) aux: u32,
	pub(crate) next: u64,
	pub(crate) bounds: u64,
	pub(crate) data: u64,
}

impl Record {
	pub(crate) fn parse(bytes: &[u8], at: usize) -> Result<Self> {
		let raw = bytes.get(at..at + NODE_SIZE).ok_or(GddError::CorruptFlat {
			at,
			reason: "record past end of buffer",
		})?;
		let mut cursor = Cursor::new(raw);
		let local = DataFormat::Local;
		let app = cursor.read_u16(local)?;
		let prim = cursor.read_u8()?;
		let dim = cursor.read_u8()?;
		let flags = cursor.read_u8()?;
		let marker = cursor.read_u8()?;
		let _ = cursor.read_exact(2)?;
		Ok(Self {
			app,
			prim,
			dim,
			flags,
			marker,
			stat: cursor.read_u16(local)?,
			sevr: cursor.read_u16(local)?,
			nsec: cursor.read_u32(local)?,
			sec: cursor.read_u32(local)?,
			aux: cursor.read_u32(local)?,
			next: cursor.read_u64(local)?,
			bounds: cursor.read_u64(local)?,
			data: cursor.read_u64(local)?,
		})
	}

	pub(crate) fn write(&self, bytes: &mut [u8], at: usize) -> Result<()> {
		let have = bytes.len();
		let raw = bytes.get_mut(at..at + NODE_SIZE).ok_or(GddError::BufferTooSmall { need: at + NODE_SIZE, have })?;
		let mut out = CursorMut::new(raw);
		let local = DataFormat::Local;
		out.write_u16(self.app, local)?;
		out.write_u8(self.prim)?;
		out.write_u8(self.dim)?;
		out.write_u8(self.flags)?;
		out.write_u8(self.marker)?;
		out.write_bytes(&[0, 0])?;
		out.write_u16(self.stat, local)?;
		out.write_u16(self.sevr, local)?;
		out.write_u32(self.nsec, local)?;
		out.write_u32(self.sec, local)?;
		out.write_u32(self.aux, local)?;
		out.write_u64(self.next, local)?;
		out.write_u64(self.bounds, local)?;
		out.write_u64(self.data, local)?;
		Ok(())
	}

	pub(crate) fn primitive_type(&self, at: usize) -> Result<PrimitiveType> {
		PrimitiveType::from_u8(self.prim).ok_or(GddError::CorruptFlat {
			at: at + PRIM_AT,
			reason: "unknown primitive type",
		})
	}

	pub(crate) fn value_flags(&self) -> ValueFlags {
		ValueFlags::from_bits_truncate(self.flags)
	}

	/// True when the data field holds a pointer rather than inline bits.
	pub(crate) fn data_is_pointer(&self) -> bool {
		match PrimitiveType::from_u8(self.prim) {
			Some(PrimitiveType::Container | PrimitiveType::String | PrimitiveType::FixedString) => true,
			Some(PrimitiveType::Invalid) | None => false,
			Some(_) => self.dim > 0,
		}
	}
}

pub(crate) fn read_u64_at(bytes: &[u8], at: usize) -> Result<u64> {
	let raw = bytes.get(at..at + 8).ok_or(GddError::CorruptFlat {
		at,
		reason: "pointer field past end of buffer",
	})?;
	Cursor::new(raw).read_u64(DataFormat::Local)
}

pub(crate) fn write_u64_at(bytes: &mut [u8], at: usize, value: u64) -> Result<()> {
	let have = bytes.len();
	let raw = bytes.get_mut(at..at + 8).ok_or(GddError::BufferTooSmall { need: at + 8, have })?;
	CursorMut::new(raw).write_u64(value, DataFormat::Local)
}

macro_rules! write_ne {
	($out:expr, $values:expr, $width:expr, $bytes:expr) => {
		for (chunk, value) in $out.chunks_exact_mut($width).zip($values.iter()) {
			chunk.copy_from_slice(&$bytes(value));
		}
	};
}

/// Write fixed-width elements in host order. Variable strings are skipped.
pub(crate) fn write_elems(out: &mut [u8], elems: Elems<'_>) {
	match elems {
		Elems::Int8(values) => write_ne!(out, values, 1, |v: &i8| v.to_ne_bytes()),
		Elems::Uint8(values) => write_ne!(out, values, 1, |v: &u8| v.to_ne_bytes()),
		Elems::Int16(values) => write_ne!(out, values, 2, |v: &i16| v.to_ne_bytes()),
		Elems::Uint16(values) => write_ne!(out, values, 2, |v: &u16| v.to_ne_bytes()),
		Elems::Enum16(values) => write_ne!(out, values, 2, |v: &Enum16| v.0.to_ne_bytes()),
		Elems::Int32(values) => write_ne!(out, values, 4, |v: &i32| v.to_ne_bytes()),
		Elems::Uint32(values) => write_ne!(out, values, 4, |v: &u32| v.to_ne_bytes()),
		Elems::Float32(values) => write_ne!(out, values, 4, |v: &f32| v.to_ne_bytes()),
		Elems::Float64(values) => write_ne!(out, values, 8, |v: &f64| v.to_ne_bytes()),
		Elems::FixedString(values) => write_ne!(out, values, FIXED_STRING_SIZE, |v: &FixedString| *v.raw()),
		Elems::String(_) => {}
	}
}

macro_rules! read_ne {
	($raw:expr, $count:expr, $ty:ty, $wrap:expr) => {
		$raw.chunks_exact(std::mem::size_of::<$ty>())
			.take($count)
			.map(|chunk| $wrap(<$ty>::from_ne_bytes(chunk.try_into().unwrap_or_default())))
			.collect()
	};
}

/// Decode `count` fixed-width elements of `prim` from host-order bytes.
pub(crate) fn read_elems(prim: PrimitiveType, raw: &[u8], count: usize, at: usize) -> Result<ArrayData> {
	let need = byte_len(count, prim.size())?;
	if raw.len() < need || prim == PrimitiveType::String {
		return Err(GddError::CorruptFlat {
			at,
			reason: "element data past end of buffer",
		});
	}
	Ok(match prim {
		PrimitiveType::Int8 => ArrayData::Int8(read_ne!(raw, count, i8, std::convert::identity)),
		PrimitiveType::Uint8 => ArrayData::Uint8(read_ne!(raw, count, u8, std::convert::identity)),
		PrimitiveType::Int16 => ArrayData::Int16(read_ne!(raw, count, i16, std::convert::identity)),
		PrimitiveType::Uint16 => ArrayData::Uint16(read_ne!(raw, count, u16, std::convert::identity)),
		PrimitiveType::Enum16 => ArrayData::Enum16(read_ne!(raw, count, u16, Enum16)),
		PrimitiveType::Int32 => ArrayData::Int32(read_ne!(raw, count, i32, std::convert::identity)),
		PrimitiveType::Uint32 => ArrayData::Uint32(read_ne!(raw, count, u32, std::convert::identity)),
		PrimitiveType::Float32 => ArrayData::Float32(read_ne!(raw, count, f32, std::convert::identity)),
		PrimitiveType::Float64 => ArrayData::Float64(read_ne!(raw, count, f64, std::convert::identity)),
		PrimitiveType::FixedString => ArrayData::FixedString(raw.chunks_exact(FIXED_STRING_SIZE).take(count).map(FixedString::from_bytes).collect()),
		PrimitiveType::Invalid | PrimitiveType::Container | PrimitiveType::String => {
			return Err(GddError::CorruptFlat {
				at,
				reason: "primitive type has no fixed-width elements",
			});
		}
	})
}
