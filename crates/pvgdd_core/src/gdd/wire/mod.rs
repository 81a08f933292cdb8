//! Byte-stream header and data codec.
//!
//! A header is the `HEAD` magic, the shape and tags of one value, its packed
//! status word, its time stamp, and its bounds. Data follows as converted
//! elements. Network format is big-endian, local format is host order.

use crate::gdd::bounds::{byte_len, element_product};
use crate::gdd::bytes::{Cursor, CursorMut};
use crate::gdd::value::ArrayCapture;
use crate::gdd::{
	AitString, ArrayData, Bounds, BoundsVec, ConvertOptions, DataFormat, Elems, Enum16, FIXED_STRING_SIZE, FixedString, GddError, PrimitiveType, Result, TaggedValue, TimeStamp,
	convert,
};

/// Leading magic of every header.
pub const HEADER_MAGIC: [u8; 4] = *b"HEAD";

const FIXED_HEADER_SIZE: usize = 20;

/// Decoded value header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireHeader {
	/// Primitive type of the data that follows.
	pub prim: PrimitiveType,
	/// Application type tag.
	pub app: u16,
	/// Alarm status.
	pub stat: u16,
	/// Alarm severity.
	pub sevr: u16,
	/// Time stamp.
	pub time: TimeStamp,
	/// One entry per axis; empty for scalars.
	pub bounds: BoundsVec,
}

impl WireHeader {
	/// Header describing `value`.
	pub fn of(value: &TaggedValue) -> Self {
		let state = value.lock();
		Self {
			prim: state.prim,
			app: state.app,
			stat: state.stat,
			sevr: state.sevr,
			time: state.time,
			bounds: state.bounds.clone(),
		}
	}

	/// Encoded size of a header with `dim` axes.
	pub fn size_for(dim: usize) -> usize {
		FIXED_HEADER_SIZE + dim * 8
	}

	/// Encoded size of this header.
	pub fn encoded_len(&self) -> usize {
		Self::size_for(self.bounds.len())
	}

	/// Number of axes.
	pub fn dimension(&self) -> u8 {
		u8::try_from(self.bounds.len()).unwrap_or(u8::MAX)
	}

	/// Elements the header describes, `1` for scalars.
	pub fn element_count(&self) -> Result<usize> {
		element_product(&self.bounds)
	}

	/// Decode a header from the front of `buf`; returns it with the bytes consumed.
	pub fn parse(buf: &[u8], format: DataFormat) -> Result<(Self, usize)> {
		if !buf.starts_with(&HEADER_MAGIC) {
			let mut magic = [0_u8; 4];
			let len = buf.len().min(4);
			magic[..len].copy_from_slice(&buf[..len]);
			return Err(GddError::BadHeader { magic });
		}

		let mut cursor = Cursor::new(buf);
		let _ = cursor.read_code4()?;
		let dim = cursor.read_u8()?;
		let prim = PrimitiveType::from_u8(cursor.read_u8()?).ok_or(GddError::TypeMismatch {
			detail: "unknown primitive type in header",
		})?;
		let app = cursor.read_u16(format)?;
		let status = cursor.read_u32(format)?;
		let sec = cursor.read_u32(format)?;
		let nsec = cursor.read_u32(format)?;

		let mut bounds = BoundsVec::with_capacity(usize::from(dim));
		for _ in 0..dim {
			let size = cursor.read_u32(format)?;
			let first = cursor.read_u32(format)?;
			bounds.push(Bounds::new(first, size));
		}
		tracing::trace!(%prim, app, dim, "parsed wire header");

		Ok((
			Self {
				prim,
				app,
				stat: (status & 0xffff) as u16,
				sevr: (status >> 16) as u16,
				time: TimeStamp::new(sec, nsec),
				bounds,
			},
			cursor.pos(),
		))
	}

	/// Encode into the front of `buf`; returns the bytes written.
	pub fn write(&self, buf: &mut [u8], format: DataFormat) -> Result<usize> {
		let need = self.encoded_len();
		if buf.len() < need {
			return Err(GddError::BufferTooSmall { need, have: buf.len() });
		}
		let mut out = CursorMut::new(buf);
		out.write_bytes(&HEADER_MAGIC)?;
		out.write_u8(self.dimension())?;
		out.write_u8(self.prim as u8)?;
		out.write_u16(self.app, format)?;
		out.write_u32((u32::from(self.sevr) << 16) | u32::from(self.stat), format)?;
		out.write_u32(self.time.sec, format)?;
		out.write_u32(self.time.nsec, format)?;
		for axis in &self.bounds {
			out.write_u32(axis.size, format)?;
			out.write_u32(axis.first, format)?;
		}
		Ok(out.pos())
	}
}

macro_rules! encode_ne {
	($out:expr, $values:expr, $swap:expr, $bytes:expr) => {
		for value in $values.iter() {
			let raw = $bytes(value);
			if $swap {
				$out.extend(raw.iter().rev());
			} else {
				$out.extend_from_slice(&raw);
			}
		}
	};
}

/// Append `elems` in `format` order. Variable strings are length-prefixed.
pub(crate) fn encode_elems(out: &mut Vec<u8>, elems: Elems<'_>, format: DataFormat) {
	let swap = !format.is_native();
	match elems {
		Elems::Int8(values) => encode_ne!(out, values, swap, |v: &i8| v.to_ne_bytes()),
		Elems::Uint8(values) => out.extend_from_slice(values),
		Elems::Int16(values) => encode_ne!(out, values, swap, |v: &i16| v.to_ne_bytes()),
		Elems::Uint16(values) => encode_ne!(out, values, swap, |v: &u16| v.to_ne_bytes()),
		Elems::Enum16(values) => encode_ne!(out, values, swap, |v: &Enum16| v.0.to_ne_bytes()),
		Elems::Int32(values) => encode_ne!(out, values, swap, |v: &i32| v.to_ne_bytes()),
		Elems::Uint32(values) => encode_ne!(out, values, swap, |v: &u32| v.to_ne_bytes()),
		Elems::Float32(values) => encode_ne!(out, values, swap, |v: &f32| v.to_ne_bytes()),
		Elems::Float64(values) => encode_ne!(out, values, swap, |v: &f64| v.to_ne_bytes()),
		Elems::FixedString(values) => values.iter().for_each(|value| out.extend_from_slice(value.raw())),
		Elems::String(values) => {
			for value in values {
				let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
				out.extend_from_slice(&match format {
					DataFormat::Local => len.to_ne_bytes(),
					DataFormat::Network => len.to_be_bytes(),
				});
				out.extend_from_slice(value.as_str().as_bytes());
			}
		}
	}
}

macro_rules! decode_ne {
	($cursor:expr, $count:expr, $ty:ty, $read:ident, $format:expr, $wrap:expr) => {{
		let mut values = Vec::with_capacity(($count).min($cursor.remaining()));
		for _ in 0..$count {
			values.push($wrap($cursor.$read($format)? as $ty));
		}
		values
	}};
}

/// Read `count` elements of `prim` in `format` order.
pub(crate) fn decode_elems(cursor: &mut Cursor<'_>, prim: PrimitiveType, count: usize, format: DataFormat) -> Result<ArrayData> {
	Ok(match prim {
		PrimitiveType::Int8 => ArrayData::Int8(cursor.read_exact(count)?.iter().map(|byte| *byte as i8).collect()),
		PrimitiveType::Uint8 => ArrayData::Uint8(cursor.read_exact(count)?.to_vec()),
		PrimitiveType::Int16 => ArrayData::Int16(decode_ne!(cursor, count, i16, read_u16, format, std::convert::identity)),
		PrimitiveType::Uint16 => ArrayData::Uint16(decode_ne!(cursor, count, u16, read_u16, format, std::convert::identity)),
		PrimitiveType::Enum16 => ArrayData::Enum16(decode_ne!(cursor, count, u16, read_u16, format, Enum16)),
		PrimitiveType::Int32 => ArrayData::Int32(decode_ne!(cursor, count, i32, read_u32, format, std::convert::identity)),
		PrimitiveType::Uint32 => ArrayData::Uint32(decode_ne!(cursor, count, u32, read_u32, format, std::convert::identity)),
		PrimitiveType::Float32 => ArrayData::Float32(decode_ne!(cursor, count, u32, read_u32, format, f32::from_bits)),
		PrimitiveType::Float64 => ArrayData::Float64(decode_ne!(cursor, count, u64, read_u64, format, f64::from_bits)),
		PrimitiveType::FixedString => {
			let raw = cursor.read_exact(byte_len(count, FIXED_STRING_SIZE)?)?;
			ArrayData::FixedString(raw.chunks_exact(FIXED_STRING_SIZE).map(FixedString::from_bytes).collect())
		}
		PrimitiveType::String => {
			let mut values = Vec::with_capacity(count.min(cursor.remaining()));
			for _ in 0..count {
				let len = cursor.read_u32(format)? as usize;
				let raw = cursor.read_exact(len)?;
				values.push(AitString::copied(&String::from_utf8_lossy(raw)));
			}
			ArrayData::String(values)
		}
		PrimitiveType::Invalid | PrimitiveType::Container => {
			return Err(GddError::TypeMismatch {
				detail: "no wire encoding for primitive type",
			});
		}
	})
}

impl TaggedValue {
	/// Write this value's header into `buf`.
	pub fn out_header(&self, buf: &mut [u8], format: DataFormat) -> Result<usize> {
		WireHeader::of(self).write(buf, format)
	}

	fn encode_data(&self, prim: PrimitiveType, format: DataFormat) -> Result<Vec<u8>> {
		let snapshot = self.snapshot(ArrayCapture::Buffer);
		if snapshot.is_container() {
			return Err(GddError::NotSupported { op: "wire data of container" });
		}
		let target = if prim == PrimitiveType::Invalid { snapshot.prim } else { prim };
		let count = element_product(&snapshot.bounds)?;
		let mut out = Vec::new();
		if count == 0 {
			return Ok(out);
		}

		let source = snapshot.data().ok_or(GddError::OutOfBounds { index: count, len: 0 })?;
		let elems = source.as_elems().range(0..count).ok_or(GddError::OutOfBounds { index: count, len: source.len() })?;
		let mut converted = ArrayData::zeroed(target, count).ok_or(GddError::TypeMismatch {
			detail: "no wire encoding for primitive type",
		})?;
		convert(&mut converted.as_elems_mut(), elems, count, &ConvertOptions::default())?;
		encode_elems(&mut out, converted.as_elems(), format);
		Ok(out)
	}

	/// Write the described elements into `buf`, converted to `prim`.
	///
	/// [`PrimitiveType::Invalid`] keeps the value's own type. Returns the
	/// bytes written.
	pub fn out_data(&self, buf: &mut [u8], prim: PrimitiveType, format: DataFormat) -> Result<usize> {
		let data = self.encode_data(prim, format)?;
		if buf.len() < data.len() {
			return Err(GddError::BufferTooSmall {
				need: data.len(),
				have: buf.len(),
			});
		}
		buf[..data.len()].copy_from_slice(&data);
		Ok(data.len())
	}

	/// Write header and data; returns the bytes written.
	pub fn out(&self, buf: &mut [u8], format: DataFormat) -> Result<usize> {
		let header = self.out_header(buf, format)?;
		let data = self.out_data(&mut buf[header..], PrimitiveType::Invalid, format)?;
		Ok(header + data)
	}

	/// Header and data as a new buffer.
	pub fn to_wire(&self, format: DataFormat) -> Result<Vec<u8>> {
		let header = WireHeader::of(self);
		let data = self.encode_data(PrimitiveType::Invalid, format)?;
		let mut out = vec![0_u8; header.encoded_len()];
		header.write(&mut out, format)?;
		out.extend_from_slice(&data);
		Ok(out)
	}

	/// Re-initialise from a header at the front of `buf`; returns the bytes consumed.
	pub fn in_header(&self, buf: &[u8], format: DataFormat) -> Result<usize> {
		let (header, consumed) = WireHeader::parse(buf, format)?;
		self.init(header.app, header.prim, header.dimension())?;
		if !self.is_container() {
			for (index, axis) in header.bounds.iter().enumerate() {
				self.set_bound(index, axis.first, axis.size)?;
			}
		}
		self.set_status(header.stat, header.sevr);
		self.set_time_stamp(header.time);
		Ok(consumed)
	}

	/// Read elements of type `prim` from `buf` into this value.
	///
	/// A non-zero `count` first reshapes the value into a one-dimensional
	/// array of `count` elements; zero uses the described element count.
	/// [`PrimitiveType::Invalid`] reads the value's own type, and an untyped
	/// value adopts `prim`. Returns the bytes consumed.
	pub fn in_data(&self, buf: &[u8], count: usize, prim: PrimitiveType, format: DataFormat) -> Result<usize> {
		let own = self.primitive_type();
		if prim == PrimitiveType::Invalid && own == PrimitiveType::Invalid {
			return Err(GddError::TypeMismatch {
				detail: "in_data without a primitive type",
			});
		}
		let src_type = if prim == PrimitiveType::Invalid { own } else { prim };
		let dest_type = if own == PrimitiveType::Invalid { prim } else { own };

		if count > 0 {
			let size = u32::try_from(count).map_err(|_| GddError::OutOfBounds {
				index: count,
				len: u32::MAX as usize,
			})?;
			self.reset(dest_type, 1, &[size])?;
		}

		let elements = self.described_data_size_elements()?;
		let mut cursor = Cursor::new(buf);
		let source = decode_elems(&mut cursor, src_type, elements, format)?;
		if elements > 0 {
			self.gen_copy(source.as_elems(), DataFormat::Local)?;
		}
		Ok(cursor.pos())
	}

	/// Decode one value from the front of `buf`; returns it with the bytes consumed.
	pub fn from_wire(buf: &[u8], format: DataFormat) -> Result<(TaggedValue, usize)> {
		let value = TaggedValue::new(0);
		let header = value.in_header(buf, format)?;
		let data = value.in_data(&buf[header..], 0, PrimitiveType::Invalid, format)?;
		Ok((value, header + data))
	}
}

#[cfg(test)]
mod tests;
