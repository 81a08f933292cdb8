use crate::gdd::bounds::byte_len;
use crate::gdd::bytes::Cursor;
use crate::gdd::value::{ArrayRef, NodeState, Payload};
use crate::gdd::{AitString, ArrayData, Bounds, DataFormat, FIXED_STRING_SIZE, FixedString, GddError, PrimitiveType, Result, Scalar, TaggedValue, ValueFlags};

use super::record::{BOUNDS_AT, DATA_AT, Record, read_elems};
use super::{BOUNDS_SIZE, FlatEncoding, FlatValue, NODE_SIZE, STRING_INDEX_SIZE};

impl FlatValue {
	/// Materialise a live tree from this buffer.
	///
	/// Pointers must be addresses; convert received offset buffers first.
	/// Materialised nodes keep the flat and no-reference markers.
	pub fn to_value(&self) -> Result<TaggedValue> {
		if self.encoding != FlatEncoding::Addresses {
			return Err(GddError::NotAllowed {
				op: "to_value on offset-encoded buffer",
			});
		}
		let root = Record::parse(&self.bytes, 0)?;
		if !root.value_flags().contains(ValueFlags::FLAT) {
			return Err(GddError::NotAllowed { op: "to_value on unflattened buffer" });
		}
		let mut budget = self.bytes.len() / NODE_SIZE;
		self.node(0, &mut budget)
	}

	fn node(&self, at: usize, budget: &mut usize) -> Result<TaggedValue> {
		*budget = budget.checked_sub(1).ok_or(GddError::CorruptFlat {
			at,
			reason: "more records than the buffer can hold",
		})?;

		let record = Record::parse(&self.bytes, at)?;
		let prim = record.primitive_type(at)?;
		if prim == PrimitiveType::Container && record.dim != 1 {
			return Err(GddError::CorruptFlat {
				at,
				reason: "container record without one axis",
			});
		}

		let mut state = NodeState::new(record.app, prim, record.dim);
		if record.dim > 0 {
			state.bounds = self.bounds(&record, at)?.into_iter().collect();
		}

		state.payload = if prim == PrimitiveType::Container {
			let children = self.children(&record, at, budget)?;
			state.bounds[0].size = u32::try_from(children.len()).unwrap_or(u32::MAX);
			Payload::Container(children)
		} else if prim == PrimitiveType::Invalid {
			std::mem::take(&mut state.payload)
		} else if record.dim == 0 {
			Payload::Scalar(self.scalar(&record, prim, at)?)
		} else {
			Payload::Array(self.array(&record, prim, at)?.map(ArrayRef::owned))
		};

		state.stat = record.stat;
		state.sevr = record.sevr;
		state.time.sec = record.sec;
		state.time.nsec = record.nsec;
		state.flags = record.value_flags();
		Ok(TaggedValue::from_state(state))
	}

	fn slice(&self, at: usize, len: usize, field: usize) -> Result<&[u8]> {
		let end = at.checked_add(len).ok_or(GddError::CorruptFlat {
			at: field,
			reason: "payload length overflows",
		})?;
		self.bytes.get(at..end).ok_or(GddError::CorruptFlat {
			at: field,
			reason: "payload past end of buffer",
		})
	}

	fn bounds(&self, record: &Record, at: usize) -> Result<Vec<Bounds>> {
		let field = at + BOUNDS_AT;
		let bounds_at = self.resolve(record.bounds, field)?.ok_or(GddError::CorruptFlat {
			at: field,
			reason: "missing bounds",
		})?;
		let dim = usize::from(record.dim);
		let mut cursor = Cursor::new(self.slice(bounds_at, dim * BOUNDS_SIZE, field)?);
		let mut bounds = Vec::with_capacity(dim);
		for _ in 0..dim {
			let size = cursor.read_u32(DataFormat::Local)?;
			let first = cursor.read_u32(DataFormat::Local)?;
			bounds.push(Bounds::new(first, size));
		}
		Ok(bounds)
	}

	fn children(&self, record: &Record, at: usize, budget: &mut usize) -> Result<Vec<TaggedValue>> {
		let mut children = Vec::new();
		if record.aux == 0 {
			return Ok(children);
		}

		let mut child = self.resolve_record(record.data, at)?;
		for remaining in (0..record.aux).rev() {
			children.push(self.node(child, budget)?);
			if remaining > 0 {
				let next = Record::parse(&self.bytes, child)?.next;
				child = self.resolve_record(next, child)?;
			}
		}
		Ok(children)
	}

	fn text(&self, ptr: u64, len: usize, field: usize) -> Result<AitString> {
		let Some(text_at) = self.resolve(ptr, field)? else {
			return Ok(AitString::new());
		};
		let raw = self.slice(text_at, len, field)?;
		Ok(AitString::copied(&String::from_utf8_lossy(raw)))
	}

	fn scalar(&self, record: &Record, prim: PrimitiveType, at: usize) -> Result<Scalar> {
		let field = at + DATA_AT;
		match prim {
			PrimitiveType::String => Ok(Scalar::String(self.text(record.data, record.aux as usize, field)?)),
			PrimitiveType::FixedString => {
				let Some(text_at) = self.resolve(record.data, field)? else {
					return Ok(Scalar::FixedString(Box::default()));
				};
				let raw = self.slice(text_at, FIXED_STRING_SIZE, field)?;
				Ok(Scalar::FixedString(Box::new(FixedString::from_bytes(raw))))
			}
			_ => {
				let bits = record.data.to_ne_bytes();
				read_elems(prim, &bits[..prim.size()], 1, field)?
					.first_scalar()
					.ok_or(GddError::CorruptFlat {
						at: field,
						reason: "empty inline scalar",
					})
			}
		}
	}

	fn array(&self, record: &Record, prim: PrimitiveType, at: usize) -> Result<Option<ArrayData>> {
		let field = at + DATA_AT;
		let Some(data_at) = self.resolve(record.data, field)? else {
			return Ok(None);
		};
		let count = record.aux as usize;

		if prim == PrimitiveType::String {
			let index = self.slice(data_at, byte_len(count, STRING_INDEX_SIZE)?, field)?;
			let mut cursor = Cursor::new(index);
			let mut values = Vec::with_capacity(count);
			for _ in 0..count {
				let ptr = cursor.read_u64(DataFormat::Local)?;
				let len = cursor.read_u32(DataFormat::Local)?;
				let _ = cursor.read_u32(DataFormat::Local)?;
				values.push(self.text(ptr, len as usize, field)?);
			}
			return Ok(Some(ArrayData::String(values)));
		}

		let raw = self.slice(data_at, byte_len(count, prim.size())?, field)?;
		read_elems(prim, raw, count, field).map(Some)
	}
}
