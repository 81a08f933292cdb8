use crate::gdd::bytes::{CursorMut, align8};
use crate::gdd::value::{FlatSlot, NodeState, Payload, payload_footprint};
use crate::gdd::{ArrayData, DataFormat, GddError, Result, Scalar, TaggedValue, ValueFlags};

use super::record::{Record, write_elems};
use super::{BOUNDS_SIZE, FlatEncoding, FlatValue, NODE_SIZE, STRING_INDEX_SIZE};

struct Writer<'a> {
	bytes: &'a mut [u8],
	base: u64,
	cursor: usize,
}

impl Writer<'_> {
	fn address(&self, offset: usize) -> u64 {
		self.base + offset as u64
	}

	/// Reserve `len` payload bytes at the cursor and return their offset.
	fn reserve(&mut self, len: usize) -> Result<usize> {
		let at = self.cursor;
		let end = at + align8(len);
		if end > self.bytes.len() {
			return Err(GddError::BufferTooSmall {
				need: end,
				have: self.bytes.len(),
			});
		}
		self.cursor = end;
		Ok(at)
	}

	fn write_string(&mut self, text: &str) -> Result<usize> {
		let at = self.reserve(text.len() + 1)?;
		self.bytes[at..at + text.len()].copy_from_slice(text.as_bytes());
		self.bytes[at + text.len()] = 0;
		Ok(at)
	}

	fn write_array(&mut self, data: &ArrayData) -> Result<usize> {
		if let ArrayData::String(values) = data {
			let index_len = values.len() * STRING_INDEX_SIZE;
			let text_len: usize = values.iter().map(|value| value.len() + 1).sum();
			let at = self.reserve(index_len + text_len)?;
			let mut text_at = at + index_len;
			for (entry, value) in values.iter().enumerate() {
				let slot = at + entry * STRING_INDEX_SIZE;
				let address = self.address(text_at);
				let mut index = CursorMut::new(&mut self.bytes[slot..slot + STRING_INDEX_SIZE]);
				index.write_u64(address, DataFormat::Local)?;
				index.write_u32(u32::try_from(value.len()).unwrap_or(u32::MAX), DataFormat::Local)?;
				self.bytes[text_at..text_at + value.len()].copy_from_slice(value.as_str().as_bytes());
				text_at += value.len() + 1;
			}
			return Ok(at);
		}

		let len = data.len() * data.primitive_type().size();
		let at = self.reserve(len)?;
		write_elems(&mut self.bytes[at..at + len], data.as_elems());
		Ok(at)
	}
}

fn node_flags(state: &NodeState, root: bool) -> ValueFlags {
	let mut flags = state.flags - ValueFlags::MANAGED - ValueFlags::NET;
	if root {
		flags -= ValueFlags::NOREF;
		flags |= ValueFlags::FLAT;
	} else {
		flags -= ValueFlags::FLAT;
		flags |= ValueFlags::NOREF;
		if !state.bounds.is_empty() {
			flags |= ValueFlags::FLAT;
		}
	}
	flags
}

/// Buffer bytes needed for `layout`.
pub(crate) fn flat_size(layout: &[FlatSlot]) -> usize {
	layout
		.iter()
		.map(|slot| {
			let state = slot.value.lock();
			NODE_SIZE + state.bounds.len() * BOUNDS_SIZE + align8(payload_footprint(&state))
		})
		.sum()
}

impl TaggedValue {
	/// Flatten this tree into `buf` with absolute address pointers.
	///
	/// The copy drops release hooks and the managed and network markers.
	/// The root, containers, and arrays are marked flat; every other node is
	/// marked no-reference.
	pub fn flatten_with_address(&self, mut buf: Box<[u8]>) -> Result<FlatValue> {
		let layout = self.flat_layout();
		let need = flat_size(&layout);
		if buf.len() < need {
			return Err(GddError::BufferTooSmall { need, have: buf.len() });
		}
		buf[..need].fill(0);

		let mut next = vec![0_usize; layout.len()];
		for slot in &layout {
			for child in slot.first_child..(slot.first_child + slot.child_count).saturating_sub(1) {
				next[child] = child + 1;
			}
		}

		let base = buf.as_ptr() as u64;
		let mut writer = Writer {
			bytes: &mut buf[..],
			base,
			cursor: layout.len() * NODE_SIZE,
		};

		for (index, slot) in layout.iter().enumerate() {
			let state = slot.value.lock();
			let mut record = Record {
				app: state.app,
				prim: state.prim as u8,
				dim: state.dimension(),
				flags: node_flags(&state, index == 0).bits(),
				marker: if index == 0 { FlatEncoding::Addresses.marker() } else { 0 },
				stat: state.stat,
				sevr: state.sevr,
				nsec: state.time.nsec,
				sec: state.time.sec,
				..Record::default()
			};
			if next[index] != 0 {
				record.next = writer.address(next[index] * NODE_SIZE);
			}

			if !state.bounds.is_empty() {
				let at = writer.reserve(state.bounds.len() * BOUNDS_SIZE)?;
				let mut out = CursorMut::new(&mut writer.bytes[at..at + state.bounds.len() * BOUNDS_SIZE]);
				for axis in &state.bounds {
					out.write_u32(axis.size, DataFormat::Local)?;
					out.write_u32(axis.first, DataFormat::Local)?;
				}
				record.bounds = writer.address(at);
			}

			match &state.payload {
				Payload::Container(_) => {
					record.aux = u32::try_from(slot.child_count).unwrap_or(u32::MAX);
					if slot.child_count > 0 {
						record.data = writer.address(slot.first_child * NODE_SIZE);
					}
				}
				Payload::Scalar(Scalar::String(text)) => {
					record.aux = u32::try_from(text.len()).unwrap_or(u32::MAX);
					let at = writer.write_string(text.as_str())?;
					record.data = writer.address(at);
				}
				Payload::Scalar(Scalar::FixedString(text)) => {
					let at = writer.reserve(text.raw().len())?;
					writer.bytes[at..at + text.raw().len()].copy_from_slice(text.raw());
					record.data = writer.address(at);
				}
				Payload::Scalar(scalar) => {
					if let Some(elems) = scalar.as_elems() {
						let mut inline = [0_u8; 8];
						write_elems(&mut inline, elems);
						record.data = u64::from_ne_bytes(inline);
					}
				}
				Payload::Array(Some(array)) => {
					let data = array.buf.lock();
					record.aux = u32::try_from(data.len()).unwrap_or(u32::MAX);
					let at = writer.write_array(&data)?;
					record.data = writer.address(at);
				}
				Payload::Array(None) => {}
			}
			record.write(&mut *writer.bytes, index * NODE_SIZE)?;
		}

		tracing::trace!(nodes = layout.len(), len = need, "flattened value");
		Ok(FlatValue {
			bytes: buf,
			encoding: FlatEncoding::Addresses,
		})
	}

	/// Flatten into `buf`, then rewrite pointers as offsets.
	pub fn flatten_with_offsets(&self, buf: Box<[u8]>) -> Result<FlatValue> {
		let mut flat = self.flatten_with_address(buf)?;
		flat.convert_address_to_offsets()?;
		Ok(flat)
	}

	/// Flatten into an exactly sized buffer with address pointers.
	pub fn flatten(&self) -> Result<FlatValue> {
		let buf = vec![0_u8; self.total_size_bytes()].into_boxed_slice();
		self.flatten_with_address(buf)
	}
}
