//! Flatten and unflatten of tagged value trees.
//!
//! A flattened tree is one contiguous buffer: fixed 48-byte node records in
//! flatten order, followed by each node's bounds and payload, 8-byte aligned.
//! Pointer fields hold either absolute addresses into the buffer or offsets
//! from its start, so a received copy can be rebased before it is read.

mod read;
mod record;
mod write;

use std::fmt;

use crate::gdd::{GddError, PrimitiveType, Result, ValueFlags};

pub(crate) use write::flat_size;

use record::{BOUNDS_AT, DATA_AT, MARKER_AT, NEXT_AT, Record, read_u64_at, write_u64_at};

/// Size of one node record.
pub const NODE_SIZE: usize = 48;
/// Size of one encoded bounds pair.
pub const BOUNDS_SIZE: usize = 8;
/// Size of one string-array index entry.
pub const STRING_INDEX_SIZE: usize = 16;

const ADDRESSES_MARKER: u8 = 1;
const OFFSETS_MARKER: u8 = 2;

/// How pointer fields in a flat buffer are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlatEncoding {
	/// Absolute addresses valid for this buffer's current location.
	Addresses,
	/// Byte offsets from the start of the buffer.
	Offsets,
}

impl FlatEncoding {
	/// Stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Addresses => "addresses",
			Self::Offsets => "offsets",
		}
	}

	fn marker(self) -> u8 {
		match self {
			Self::Addresses => ADDRESSES_MARKER,
			Self::Offsets => OFFSETS_MARKER,
		}
	}

	fn from_marker(marker: u8) -> Option<Self> {
		match marker {
			ADDRESSES_MARKER => Some(Self::Addresses),
			OFFSETS_MARKER => Some(Self::Offsets),
			_ => None,
		}
	}
}

/// Flattened tagged value tree.
pub struct FlatValue {
	bytes: Box<[u8]>,
	encoding: FlatEncoding,
}

impl FlatValue {
	/// Adopt received bytes; the root record names the encoding.
	pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
		let bytes = bytes.into_boxed_slice();
		let root = Record::parse(&bytes, 0)?;
		let encoding = FlatEncoding::from_marker(root.marker).ok_or(GddError::CorruptFlat {
			at: MARKER_AT,
			reason: "unknown pointer encoding",
		})?;
		Ok(Self { bytes, encoding })
	}

	/// Raw buffer.
	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	/// Buffer length in bytes.
	pub fn len(&self) -> usize {
		self.bytes.len()
	}

	/// True for a zero-length buffer; never the case for a valid tree.
	pub fn is_empty(&self) -> bool {
		self.bytes.is_empty()
	}

	/// Current pointer encoding.
	pub fn encoding(&self) -> FlatEncoding {
		self.encoding
	}

	/// Number of node records reachable from the root.
	pub fn node_count(&self) -> Result<usize> {
		Ok(self.record_offsets()?.len())
	}

	/// Application tag of every node in flatten order.
	pub fn application_types(&self) -> Result<Vec<u16>> {
		let mut offsets = self.record_offsets()?;
		offsets.sort_unstable();
		offsets.into_iter().map(|at| Record::parse(&self.bytes, at).map(|record| record.app)).collect()
	}

	/// Rewrite every pointer field from an address to an offset.
	pub fn convert_address_to_offsets(&mut self) -> Result<()> {
		self.rebase(FlatEncoding::Addresses, FlatEncoding::Offsets)
	}

	/// Rewrite every pointer field from an offset to an address in this buffer.
	pub fn convert_offsets_to_address(&mut self) -> Result<()> {
		self.rebase(FlatEncoding::Offsets, FlatEncoding::Addresses)
	}

	fn base(&self) -> u64 {
		self.bytes.as_ptr() as u64
	}

	/// Buffer offset named by pointer `ptr`, `None` for null.
	///
	/// The end of the buffer is a valid target for empty payloads.
	fn resolve(&self, ptr: u64, at: usize) -> Result<Option<usize>> {
		if ptr == 0 {
			return Ok(None);
		}
		let offset = match self.encoding {
			FlatEncoding::Addresses => ptr.checked_sub(self.base()),
			FlatEncoding::Offsets => Some(ptr),
		};
		match offset.and_then(|offset| usize::try_from(offset).ok()) {
			Some(offset) if offset <= self.bytes.len() => Ok(Some(offset)),
			_ => Err(GddError::OutOfBounds {
				index: at,
				len: self.bytes.len(),
			}),
		}
	}

	/// Resolve a pointer to a record that must sit after `after`.
	fn resolve_record(&self, ptr: u64, after: usize) -> Result<usize> {
		let at = self.resolve(ptr, after)?.ok_or(GddError::CorruptFlat {
			at: after,
			reason: "missing record pointer",
		})?;
		if at <= after || at % NODE_SIZE != 0 {
			return Err(GddError::CorruptFlat {
				at: after,
				reason: "record pointer does not move forward",
			});
		}
		Ok(at)
	}

	/// Offsets of every record reachable from the root.
	fn record_offsets(&self) -> Result<Vec<usize>> {
		let limit = self.bytes.len() / NODE_SIZE;
		let mut offsets = vec![0];
		let mut index = 0;
		while let Some(&at) = offsets.get(index) {
			index += 1;
			let record = Record::parse(&self.bytes, at)?;
			if record.primitive_type(at)? != PrimitiveType::Container || record.aux == 0 {
				continue;
			}

			let mut child = self.resolve_record(record.data, at)?;
			for remaining in (0..record.aux).rev() {
				if offsets.len() >= limit {
					return Err(GddError::CorruptFlat {
						at,
						reason: "more records than the buffer can hold",
					});
				}
				offsets.push(child);
				if remaining > 0 {
					let next = Record::parse(&self.bytes, child)?.next;
					child = self.resolve_record(next, child)?;
				}
			}
		}
		Ok(offsets)
	}

	/// Byte positions of every non-null pointer field.
	fn pointer_slots(&self) -> Result<Vec<usize>> {
		let mut slots = Vec::new();
		for at in self.record_offsets()? {
			let record = Record::parse(&self.bytes, at)?;
			if record.next != 0 {
				slots.push(at + NEXT_AT);
			}
			if record.dim > 0 && record.bounds != 0 {
				slots.push(at + BOUNDS_AT);
			}
			if !record.data_is_pointer() || record.data == 0 {
				continue;
			}
			slots.push(at + DATA_AT);

			if record.primitive_type(at)? == PrimitiveType::String && record.dim > 0 {
				let index = self.resolve(record.data, at + DATA_AT)?.unwrap_or_default();
				for entry in 0..record.aux as usize {
					let slot = index + entry * STRING_INDEX_SIZE;
					if read_u64_at(&self.bytes, slot)? != 0 {
						slots.push(slot);
					}
				}
			}
		}
		Ok(slots)
	}

	fn rebase(&mut self, from: FlatEncoding, to: FlatEncoding) -> Result<()> {
		let root = Record::parse(&self.bytes, 0)?;
		if self.encoding != from || !root.value_flags().contains(ValueFlags::FLAT) {
			return Err(GddError::NotAllowed { op: "flat encoding conversion" });
		}

		let base = self.base();
		let len = self.bytes.len() as u64;
		let mut rewrites = Vec::new();
		for slot in self.pointer_slots()? {
			let ptr = read_u64_at(&self.bytes, slot)?;
			let offset = match from {
				FlatEncoding::Addresses => ptr.checked_sub(base).filter(|offset| *offset <= len),
				FlatEncoding::Offsets => Some(ptr).filter(|offset| *offset <= len),
			}
			.ok_or(GddError::OutOfBounds {
				index: slot,
				len: self.bytes.len(),
			})?;
			let value = match to {
				FlatEncoding::Addresses => base + offset,
				FlatEncoding::Offsets => offset,
			};
			rewrites.push((slot, value));
		}

		for (slot, value) in rewrites {
			write_u64_at(&mut self.bytes, slot, value)?;
		}
		self.bytes[MARKER_AT] = to.marker();
		self.encoding = to;
		tracing::trace!(?to, len = self.bytes.len(), "rebased flat value");
		Ok(())
	}
}

impl fmt::Debug for FlatValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FlatValue").field("len", &self.bytes.len()).field("encoding", &self.encoding).finish()
	}
}

#[cfg(test)]
mod tests;
