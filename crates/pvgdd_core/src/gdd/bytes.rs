use crate::gdd::{GddError, Result};

/// Byte order of encoded buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFormat {
	/// Host byte order.
	#[default]
	Local,
	/// Big-endian network order.
	Network,
}

impl DataFormat {
	/// True when this format matches host order.
	pub fn is_native(self) -> bool {
		match self {
			Self::Local => true,
			Self::Network => cfg!(target_endian = "big"),
		}
	}
}

/// Simple bounded cursor over an immutable byte slice.
pub struct Cursor<'a> {
	bytes: &'a [u8],
	pos: usize,
}

impl<'a> Cursor<'a> {
	/// Create a cursor at position 0.
	pub fn new(bytes: &'a [u8]) -> Self {
		Self { bytes, pos: 0 }
	}

	/// Return current byte offset.
	pub fn pos(&self) -> usize {
		self.pos
	}

	/// Return remaining unread bytes.
	pub fn remaining(&self) -> usize {
		self.bytes.len().saturating_sub(self.pos)
	}

	/// Unread tail of the buffer.
	pub fn rest(&self) -> &'a [u8] {
		&self.bytes[self.pos.min(self.bytes.len())..]
	}

	/// Read exactly `n` bytes and advance cursor.
	pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8]> {
		if n > self.remaining() {
			return Err(GddError::BufferTooSmall {
				need: self.pos.saturating_add(n),
				have: self.bytes.len(),
			});
		}

		let start = self.pos;
		self.pos += n;
		Ok(&self.bytes[start..self.pos])
	}

	/// Read a four-byte code.
	pub fn read_code4(&mut self) -> Result<[u8; 4]> {
		let raw = self.read_exact(4)?;
		let mut out = [0_u8; 4];
		out.copy_from_slice(raw);
		Ok(out)
	}

	/// Read one byte.
	pub fn read_u8(&mut self) -> Result<u8> {
		Ok(self.read_exact(1)?[0])
	}

	/// Read a `u16` in `format` order.
	pub fn read_u16(&mut self, format: DataFormat) -> Result<u16> {
		let raw = self.read_exact(2)?;
		let mut buf = [0_u8; 2];
		buf.copy_from_slice(raw);
		Ok(match format {
			DataFormat::Local => u16::from_ne_bytes(buf),
			DataFormat::Network => u16::from_be_bytes(buf),
		})
	}

	/// Read a `u32` in `format` order.
	pub fn read_u32(&mut self, format: DataFormat) -> Result<u32> {
		let raw = self.read_exact(4)?;
		let mut buf = [0_u8; 4];
		buf.copy_from_slice(raw);
		Ok(match format {
			DataFormat::Local => u32::from_ne_bytes(buf),
			DataFormat::Network => u32::from_be_bytes(buf),
		})
	}

	/// Read a `u64` in `format` order.
	pub fn read_u64(&mut self, format: DataFormat) -> Result<u64> {
		let raw = self.read_exact(8)?;
		let mut buf = [0_u8; 8];
		buf.copy_from_slice(raw);
		Ok(match format {
			DataFormat::Local => u64::from_ne_bytes(buf),
			DataFormat::Network => u64::from_be_bytes(buf),
		})
	}

	/// Advance to the next 8-byte aligned position.
	pub fn align8(&mut self) -> Result<()> {
		let skip = align8(self.pos) - self.pos;
		let _ = self.read_exact(skip)?;
		Ok(())
	}
}

/// Bounded writer over a mutable byte slice.
pub struct CursorMut<'a> {
	bytes: &'a mut [u8],
	pos: usize,
}

impl<'a> CursorMut<'a> {
	/// Create a writer at position 0.
	pub fn new(bytes: &'a mut [u8]) -> Self {
		Self { bytes, pos: 0 }
	}

	/// Return current byte offset.
	pub fn pos(&self) -> usize {
		self.pos
	}

	/// Reserve the next `n` bytes and advance.
	pub fn take(&mut self, n: usize) -> Result<&mut [u8]> {
		let have = self.bytes.len();
		if self.pos + n > have {
			return Err(GddError::BufferTooSmall { need: self.pos + n, have });
		}
		let start = self.pos;
		self.pos += n;
		Ok(&mut self.bytes[start..self.pos])
	}

	/// Write raw bytes.
	pub fn write_bytes(&mut self, raw: &[u8]) -> Result<()> {
		self.take(raw.len())?.copy_from_slice(raw);
		Ok(())
	}

	/// Write one byte.
	pub fn write_u8(&mut self, value: u8) -> Result<()> {
		self.write_bytes(&[value])
	}

	/// Write a `u16` in `format` order.
	pub fn write_u16(&mut self, value: u16, format: DataFormat) -> Result<()> {
		self.write_bytes(&match format {
			DataFormat::Local => value.to_ne_bytes(),
			DataFormat::Network => value.to_be_bytes(),
		})
	}

	/// Write a `u32` in `format` order.
	pub fn write_u32(&mut self, value: u32, format: DataFormat) -> Result<()> {
		self.write_bytes(&match format {
			DataFormat::Local => value.to_ne_bytes(),
			DataFormat::Network => value.to_be_bytes(),
		})
	}

	/// Write a `u64` in `format` order.
	pub fn write_u64(&mut self, value: u64, format: DataFormat) -> Result<()> {
		self.write_bytes(&match format {
			DataFormat::Local => value.to_ne_bytes(),
			DataFormat::Network => value.to_be_bytes(),
		})
	}
}

/// Round `value` up to a multiple of 8.
pub(crate) fn align8(value: usize) -> usize {
	(value + 7) & !7
}
