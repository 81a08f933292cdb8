use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Capacity of a fixed string, terminator included.
pub const FIXED_STRING_SIZE: usize = 40;

/// Null-padded string of [`FIXED_STRING_SIZE`] bytes.
///
/// At most `FIXED_STRING_SIZE - 1` bytes of text are kept so a terminator is
/// always present.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedString {
	bytes: [u8; FIXED_STRING_SIZE],
}

impl FixedString {
	/// Build from text, truncating on a char boundary to fit.
	pub fn new(text: &str) -> Self {
		let mut end = text.len().min(FIXED_STRING_SIZE - 1);
		while !text.is_char_boundary(end) {
			end -= 1;
		}
		Self::from_bytes(&text.as_bytes()[..end])
	}

	/// Build from raw bytes, stopping at the first NUL.
	pub fn from_bytes(raw: &[u8]) -> Self {
		let mut bytes = [0_u8; FIXED_STRING_SIZE];
		let len = raw.iter().position(|byte| *byte == 0).unwrap_or(raw.len()).min(FIXED_STRING_SIZE - 1);
		bytes[..len].copy_from_slice(&raw[..len]);
		Self { bytes }
	}

	/// Text bytes without padding.
	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes[..self.len()]
	}

	/// Full padded storage.
	pub fn raw(&self) -> &[u8; FIXED_STRING_SIZE] {
		&self.bytes
	}

	/// Text length in bytes.
	pub fn len(&self) -> usize {
		self.bytes.iter().position(|byte| *byte == 0).unwrap_or(FIXED_STRING_SIZE)
	}

	/// True when no text is stored.
	pub fn is_empty(&self) -> bool {
		self.bytes[0] == 0
	}

	/// Text view, replacing invalid UTF-8 received off the wire.
	pub fn to_str_lossy(&self) -> Cow<'_, str> {
		String::from_utf8_lossy(self.as_bytes())
	}
}

impl Default for FixedString {
	fn default() -> Self {
		Self {
			bytes: [0_u8; FIXED_STRING_SIZE],
		}
	}
}

impl fmt::Debug for FixedString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "FixedString({:?})", self.to_str_lossy())
	}
}

impl fmt::Display for FixedString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_str_lossy())
	}
}

/// Ownership mode of an [`AitString`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringKind {
	/// Buffer owned by the string.
	Copy,
	/// Shared buffer owned elsewhere.
	Ref,
	/// Shared constant buffer owned elsewhere.
	RefConst,
	/// Constant buffer that lives for the whole program.
	RefConstImmortal,
}

#[derive(Debug)]
enum Storage {
	Owned(Box<str>),
	Shared(Arc<str>),
	Static(&'static str),
}

/// Variable length string with an explicit ownership kind.
#[derive(Debug)]
pub struct AitString {
	storage: Storage,
	kind: StringKind,
}

impl AitString {
	/// Empty owned string.
	pub fn new() -> Self {
		Self {
			storage: Storage::Owned(Box::from("")),
			kind: StringKind::Copy,
		}
	}

	/// Owned copy of `text`.
	pub fn copied(text: &str) -> Self {
		Self {
			storage: Storage::Owned(Box::from(text)),
			kind: StringKind::Copy,
		}
	}

	/// Reference a shared buffer.
	pub fn shared(text: Arc<str>) -> Self {
		Self {
			storage: Storage::Shared(text),
			kind: StringKind::Ref,
		}
	}

	/// Reference a shared constant buffer.
	pub fn shared_const(text: Arc<str>) -> Self {
		Self {
			storage: Storage::Shared(text),
			kind: StringKind::RefConst,
		}
	}

	/// Reference a program-lifetime constant.
	pub fn immortal(text: &'static str) -> Self {
		Self {
			storage: Storage::Static(text),
			kind: StringKind::RefConstImmortal,
		}
	}

	/// Replace the contents with an owned copy of `text`.
	pub fn set(&mut self, text: &str) {
		self.storage = Storage::Owned(Box::from(text));
		self.kind = StringKind::Copy;
	}

	/// String contents.
	pub fn as_str(&self) -> &str {
		match &self.storage {
			Storage::Owned(text) => text,
			Storage::Shared(text) => text,
			Storage::Static(text) => text,
		}
	}

	/// Text length in bytes.
	pub fn len(&self) -> usize {
		self.as_str().len()
	}

	/// True when empty.
	pub fn is_empty(&self) -> bool {
		self.as_str().is_empty()
	}

	/// Bytes reserved for the text including a terminator.
	pub fn capacity(&self) -> usize {
		self.len() + 1
	}

	/// Ownership kind.
	pub fn kind(&self) -> StringKind {
		self.kind
	}

	/// True for constant buffers.
	pub fn is_constant(&self) -> bool {
		matches!(self.kind, StringKind::RefConst | StringKind::RefConstImmortal)
	}
}

impl Default for AitString {
	fn default() -> Self {
		Self::new()
	}
}

// Immortal constants stay references; everything else becomes an owned copy.
impl Clone for AitString {
	fn clone(&self) -> Self {
		match self.storage {
			Storage::Static(text) => Self::immortal(text),
			_ => Self::copied(self.as_str()),
		}
	}
}

impl PartialEq for AitString {
	fn eq(&self, other: &Self) -> bool {
		self.as_str() == other.as_str()
	}
}

impl From<&str> for AitString {
	fn from(text: &str) -> Self {
		Self::copied(text)
	}
}

impl fmt::Display for AitString {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
