use thiserror::Error;

use crate::gdd::PrimitiveType;

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, GddError>;

/// Errors produced by tagged value, conversion, flatten, and registry operations.
#[derive(Debug, Error)]
pub enum GddError {
	/// Filesystem or stream IO failure.
	#[error("io: {0}")]
	Io(#[from] std::io::Error),
	/// Operation does not apply to the value's primitive type or shape.
	#[error("type mismatch: {detail}")]
	TypeMismatch {
		/// What was attempted.
		detail: &'static str,
	},
	/// Structural precondition violated (flat, managed, constant, or no-reference values).
	#[error("operation not allowed: {op}")]
	NotAllowed {
		/// Refused operation.
		op: &'static str,
	},
	/// Name or hook was already registered.
	#[error("already defined: {what}")]
	AlreadyDefined {
		/// Name or hook kind that collided.
		what: String,
	},
	/// Storage could not be produced for a value or pool entry.
	#[error("allocation failed: {what}")]
	NewFailed {
		/// Object being allocated.
		what: &'static str,
	},
	/// Dimension, element, or child index outside the valid range.
	#[error("index out of bounds: index={index}, len={len}")]
	OutOfBounds {
		/// Offending index.
		index: usize,
		/// Number of valid slots.
		len: usize,
	},
	/// Size of a described shape does not fit `usize`.
	#[error("shape too large: {what} overflows")]
	ShapeTooLarge {
		/// Quantity that overflowed.
		what: &'static str,
	},
	/// Registry cannot accept more application types.
	#[error("application type table at limit ({max} entries)")]
	AtLimit {
		/// Configured maximum.
		max: usize,
	},
	/// Name has no registry entry.
	#[error("application type name {name:?} not registered")]
	UnknownName {
		/// Looked up name.
		name: String,
	},
	/// Application tag has no registry entry or no mapping.
	#[error("application type {tag} not defined")]
	NotDefined {
		/// Unmapped tag.
		tag: u16,
	},
	/// Operation is not implemented for this shape.
	#[error("not supported: {op}")]
	NotSupported {
		/// Unsupported operation.
		op: &'static str,
	},
	/// Parsed or converted number exceeded the destination maximum.
	#[error("numeric overflow converting to {dest}")]
	Overflow {
		/// Destination primitive type.
		dest: PrimitiveType,
	},
	/// Parsed or converted number fell below the destination minimum.
	#[error("numeric underflow converting to {dest}")]
	Underflow {
		/// Destination primitive type.
		dest: PrimitiveType,
	},
	/// Conversion matrix has no cell for this pair.
	#[error("no conversion from {src} to {dest}")]
	NoConversion {
		/// Source primitive type.
		src: PrimitiveType,
		/// Destination primitive type.
		dest: PrimitiveType,
	},
	/// Text could not be parsed as a number.
	#[error("cannot parse {text:?} as {dest}")]
	BadNumber {
		/// Offending text.
		text: String,
		/// Destination primitive type.
		dest: PrimitiveType,
	},
	/// Wire buffer did not start with the `HEAD` magic.
	#[error("invalid wire header (magic={magic:?})")]
	BadHeader {
		/// First up-to-4 bytes of the buffer.
		magic: [u8; 4],
	},
	/// Caller buffer is smaller than the encoded size.
	#[error("buffer too small: need={need}, have={have}")]
	BufferTooSmall {
		/// Required bytes.
		need: usize,
		/// Available bytes.
		have: usize,
	},
	/// Flat buffer contents are inconsistent.
	#[error("corrupt flat buffer at offset {at}: {reason}")]
	CorruptFlat {
		/// Byte offset of the bad record or field.
		at: usize,
		/// Failed check.
		reason: &'static str,
	},
}

impl GddError {
	/// Legacy numeric status code for this error.
	///
	/// Codec and parse failures fold into the closest member of the closed
	/// status set.
	pub fn status(&self) -> i32 {
		match self {
			Self::TypeMismatch { .. } | Self::NoConversion { .. } | Self::BadNumber { .. } => -1,
			Self::NotAllowed { .. } => -2,
			Self::AlreadyDefined { .. } => -3,
			Self::NewFailed { .. } | Self::Io(_) => -4,
			Self::OutOfBounds { .. } | Self::ShapeTooLarge { .. } | Self::BufferTooSmall { .. } | Self::CorruptFlat { .. } | Self::BadHeader { .. } => -5,
			Self::AtLimit { .. } => -6,
			Self::NotDefined { .. } | Self::UnknownName { .. } => -7,
			Self::NotSupported { .. } => -8,
			Self::Overflow { .. } => -9,
			Self::Underflow { .. } => -10,
		}
	}
}
