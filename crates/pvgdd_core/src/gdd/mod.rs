mod bounds;
mod bytes;
mod convert;
mod destructor;
mod elements;
mod error;
mod flat;
mod prim;
mod registry;
mod string;
mod time;
mod value;
mod wire;

/// Array axis descriptor and inline bounds storage.
pub use bounds::{Bounds, BoundsVec};
/// Byte order selector and bounded byte cursors.
pub use bytes::{Cursor, CursorMut, DataFormat};
/// Conversion matrix tables, entry points, and options.
pub use convert::{ConversionTable, ConvertFn, ConvertOptions, Direction, Element, EnumStringTable, EnumStrings, convert, convert_with, lookup, table};
/// Reference-counted release callbacks.
pub use destructor::Destructor;
/// Typed payload storage and views.
pub use elements::{ArrayBuffer, ArrayData, Elems, ElemsMut, Enum16, Scalar};
/// Error and result aliases.
pub use error::{GddError, Result};
/// Flattened tree buffers.
pub use flat::{BOUNDS_SIZE, FlatEncoding, FlatValue, NODE_SIZE, STRING_INDEX_SIZE};
/// Primitive type enumeration.
pub use prim::PrimitiveType;
/// Application type registry.
pub use registry::{EntryInfo, EntryKind, Registry, RegistryConfig};
/// Fixed and variable string types.
pub use string::{AitString, FIXED_STRING_SIZE, FixedString, StringKind};
/// Header time stamp.
pub use time::TimeStamp;
/// Tagged value handle and flags.
pub use value::{TaggedValue, ValueFlags};
/// Wire header codec.
pub use wire::{HEADER_MAGIC, WireHeader};
