use crate::gdd::{ArrayData, Bounds, ConvertOptions, DataFormat, GddError, PrimitiveType, Result, TaggedValue, convert};

use super::{ArrayCapture, ArrayRef, Body, Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CopyMode {
	Info,
	Deep,
	Alias,
}

impl TaggedValue {
	/// Take over `src`'s tags, shape, status, and scalar data, never array storage.
	///
	/// Container children are rebuilt as empty placeholders of the same shape.
	pub fn copy_info(&self, src: &TaggedValue) -> Result<()> {
		self.copy_stuff(src, CopyMode::Info)
	}

	/// Like [`TaggedValue::copy_info`], with array contents copied into new storage.
	pub fn copy(&self, src: &TaggedValue) -> Result<()> {
		self.copy_stuff(src, CopyMode::Deep)
	}

	/// Like [`TaggedValue::copy`], but arrays alias `src`'s storage and
	/// share its destructor chain.
	pub fn dup(&self, src: &TaggedValue) -> Result<()> {
		self.copy_stuff(src, CopyMode::Alias)
	}

	fn copy_stuff(&self, src: &TaggedValue, mode: CopyMode) -> Result<()> {
		if self.lock().is_frozen() || self.ptr_eq(src) {
			return Err(GddError::NotAllowed { op: "copy" });
		}

		let capture = match mode {
			CopyMode::Info => ArrayCapture::Describe,
			CopyMode::Deep => ArrayCapture::Buffer,
			CopyMode::Alias => ArrayCapture::Share,
		};
		let snapshot = src.snapshot(capture);
		let payload = match snapshot.body {
			Body::Scalar(scalar) => Payload::Scalar(scalar),
			Body::Array(array) => Payload::Array(match (mode, array) {
				(CopyMode::Deep, Some(array)) => Some(ArrayRef::owned(array.buf.snapshot())),
				(_, array) => array,
			}),
			Body::Container(children) => {
				let mut copies = Vec::with_capacity(children.len());
				for child in &children {
					let (app, prim, dim) = {
						let state = child.lock();
						(state.app, state.prim, state.dimension())
					};
					let copy = TaggedValue::with_dimension(app, prim, dim);
					copy.copy_stuff(child, mode)?;
					copies.push(copy);
				}
				Payload::Container(copies)
			}
		};

		let old = {
			let mut state = self.lock();
			state.ensure_unfrozen("copy")?;
			state.app = snapshot.app;
			state.prim = snapshot.prim;
			state.bounds = snapshot.bounds;
			state.stat = snapshot.stat;
			state.sevr = snapshot.sevr;
			std::mem::replace(&mut state.payload, payload)
		};
		drop(old);
		Ok(())
	}

	/// Assign `src`'s data with conversion, clipping arrays to the overlap.
	///
	/// The copy window starts at the larger of the two origins and is capped
	/// by the destination length when that is non-zero. Destination elements
	/// outside the window are zeroed. A destination without storage gets
	/// storage sized to the window and its bounds shrink to match. Status,
	/// severity, and time stamp follow the data.
	pub fn put_value(&self, src: &TaggedValue) -> Result<()> {
		if self.ptr_eq(src) {
			return Ok(());
		}
		let snapshot = src.snapshot(ArrayCapture::Buffer);
		let (src_is_scalar, src_is_container, src_dim) = (snapshot.is_scalar(), snapshot.is_container(), snapshot.dimension());
		let source = snapshot.data();

		let mut state = self.lock();
		state.ensure_writable("put_value")?;

		let scalar_pair = state.is_scalar() && src_is_scalar;
		if !scalar_pair && (state.is_container() || src_is_container) {
			return Err(GddError::NotSupported {
				op: "put_value on container",
			});
		} else if !scalar_pair && (state.dimension() > 1 || src_dim > 1) {
			return Err(GddError::OutOfBounds {
				index: usize::from(state.dimension()).max(src_dim),
				len: 1,
			});
		} else if state.is_scalar() {
			drop(state);
			if let Some(first) = source.as_ref().and_then(|source| source.as_elems().range(0..1)) {
				self.set_elems(first, DataFormat::Local)?;
			}
		} else {
			let (src_first, src_count) = if src_is_scalar {
				(0_u32, 1_u32)
			} else {
				(snapshot.bounds[0].first, snapshot.bounds[0].size)
			};

			let dest_first = state.bounds[0].first;
			let copy_first = dest_first.max(src_first);
			let unused_src_below = copy_first - src_first;
			if src_count != 0 && src_count <= unused_src_below {
				return Err(GddError::OutOfBounds {
					index: unused_src_below as usize,
					len: src_count as usize,
				});
			}
			let available = src_count.saturating_sub(unused_src_below);
			let dest_size = state.bounds[0].size;
			let copy_size = if dest_size > 0 && available > dest_size { dest_size } else { available };

			if state.array().is_none() {
				if state.prim == PrimitiveType::Invalid {
					state.prim = snapshot.prim;
				}
				let storage = ArrayData::zeroed(state.prim, copy_size as usize).ok_or(GddError::TypeMismatch {
					detail: "put_value destination has no element type",
				})?;
				state.payload = Payload::Array(Some(ArrayRef::owned(storage)));
				state.bounds[0] = Bounds::new(copy_first, copy_size);
			}

			let dest_first = state.bounds[0].first;
			let dest_size = state.bounds[0].size;
			let unused_dst_low = copy_first - dest_first;
			let used = u64::from(copy_size) + u64::from(unused_dst_low);
			if u64::from(dest_size) < used {
				return Err(GddError::OutOfBounds {
					index: used as usize,
					len: dest_size as usize,
				});
			}

			let source = source.ok_or(GddError::OutOfBounds { index: 0, len: 0 })?;
			let offset = unused_src_below as usize;
			let count = copy_size as usize;
			let low = unused_dst_low as usize;
			let src_elems = source.as_elems().range(offset..offset + count).ok_or(GddError::OutOfBounds {
				index: offset + count,
				len: source.len(),
			})?;

			let buf = state.array().map(|array| array.buf.clone()).ok_or(GddError::OutOfBounds { index: 0, len: 0 })?;
			drop(state);

			let mut data = buf.lock();
			let len = data.len();
			if len < dest_size as usize {
				return Err(GddError::OutOfBounds {
					index: dest_size as usize,
					len,
				});
			}
			data.zero_range(0..low);
			data.zero_range(low + count..dest_size as usize);
			let mut window = data.as_elems_mut().range(low..low + count).ok_or(GddError::OutOfBounds { index: low + count, len })?;
			convert(&mut window, src_elems, count, &ConvertOptions::default())?;
		}

		let mut state = self.lock();
		state.stat = snapshot.stat;
		state.sevr = snapshot.sevr;
		state.time = snapshot.time;
		Ok(())
	}

	/// Alias `src`'s array storage into this value of the same dimension.
	///
	/// Scalars take a copy of the source scalar. The shared storage keeps
	/// `src`'s destructor chain alive through an added reference.
	pub fn put_ref_value(&self, src: &TaggedValue) -> Result<()> {
		if self.ptr_eq(src) {
			return Ok(());
		}
		let snapshot = src.snapshot(ArrayCapture::Share);

		let old = {
			let mut state = self.lock();
			state.ensure_writable("put_ref_value")?;
			if state.is_container() || snapshot.is_container() {
				return Err(GddError::NotSupported {
					op: "put_ref_value on container",
				});
			}
			if usize::from(state.dimension()) != snapshot.dimension() {
				return Err(GddError::TypeMismatch {
					detail: "put_ref_value needs equal dimensions",
				});
			}

			let payload = match snapshot.body {
				Body::Scalar(scalar) => Payload::Scalar(scalar),
				Body::Array(array) => Payload::Array(array),
				Body::Container(_) => return Err(GddError::NotSupported { op: "put_ref_value on container" }),
			};
			state.prim = snapshot.prim;
			state.bounds = snapshot.bounds;
			state.stat = snapshot.stat;
			state.sevr = snapshot.sevr;
			state.time = snapshot.time;
			std::mem::replace(&mut state.payload, payload)
		};
		drop(old);
		Ok(())
	}
}
