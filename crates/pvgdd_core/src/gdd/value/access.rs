use smallvec::smallvec;

use crate::gdd::bounds::element_product;
use crate::gdd::{
	AitString, ArrayBuffer, ArrayData, Bounds, ConvertOptions, DataFormat, Destructor, Direction, Element, Elems, ElemsMut, GddError, PrimitiveType, Result, TaggedValue,
	convert_with,
};

use super::{ArrayRef, Payload};

fn inbound(format: DataFormat) -> Direction {
	match format {
		DataFormat::Local => Direction::Normal,
		DataFormat::Network => Direction::FromNet,
	}
}

fn outbound(format: DataFormat) -> Direction {
	match format {
		DataFormat::Local => Direction::Normal,
		DataFormat::Network => Direction::ToNet,
	}
}

impl TaggedValue {
	/// Store `value` into a scalar, taking on its type.
	pub fn put<T: Element>(&self, value: T) -> Result<()> {
		let old = {
			let mut state = self.lock();
			state.ensure_writable("put")?;
			if !state.is_scalar() {
				return Err(GddError::TypeMismatch { detail: "put needs a scalar" });
			}
			state.prim = T::PRIM;
			std::mem::replace(&mut state.payload, Payload::Scalar(value.into_scalar()))
		};
		drop(old);
		Ok(())
	}

	/// Convert `value` into the first element, keeping the current type.
	pub fn put_convert<T: Element>(&self, value: T) -> Result<()> {
		let data = T::into_array(vec![value]);
		self.set_elems(data.as_elems(), DataFormat::Local)
	}

	/// Convert `text` into the first element.
	pub fn put_str(&self, text: &str) -> Result<()> {
		self.put_convert(AitString::copied(text))
	}

	/// First element converted to `T`.
	pub fn get<T: Element + Default>(&self) -> Result<T> {
		let mut data = T::into_array(vec![T::default()]);
		self.get_elems(&mut data.as_elems_mut(), DataFormat::Local)?;
		T::slice(data.as_elems())
			.and_then(|values| values.first().cloned())
			.ok_or(GddError::TypeMismatch { detail: "get target type" })
	}

	/// Convert the first element into `dest[0]`, writing network order when asked.
	pub fn get_elems(&self, dest: &mut ElemsMut<'_>, format: DataFormat) -> Result<()> {
		let direction = outbound(format);
		let opts = ConvertOptions::default();
		let state = self.lock();
		match &state.payload {
			Payload::Scalar(scalar) => {
				let src = scalar.as_elems().ok_or(GddError::TypeMismatch {
					detail: "get from untyped value",
				})?;
				convert_with(direction, dest, src, 1, &opts)?;
			}
			Payload::Array(array) => {
				let buf = array.as_ref().map(|array| array.buf.clone()).ok_or(GddError::OutOfBounds { index: 0, len: 0 })?;
				drop(state);
				let data = buf.lock();
				let src = data.as_elems().range(0..1).ok_or(GddError::OutOfBounds { index: 0, len: 0 })?;
				convert_with(direction, dest, src, 1, &opts)?;
			}
			Payload::Container(_) => {
				return Err(GddError::TypeMismatch {
					detail: "get from container",
				});
			}
		}
		Ok(())
	}

	/// Convert `src[0]` into the first element, reading network order when asked.
	///
	/// An untyped value adopts the source type first.
	pub fn set_elems(&self, src: Elems<'_>, format: DataFormat) -> Result<()> {
		let direction = inbound(format);
		let opts = ConvertOptions::default();
		let first = src.range(0..1).ok_or(GddError::OutOfBounds { index: 0, len: 0 })?;

		let mut state = self.lock();
		state.ensure_writable("set")?;
		if state.is_container() {
			return Err(GddError::TypeMismatch { detail: "set on container" });
		}
		if state.prim == PrimitiveType::Invalid {
			let old = state.set_primitive_type(first.primitive_type());
			drop(old);
		}

		if let Payload::Array(array) = &state.payload {
			let buf = array.as_ref().map(|array| array.buf.clone()).ok_or(GddError::OutOfBounds { index: 0, len: 0 })?;
			drop(state);
			let mut data = buf.lock();
			let mut dest = data.as_elems_mut();
			convert_with(direction, &mut dest, first, 1, &opts)?;
			return Ok(());
		}

		let Payload::Scalar(scalar) = &mut state.payload else {
			return Err(GddError::TypeMismatch { detail: "set on container" });
		};
		let mut dest = scalar.as_elems_mut().ok_or(GddError::TypeMismatch { detail: "set on untyped value" })?;
		convert_with(direction, &mut dest, first, 1, &opts)?;
		Ok(())
	}

	/// Convert all of `src` into this value.
	///
	/// Scalars take the first element. Arrays without storage get storage for
	/// their described size first, adopting the source type when untyped.
	pub fn gen_copy(&self, src: Elems<'_>, format: DataFormat) -> Result<()> {
		let buf = {
			let mut state = self.lock();
			state.ensure_writable("gen_copy")?;
			if state.is_container() {
				return Err(GddError::TypeMismatch {
					detail: "gen_copy on container",
				});
			}
			if state.is_scalar() {
				drop(state);
				return self.set_elems(src, format);
			}

			match state.array() {
				Some(array) => array.buf.clone(),
				None => {
					if state.prim == PrimitiveType::Invalid {
						state.prim = src.primitive_type();
					}
					let storage = ArrayData::zeroed(state.prim, element_product(&state.bounds)?).ok_or(GddError::NewFailed { what: "array storage" })?;
					let array = ArrayRef::owned(storage);
					let buf = array.buf.clone();
					state.payload = Payload::Array(Some(array));
					buf
				}
			}
		};

		let count = element_product(&self.lock().bounds)?;
		let mut data = buf.lock();
		let mut dest = data.as_elems_mut();
		convert_with(inbound(format), &mut dest, src, count, &ConvertOptions::default())?;
		Ok(())
	}

	/// Replace the payload with a one-dimensional copy of `values`.
	pub fn put_array<T: Element>(&self, values: &[T]) -> Result<()> {
		let len = u32::try_from(values.len()).map_err(|_| GddError::OutOfBounds {
			index: values.len(),
			len: u32::MAX as usize,
		})?;
		let old = {
			let mut state = self.lock();
			state.ensure_writable("put_array")?;
			if state.is_container() {
				return Err(GddError::TypeMismatch {
					detail: "put_array on container",
				});
			}
			if state.is_frozen() && state.dimension() != 1 {
				return Err(GddError::NotAllowed { op: "put_array" });
			}
			state.prim = T::PRIM;
			state.bounds = smallvec![Bounds::sized(len)];
			std::mem::replace(&mut state.payload, Payload::Array(Some(ArrayRef::owned(T::into_array(values.to_vec())))))
		};
		drop(old);
		Ok(())
	}

	/// Every stored element converted to `T`; empty when there is no storage.
	pub fn get_array<T: Element + Default>(&self) -> Result<Vec<T>> {
		let state = self.lock();
		let source = match &state.payload {
			Payload::Scalar(scalar) => match scalar.as_elems() {
				Some(elems) => elems.to_array(),
				None => return Ok(Vec::new()),
			},
			Payload::Array(Some(array)) => {
				let buf = array.buf.clone();
				drop(state);
				buf.snapshot()
			}
			Payload::Array(None) => return Ok(Vec::new()),
			Payload::Container(_) => {
				return Err(GddError::TypeMismatch {
					detail: "get_array from container",
				});
			}
		};

		let count = source.len();
		let mut out = T::into_array(vec![T::default(); count]);
		convert_with(Direction::Normal, &mut out.as_elems_mut(), source.as_elems(), count, &ConvertOptions::default())?;
		T::slice(out.as_elems())
			.map(<[T]>::to_vec)
			.ok_or(GddError::TypeMismatch { detail: "get_array target type" })
	}

	/// Attach caller-owned storage.
	///
	/// The value takes the buffer's element type. When `destructor` is given
	/// this value becomes one of its owners and releases it with the payload.
	/// A scalar becomes one-dimensional and sized to the buffer; arrays keep
	/// the bounds already described.
	pub fn put_ref(&self, buf: ArrayBuffer, destructor: Option<Destructor<ArrayBuffer>>) -> Result<()> {
		let (prim, len) = {
			let data = buf.lock();
			(data.primitive_type(), data.len())
		};
		let old = {
			let mut state = self.lock();
			state.ensure_writable("put_ref")?;
			if state.is_container() {
				return Err(GddError::TypeMismatch {
					detail: "put_ref on container",
				});
			}
			if state.is_scalar() {
				if state.is_frozen() {
					return Err(GddError::NotAllowed { op: "put_ref" });
				}
				let size = u32::try_from(len).unwrap_or(u32::MAX);
				state.bounds = smallvec![Bounds::sized(size)];
			}
			state.prim = prim;
			let array = ArrayRef {
				buf,
				destructor: destructor.as_ref().map(Destructor::reference),
			};
			std::mem::replace(&mut state.payload, Payload::Array(Some(array)))
		};
		drop(old);
		Ok(())
	}

	/// [`TaggedValue::put_ref`], then refuse further writes.
	pub fn put_ref_const(&self, buf: ArrayBuffer, destructor: Option<Destructor<ArrayBuffer>>) -> Result<()> {
		self.put_ref(buf, destructor)?;
		self.mark_constant();
		Ok(())
	}

	/// Handle on the array storage, if any.
	pub fn array_buffer(&self) -> Option<ArrayBuffer> {
		self.lock().array().map(|array| array.buf.clone())
	}
}
