use crate::gdd::bounds::{byte_len, element_product};
use crate::gdd::flat::{STRING_INDEX_SIZE, flat_size};
use crate::gdd::{ArrayData, Result, Scalar, TaggedValue};

use super::{NodeState, Payload};

/// Bytes a node's payload occupies after its record and bounds, before alignment.
pub(crate) fn payload_footprint(state: &NodeState) -> usize {
	match &state.payload {
		Payload::Scalar(Scalar::String(text)) => text.len() + 1,
		Payload::Scalar(Scalar::FixedString(text)) => text.raw().len(),
		Payload::Scalar(_) | Payload::Container(_) | Payload::Array(None) => 0,
		Payload::Array(Some(array)) => array_footprint(&array.buf.lock()),
	}
}

pub(crate) fn array_footprint(data: &ArrayData) -> usize {
	match data {
		ArrayData::String(values) => values.len() * STRING_INDEX_SIZE + values.iter().map(|value| value.len() + 1).sum::<usize>(),
		other => other.len() * other.primitive_type().size(),
	}
}

fn data_bytes(data: &ArrayData) -> usize {
	match data {
		ArrayData::String(values) => values.iter().map(|value| value.len() + 1).sum(),
		other => other.len() * other.primitive_type().size(),
	}
}

impl TaggedValue {
	/// Bytes a flatten of this tree needs.
	pub fn total_size_bytes(&self) -> usize {
		flat_size(&self.flat_layout())
	}

	/// Bytes of data held; containers sum their children's flatten sizes.
	pub fn data_size_bytes(&self) -> usize {
		let state = self.lock();
		match &state.payload {
			Payload::Container(children) => {
				let children = children.iter().map(TaggedValue::retain).collect::<Vec<_>>();
				drop(state);
				children.iter().map(TaggedValue::total_size_bytes).sum()
			}
			Payload::Scalar(Scalar::String(text)) => text.len() + 1,
			Payload::Scalar(scalar) => scalar.primitive_type().size(),
			Payload::Array(Some(array)) => {
				let buf = array.buf.clone();
				drop(state);
				data_bytes(&buf.lock())
			}
			Payload::Array(None) => 0,
		}
	}

	/// Elements held: the bounds product, or `1` for scalars and values without storage.
	pub fn data_size_elements(&self) -> Result<usize> {
		let state = self.lock();
		if state.bounds.is_empty() || state.array().is_none() {
			return Ok(1);
		}
		element_product(&state.bounds)
	}

	/// Elements described by the bounds, `1` for scalars.
	///
	/// Fails with [`GddError::ShapeTooLarge`](crate::gdd::GddError::ShapeTooLarge)
	/// when the product does not fit `usize`.
	pub fn described_data_size_elements(&self) -> Result<usize> {
		element_product(&self.lock().bounds)
	}

	/// Described elements times the element size.
	pub fn described_data_size_bytes(&self) -> Result<usize> {
		let state = self.lock();
		byte_len(element_product(&state.bounds)?, state.prim.size())
	}
}
