use crate::gdd::{GddError, PrimitiveType, Result, TaggedValue};

use super::Payload;

/// One node in flatten order.
pub(crate) struct FlatSlot {
	pub(crate) value: TaggedValue,
	/// Flat index of the first child, `0` for leaves.
	pub(crate) first_child: usize,
	pub(crate) child_count: usize,
}

impl TaggedValue {
	/// Append `child`; the container takes over the handle.
	pub fn insert(&self, child: TaggedValue) -> Result<()> {
		if self.ptr_eq(&child) || child.contains(self) {
			return Err(GddError::NotAllowed {
				op: "insert would create a cycle",
			});
		}

		let mut state = self.lock();
		state.ensure_unfrozen("insert")?;
		let Payload::Container(children) = &mut state.payload else {
			return Err(GddError::TypeMismatch {
				detail: "insert needs a container",
			});
		};
		children.push(child);
		state.bounds[0].size += 1;
		Ok(())
	}

	/// Detach and return child `index`.
	pub fn remove(&self, index: usize) -> Result<TaggedValue> {
		let mut state = self.lock();
		state.ensure_unfrozen("remove")?;
		let Payload::Container(children) = &mut state.payload else {
			return Err(GddError::TypeMismatch {
				detail: "remove needs a container",
			});
		};
		if index >= children.len() {
			return Err(GddError::OutOfBounds {
				index,
				len: children.len(),
			});
		}
		let child = children.remove(index);
		state.bounds[0].size -= 1;
		Ok(child)
	}

	/// Handle on child `index`.
	pub fn child(&self, index: usize) -> Result<TaggedValue> {
		let state = self.lock();
		if !state.is_container() {
			return Err(GddError::TypeMismatch {
				detail: "child needs a container",
			});
		}
		let children = state.children();
		children.get(index).map(TaggedValue::retain).ok_or(GddError::OutOfBounds {
			index,
			len: children.len(),
		})
	}

	/// Handles on every child in insertion order; empty for non-containers.
	pub fn children(&self) -> Vec<TaggedValue> {
		self.lock().children().iter().map(TaggedValue::retain).collect()
	}

	/// Number of children.
	pub fn child_count(&self) -> usize {
		self.lock().children().len()
	}

	/// Node at `index` in flatten order, `0` being this value.
	pub fn descendant(&self, index: usize) -> Result<TaggedValue> {
		let layout = self.flat_layout();
		let len = layout.len();
		layout
			.into_iter()
			.nth(index)
			.map(|slot| slot.value)
			.ok_or(GddError::OutOfBounds { index, len })
	}

	/// Every node in flatten order: each container's children sit together,
	/// followed by the expansion of each child container in turn.
	pub(crate) fn flat_layout(&self) -> Vec<FlatSlot> {
		let mut slots = vec![FlatSlot {
			value: self.retain(),
			first_child: 0,
			child_count: 0,
		}];
		expand(&mut slots, 0);
		slots
	}

	fn contains(&self, needle: &TaggedValue) -> bool {
		self.children().iter().any(|child| child.ptr_eq(needle) || child.contains(needle))
	}
}

fn expand(slots: &mut Vec<FlatSlot>, index: usize) {
	let children = {
		let state = slots[index].value.lock();
		if state.prim != PrimitiveType::Container {
			return;
		}
		state.children().iter().map(TaggedValue::retain).collect::<Vec<_>>()
	};

	let first = slots.len();
	slots[index].first_child = first;
	slots[index].child_count = children.len();
	slots.extend(children.into_iter().map(|value| FlatSlot {
		value,
		first_child: 0,
		child_count: 0,
	}));
	for child in first..slots.len() {
		expand(slots, child);
	}
}
