//! Reference-counted tagged values.
//!
//! A [`TaggedValue`] is a handle to a shared node. Every handle accounts for
//! one reference; dropping it releases that reference and the last release
//! either tears the node down or hands it to its release hook.

mod access;
mod container;
mod copy;
mod size;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use parking_lot::{Mutex, MutexGuard};
use smallvec::smallvec;

use crate::gdd::{ArrayBuffer, ArrayData, Bounds, BoundsVec, Destructor, GddError, PrimitiveType, Result, Scalar, TimeStamp};

pub(crate) use container::FlatSlot;
pub(crate) use size::payload_footprint;

bitflags! {
	/// Lifecycle and layout markers carried by every value.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct ValueFlags: u8 {
		/// Lifecycle owned by a registry pool.
		const MANAGED = 0x01;
		/// Structure frozen by a flatten.
		const FLAT = 0x02;
		/// Payload is in network byte order.
		const NET = 0x04;
		/// Further references are refused.
		const NOREF = 0x08;
		/// Payload must not be written.
		const CONSTANT = 0x10;
	}
}

/// Array storage attached to a value, with the chain that releases it.
pub(crate) struct ArrayRef {
	pub(crate) buf: ArrayBuffer,
	pub(crate) destructor: Option<Destructor<ArrayBuffer>>,
}

impl ArrayRef {
	pub(crate) fn owned(data: ArrayData) -> Self {
		Self {
			buf: ArrayBuffer::new(data),
			destructor: None,
		}
	}

	/// Alias the same storage as another owner of the chain.
	pub(crate) fn share(&self) -> Self {
		Self {
			buf: self.buf.clone(),
			destructor: self.destructor.as_ref().map(Destructor::reference),
		}
	}

	fn detached(&self) -> Self {
		Self {
			buf: self.buf.clone(),
			destructor: None,
		}
	}
}

impl Drop for ArrayRef {
	fn drop(&mut self) {
		if let Some(destructor) = self.destructor.take() {
			let _ = destructor.destroy(self.buf.clone());
		}
	}
}

/// Node payload. The variant always agrees with the node's shape.
pub(crate) enum Payload {
	Scalar(Scalar),
	Array(Option<ArrayRef>),
	Container(Vec<TaggedValue>),
}

impl Default for Payload {
	fn default() -> Self {
		Self::Scalar(Scalar::Invalid)
	}
}

pub(crate) struct NodeState {
	pub(crate) app: u16,
	pub(crate) prim: PrimitiveType,
	pub(crate) bounds: BoundsVec,
	pub(crate) payload: Payload,
	pub(crate) release: Option<Destructor<TaggedValue>>,
	pub(crate) stat: u16,
	pub(crate) sevr: u16,
	pub(crate) time: TimeStamp,
	pub(crate) flags: ValueFlags,
	pub(crate) pool_next: Option<TaggedValue>,
}

impl NodeState {
	pub(crate) fn new(app: u16, prim: PrimitiveType, dim: u8) -> Self {
		let mut state = Self {
			app,
			prim: PrimitiveType::Invalid,
			bounds: BoundsVec::new(),
			payload: Payload::default(),
			release: None,
			stat: 0,
			sevr: 0,
			time: TimeStamp::default(),
			flags: ValueFlags::empty(),
			pool_next: None,
		};
		let _ = state.reshape(prim, dim);
		state
	}

	/// Replace type, bounds, and payload with a fresh shape; returns the old payload.
	pub(crate) fn reshape(&mut self, prim: PrimitiveType, dim: u8) -> Payload {
		self.prim = prim;
		if prim == PrimitiveType::Container {
			self.bounds = smallvec![Bounds::default()];
			return std::mem::replace(&mut self.payload, Payload::Container(Vec::new()));
		}
		self.bounds = smallvec![Bounds::default(); usize::from(dim)];
		let fresh = if dim == 0 {
			Payload::Scalar(Scalar::default_for(prim))
		} else {
			Payload::Array(None)
		};
		std::mem::replace(&mut self.payload, fresh)
	}

	pub(crate) fn dimension(&self) -> u8 {
		u8::try_from(self.bounds.len()).unwrap_or(u8::MAX)
	}

	pub(crate) fn is_container(&self) -> bool {
		self.prim == PrimitiveType::Container
	}

	pub(crate) fn is_scalar(&self) -> bool {
		self.bounds.is_empty() && !self.is_container()
	}

	pub(crate) fn is_atomic(&self) -> bool {
		!self.bounds.is_empty() && !self.is_container()
	}

	pub(crate) fn is_frozen(&self) -> bool {
		self.flags.intersects(ValueFlags::FLAT | ValueFlags::MANAGED)
	}

	pub(crate) fn array(&self) -> Option<&ArrayRef> {
		match &self.payload {
			Payload::Array(array) => array.as_ref(),
			_ => None,
		}
	}

	pub(crate) fn children(&self) -> &[TaggedValue] {
		match &self.payload {
			Payload::Container(children) => children,
			_ => &[],
		}
	}

	/// Change the primitive type in place; returns the displaced payload.
	pub(crate) fn set_primitive_type(&mut self, prim: PrimitiveType) -> Payload {
		if self.prim == prim {
			return Payload::default();
		}
		if self.is_container() || prim == PrimitiveType::Container {
			return self.reshape(prim, 0);
		}

		self.prim = prim;
		let fresh = if self.bounds.is_empty() {
			Payload::Scalar(Scalar::default_for(prim))
		} else {
			Payload::Array(None)
		};
		std::mem::replace(&mut self.payload, fresh)
	}

	fn ensure_writable(&self, op: &'static str) -> Result<()> {
		if self.flags.contains(ValueFlags::CONSTANT) {
			return Err(GddError::NotAllowed { op });
		}
		Ok(())
	}

	fn ensure_unfrozen(&self, op: &'static str) -> Result<()> {
		if self.is_frozen() {
			return Err(GddError::NotAllowed { op });
		}
		Ok(())
	}
}

struct Node {
	refs: AtomicU32,
	state: Mutex<NodeState>,
}

/// Which part of an array payload a snapshot keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArrayCapture {
	/// Shape only.
	Describe,
	/// The buffer, without a share of its release chain.
	Buffer,
	/// The buffer and a share of its release chain.
	Share,
}

pub(crate) enum Body {
	Scalar(Scalar),
	Array(Option<ArrayRef>),
	Container(Vec<TaggedValue>),
}

/// Point-in-time copy of one node, taken without holding any other lock.
pub(crate) struct Snapshot {
	pub(crate) app: u16,
	pub(crate) prim: PrimitiveType,
	pub(crate) bounds: BoundsVec,
	pub(crate) stat: u16,
	pub(crate) sevr: u16,
	pub(crate) time: TimeStamp,
	pub(crate) flags: ValueFlags,
	pub(crate) body: Body,
}

impl Snapshot {
	pub(crate) fn is_scalar(&self) -> bool {
		matches!(self.body, Body::Scalar(_))
	}

	pub(crate) fn is_container(&self) -> bool {
		matches!(self.body, Body::Container(_))
	}

	pub(crate) fn dimension(&self) -> usize {
		self.bounds.len()
	}

	/// Owned copy of the element data, `None` for containers and missing storage.
	pub(crate) fn data(&self) -> Option<ArrayData> {
		match &self.body {
			Body::Scalar(scalar) => scalar.as_elems().map(|elems| elems.to_array()),
			Body::Array(array) => array.as_ref().map(|array| array.buf.snapshot()),
			Body::Container(_) => None,
		}
	}
}

/// Handle to a reference-counted generic value.
///
/// The value is a scalar, a bounded array, or a container of child values,
/// tagged with an application type. Handles are `Send + Sync`; node state is
/// guarded by a mutex and the count is atomic.
pub struct TaggedValue {
	node: Arc<Node>,
}

impl TaggedValue {
	pub(crate) fn from_state(state: NodeState) -> Self {
		Self {
			node: Arc::new(Node {
				refs: AtomicU32::new(1),
				state: Mutex::new(state),
			}),
		}
	}

	pub(crate) fn lock(&self) -> MutexGuard<'_, NodeState> {
		self.node.state.lock()
	}

	/// New handle on the same node, bypassing the no-reference flag.
	pub(crate) fn retain(&self) -> Self {
		self.node.refs.fetch_add(1, Ordering::AcqRel);
		Self {
			node: Arc::clone(&self.node),
		}
	}

	pub(crate) fn snapshot(&self, capture: ArrayCapture) -> Snapshot {
		let state = self.lock();
		let body = match &state.payload {
			Payload::Scalar(scalar) => Body::Scalar(scalar.clone()),
			Payload::Array(array) => Body::Array(match capture {
				ArrayCapture::Describe => None,
				ArrayCapture::Buffer => array.as_ref().map(ArrayRef::detached),
				ArrayCapture::Share => array.as_ref().map(ArrayRef::share),
			}),
			Payload::Container(children) => Body::Container(children.iter().map(TaggedValue::retain).collect()),
		};
		Snapshot {
			app: state.app,
			prim: state.prim,
			bounds: state.bounds.clone(),
			stat: state.stat,
			sevr: state.sevr,
			time: state.time,
			flags: state.flags,
			body,
		}
	}

	/// Untyped scalar with application type `app`.
	pub fn new(app: u16) -> Self {
		Self::with_dimension(app, PrimitiveType::Invalid, 0)
	}

	/// Scalar of type `prim` holding its zero value.
	pub fn scalar(app: u16, prim: PrimitiveType) -> Self {
		Self::with_dimension(app, prim, 0)
	}

	/// Array described by `sizes`, one axis per entry, without storage.
	pub fn array(app: u16, prim: PrimitiveType, sizes: &[u32]) -> Self {
		let dim = u8::try_from(sizes.len()).unwrap_or(u8::MAX);
		let mut state = NodeState::new(app, prim, dim);
		for (axis, size) in state.bounds.iter_mut().zip(sizes) {
			*axis = Bounds::sized(*size);
		}
		Self::from_state(state)
	}

	/// Empty container.
	pub fn container(app: u16) -> Self {
		Self::with_dimension(app, PrimitiveType::Container, 1)
	}

	/// Value of `prim` with `dim` zeroed axes; containers always get one axis.
	pub fn with_dimension(app: u16, prim: PrimitiveType, dim: u8) -> Self {
		Self::from_state(NodeState::new(app, prim, dim))
	}

	/// Re-initialise type, shape, status, and flags in place.
	pub fn init(&self, app: u16, prim: PrimitiveType, dim: u8) -> Result<()> {
		let old = {
			let mut state = self.lock();
			state.ensure_unfrozen("init")?;
			state.app = app;
			state.stat = 0;
			state.sevr = 0;
			state.time = TimeStamp::default();
			state.flags = ValueFlags::empty();
			state.reshape(prim, dim)
		};
		drop(old);
		Ok(())
	}

	/// Application type tag.
	pub fn application_type(&self) -> u16 {
		self.lock().app
	}

	/// Set the application type tag.
	pub fn set_application_type(&self, app: u16) {
		self.lock().app = app;
	}

	/// Primitive type.
	pub fn primitive_type(&self) -> PrimitiveType {
		self.lock().prim
	}

	/// Change the primitive type.
	///
	/// No-op when unchanged. Containers drop their children first, scalars
	/// drop the old inline value before the new zero value is stored, and
	/// arrays drop their storage.
	pub fn set_primitive_type(&self, prim: PrimitiveType) -> Result<()> {
		let old = {
			let mut state = self.lock();
			if state.is_container() && state.prim != prim {
				state.ensure_unfrozen("set_primitive_type on container")?;
			}
			state.set_primitive_type(prim)
		};
		drop(old);
		Ok(())
	}

	/// Number of array axes; `0` for scalars.
	pub fn dimension(&self) -> u8 {
		self.lock().dimension()
	}

	/// Change the number of axes, optionally copying `bounds` in.
	///
	/// Frozen (flat or managed) arrays refuse. Moving between scalar and array
	/// drops the old payload and stores the new shape's empty payload.
	pub fn set_dimension(&self, dim: u8, bounds: Option<&[Bounds]>) -> Result<()> {
		let old = {
			let mut state = self.lock();
			if state.is_container() {
				return Err(GddError::NotAllowed {
					op: "set_dimension on container",
				});
			}
			if state.dimension() != 0 && state.is_frozen() {
				tracing::error!(app = state.app, flags = ?state.flags, "refusing to change dimension of frozen value");
				return Err(GddError::NotAllowed { op: "set_dimension" });
			}
			if let Some(bounds) = bounds
				&& bounds.len() < usize::from(dim)
			{
				return Err(GddError::OutOfBounds {
					index: usize::from(dim),
					len: bounds.len(),
				});
			}

			let mut old = Payload::default();
			let current = state.dimension();
			if current != dim {
				if current == 0 {
					old = std::mem::replace(&mut state.payload, Payload::Array(None));
				} else if dim == 0 {
					let fresh = Payload::Scalar(Scalar::default_for(state.prim));
					old = std::mem::replace(&mut state.payload, fresh);
				}
				state.bounds = smallvec![Bounds::default(); usize::from(dim)];
			}
			if let Some(bounds) = bounds {
				state.bounds.copy_from_slice(&bounds[..usize::from(dim)]);
			}
			old
		};
		drop(old);
		Ok(())
	}

	/// Set both tags; only scalars and untyped values may change type this way.
	pub fn change_type(&self, app: u16, prim: PrimitiveType) -> Result<()> {
		let old = {
			let mut state = self.lock();
			if !state.is_scalar() && state.prim != PrimitiveType::Invalid {
				return Err(GddError::TypeMismatch {
					detail: "change_type needs a scalar or untyped value",
				});
			}
			state.app = app;
			state.set_primitive_type(prim)
		};
		drop(old);
		Ok(())
	}

	/// Set axis `index`.
	pub fn set_bound(&self, index: usize, first: u32, size: u32) -> Result<()> {
		let mut state = self.lock();
		if state.is_container() {
			return Err(GddError::NotAllowed {
				op: "set_bound on container",
			});
		}
		let len = state.bounds.len();
		let axis = state.bounds.get_mut(index).ok_or(GddError::OutOfBounds { index, len })?;
		*axis = Bounds::new(first, size);
		Ok(())
	}

	/// Read axis `index`.
	pub fn bound(&self, index: usize) -> Result<Bounds> {
		let state = self.lock();
		state.bounds.get(index).copied().ok_or(GddError::OutOfBounds {
			index,
			len: state.bounds.len(),
		})
	}

	/// All axes.
	pub fn bounds(&self) -> BoundsVec {
		self.lock().bounds.clone()
	}

	/// Alarm status.
	pub fn status(&self) -> u16 {
		self.lock().stat
	}

	/// Alarm severity.
	pub fn severity(&self) -> u16 {
		self.lock().sevr
	}

	/// Set alarm status and severity.
	pub fn set_status(&self, stat: u16, sevr: u16) {
		let mut state = self.lock();
		state.stat = stat;
		state.sevr = sevr;
	}

	/// Time stamp.
	pub fn time_stamp(&self) -> TimeStamp {
		self.lock().time
	}

	/// Set the time stamp.
	pub fn set_time_stamp(&self, time: TimeStamp) {
		self.lock().time = time;
	}

	/// Current flags.
	pub fn flags(&self) -> ValueFlags {
		self.lock().flags
	}

	/// Refuse further payload writes.
	pub fn mark_constant(&self) {
		self.lock().flags.insert(ValueFlags::CONSTANT);
	}

	pub(crate) fn insert_flags(&self, flags: ValueFlags) {
		self.lock().flags.insert(flags);
	}

	/// Dimension 0 and not a container.
	pub fn is_scalar(&self) -> bool {
		self.lock().is_scalar()
	}

	/// Array of a primitive type.
	pub fn is_atomic(&self) -> bool {
		self.lock().is_atomic()
	}

	/// Holds child values.
	pub fn is_container(&self) -> bool {
		self.lock().is_container()
	}

	/// Structure frozen by a flatten.
	pub fn is_flat(&self) -> bool {
		self.flags().contains(ValueFlags::FLAT)
	}

	/// Lifecycle owned by a registry pool.
	pub fn is_managed(&self) -> bool {
		self.flags().contains(ValueFlags::MANAGED)
	}

	/// Payload writes are refused.
	pub fn is_constant(&self) -> bool {
		self.flags().contains(ValueFlags::CONSTANT)
	}

	/// Further references are refused.
	pub fn is_no_ref(&self) -> bool {
		self.flags().contains(ValueFlags::NOREF)
	}

	/// Drop payload and bounds and leave an untyped scalar.
	pub fn clear(&self) -> Result<()> {
		let old = {
			let mut state = self.lock();
			state.ensure_unfrozen("clear")?;
			state.reshape(PrimitiveType::Invalid, 0)
		};
		drop(old);
		Ok(())
	}

	/// Drop the data but keep the shape.
	///
	/// Scalars go back to their zero value, arrays lose their storage, and
	/// containers release every child.
	pub fn clear_data(&self) -> Result<()> {
		let old = {
			let mut state = self.lock();
			state.ensure_unfrozen("clear_data")?;
			let fresh = match &state.payload {
				Payload::Scalar(_) => Payload::Scalar(Scalar::default_for(state.prim)),
				Payload::Array(_) => Payload::Array(None),
				Payload::Container(_) => {
					state.bounds[0].size = 0;
					Payload::Container(Vec::new())
				}
			};
			std::mem::replace(&mut state.payload, fresh)
		};
		drop(old);
		Ok(())
	}

	/// Drop payload, bounds, and primitive type; the application tag stays.
	pub fn destroy_data(&self) {
		let old = self.lock().reshape(PrimitiveType::Invalid, 0);
		drop(old);
	}

	/// Clear, then describe `prim` with `dim` axes sized from `sizes`.
	pub fn reset(&self, prim: PrimitiveType, dim: u8, sizes: &[u32]) -> Result<()> {
		let old = {
			let mut state = self.lock();
			state.ensure_unfrozen("reset")?;
			let old = state.reshape(prim, dim);
			if !state.is_container() {
				for (index, axis) in state.bounds.iter_mut().enumerate() {
					*axis = Bounds::sized(sizes.get(index).copied().unwrap_or(0));
				}
			}
			old
		};
		drop(old);
		Ok(())
	}

	/// Mint another handle on this value.
	pub fn reference(&self) -> Result<TaggedValue> {
		if self.is_no_ref() {
			tracing::warn!(app = self.application_type(), "reference refused on no-reference value");
			return Err(GddError::NotAllowed { op: "reference" });
		}
		self.node
			.refs
			.fetch_update(Ordering::AcqRel, Ordering::Acquire, |refs| refs.checked_add(1))
			.map_err(|_| {
				tracing::warn!("reference count overflow");
				GddError::Overflow {
					dest: PrimitiveType::Uint32,
				}
			})?;
		Ok(Self {
			node: Arc::clone(&self.node),
		})
	}

	/// Release this handle.
	pub fn unreference(self) {
		drop(self);
	}

	/// Live handle count.
	pub fn ref_count(&self) -> u32 {
		self.node.refs.load(Ordering::Acquire)
	}

	/// Refuse further references; only allowed while this is the sole handle.
	pub fn no_referencing(&self) -> Result<()> {
		if self.ref_count() > 1 {
			return Err(GddError::NotAllowed { op: "no_referencing" });
		}
		self.lock().flags.insert(ValueFlags::NOREF);
		Ok(())
	}

	/// Install a release hook unless one is present.
	///
	/// The hook receives a revived handle when the last reference goes away.
	/// Containers and flat values become managed.
	pub fn register_destructor(&self, hook: Destructor<TaggedValue>) -> Result<()> {
		if self.lock().release.is_some() {
			return Err(GddError::AlreadyDefined {
				what: "release hook".to_owned(),
			});
		}
		self.replace_destructor(hook);
		Ok(())
	}

	/// Install a release hook, replacing any present one.
	pub fn replace_destructor(&self, hook: Destructor<TaggedValue>) {
		let mut state = self.lock();
		state.release = Some(hook.reference());
		if state.is_container() || state.flags.contains(ValueFlags::FLAT) {
			state.flags.insert(ValueFlags::MANAGED);
		}
	}

	pub(crate) fn set_release_hook(&self, hook: Destructor<TaggedValue>) {
		let mut state = self.lock();
		state.release = Some(hook.reference());
		state.flags.insert(ValueFlags::MANAGED);
	}

	/// True when both handles refer to the same node.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.node, &other.node)
	}

	/// Stable identity of the node for as long as it is alive.
	pub fn node_id(&self) -> usize {
		Arc::as_ptr(&self.node) as usize
	}

	/// Compare tags, shape, status, and data recursively, ignoring flags.
	pub fn content_eq(&self, other: &TaggedValue) -> bool {
		let left = self.snapshot(ArrayCapture::Buffer);
		let right = other.snapshot(ArrayCapture::Buffer);
		if left.app != right.app
			|| left.prim != right.prim
			|| left.bounds != right.bounds
			|| left.stat != right.stat
			|| left.sevr != right.sevr
			|| left.time != right.time
		{
			return false;
		}
		match (&left.body, &right.body) {
			(Body::Scalar(a), Body::Scalar(b)) => a == b,
			(Body::Array(None), Body::Array(None)) => true,
			(Body::Array(Some(a)), Body::Array(Some(b))) => a.buf.ptr_eq(&b.buf) || a.buf.snapshot() == b.buf.snapshot(),
			(Body::Container(a), Body::Container(b)) => a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.content_eq(b)),
			_ => false,
		}
	}
}

impl Drop for TaggedValue {
	fn drop(&mut self) {
		if self.node.refs.fetch_sub(1, Ordering::AcqRel) != 1 {
			return;
		}

		let (hook, payload) = {
			let mut state = self.node.state.lock();
			match state.release.take() {
				Some(hook) => (Some(hook), None),
				None => (None, Some(std::mem::take(&mut state.payload))),
			}
		};

		if let Some(hook) = hook {
			self.node.refs.store(1, Ordering::Release);
			let revived = Self {
				node: Arc::clone(&self.node),
			};
			if let Some(unclaimed) = hook.destroy(revived) {
				tracing::warn!("release hook still shared; tearing value down");
				drop(unclaimed);
			}
		}
		drop(payload);
	}
}

impl fmt::Debug for TaggedValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let state = self.lock();
		f.debug_struct("TaggedValue")
			.field("app", &state.app)
			.field("prim", &state.prim)
			.field("bounds", &state.bounds.as_slice())
			.field("flags", &state.flags)
			.field("refs", &self.ref_count())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests;
