use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};

use parking_lot::Mutex;

type Hook<T> = Box<dyn FnOnce(T) + Send>;

struct Inner<T> {
	refs: AtomicU16,
	run: Mutex<Option<Hook<T>>>,
}

/// Reference-counted release callback shared by the owners of a payload.
///
/// A new chain has a count of zero. Owners that share it call
/// [`Destructor::reference`]; each [`Destructor::destroy`] drops one count and
/// the hook runs when it reaches zero, or immediately if it was never raised.
/// The hook runs at most once.
pub struct Destructor<T> {
	inner: Arc<Inner<T>>,
}

impl<T> Destructor<T> {
	/// Chain that runs `hook` on final release.
	pub fn new(hook: impl FnOnce(T) + Send + 'static) -> Self {
		Self {
			inner: Arc::new(Inner {
				refs: AtomicU16::new(0),
				run: Mutex::new(Some(Box::new(hook))),
			}),
		}
	}

	/// Add one owner and return its handle.
	pub fn reference(&self) -> Self {
		self.inner.refs.fetch_add(1, Ordering::AcqRel);
		Self {
			inner: Arc::clone(&self.inner),
		}
	}

	/// Current owner count.
	pub fn ref_count(&self) -> u16 {
		self.inner.refs.load(Ordering::Acquire)
	}

	/// True once the hook has run.
	pub fn is_spent(&self) -> bool {
		self.inner.run.lock().is_none()
	}

	/// True when both handles belong to the same chain.
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}

	/// Release one owner; the last release hands `value` to the hook.
	///
	/// Returns `Some(value)` back when other owners remain or the hook has
	/// already run.
	pub fn destroy(&self, value: T) -> Option<T> {
		let last = self
			.inner
			.refs
			.fetch_update(Ordering::AcqRel, Ordering::Acquire, |refs| Some(refs.saturating_sub(1)))
			.map(|previous| previous <= 1)
			.unwrap_or(true);
		if !last {
			return Some(value);
		}

		let hook = self.inner.run.lock().take();
		match hook {
			Some(hook) => {
				hook(value);
				None
			}
			None => Some(value),
		}
	}
}

impl<T> fmt::Debug for Destructor<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Destructor").field("refs", &self.ref_count()).field("spent", &self.is_spent()).finish()
	}
}
