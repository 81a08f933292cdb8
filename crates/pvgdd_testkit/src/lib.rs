//! Shared test helpers for workspace crates.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::path::{Path, PathBuf};

/// Resolve the workspace root path.
pub fn workspace_root() -> PathBuf {
	let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
	manifest_dir
		.join("..")
		.join("..")
		.canonicalize()
		.unwrap_or_else(|_| manifest_dir.join("..").join(".."))
}

/// Resolve the workspace target directory.
pub fn target_dir() -> PathBuf {
	std::env::var_os("CARGO_TARGET_DIR")
		.map(PathBuf::from)
		.unwrap_or_else(|| workspace_root().join("target"))
}

/// Scratch directory under the target dir for files written by tests.
pub fn scratch_dir(name: &str) -> PathBuf {
	let dir = target_dir().join("pvgdd-scratch").join(name);
	let _ = std::fs::create_dir_all(&dir);
	dir
}

thread_local! {
	static LIVE: Cell<isize> = const { Cell::new(0) };
}

/// System allocator that counts live allocations per thread.
///
/// Install with `#[global_allocator]` in a test binary and compare
/// [`live_allocations`] before and after the code under test. Counts are
/// per thread, so the test harness's own threads do not disturb them.
pub struct CountingAlloc;

fn adjust(delta: isize) {
	let _ = LIVE.try_with(|live| live.set(live.get() + delta));
}

// SAFETY: every call forwards to `System` with the caller's layout.
unsafe impl GlobalAlloc for CountingAlloc {
	unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
		let ptr = unsafe { System.alloc(layout) };
		if !ptr.is_null() {
			adjust(1);
		}
		ptr
	}

	unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
		let ptr = unsafe { System.alloc_zeroed(layout) };
		if !ptr.is_null() {
			adjust(1);
		}
		ptr
	}

	unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
		unsafe { System.dealloc(ptr, layout) };
		adjust(-1);
	}

	unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
		unsafe { System.realloc(ptr, layout, new_size) }
	}
}

/// Allocations made minus allocations freed on the current thread.
pub fn live_allocations() -> isize {
	LIVE.try_with(Cell::get).unwrap_or_default()
}
