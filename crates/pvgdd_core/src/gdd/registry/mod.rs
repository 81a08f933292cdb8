//! Application type registry.
//!
//! Names map to small integer tags. A tag may carry a prototype tree that is
//! stored flattened; instances of it come from a per-tag pool and return to
//! it when their last handle is released.

mod standard;

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::gdd::value::{ArrayCapture, ArrayRef, Body, Payload};
use crate::gdd::{Destructor, FlatValue, GddError, Result, TaggedValue};

/// Table sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
	/// Upper bound on registered tags, rounded up to a power of two.
	pub max_types: u32,
	/// Tags per lazily allocated group.
	pub group_size: u32,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self {
			max_types: 1 << 13,
			group_size: 64,
		}
	}
}

/// How a tag was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
	/// No registration.
	Undefined,
	/// Name only; instances are fresh untyped scalars.
	Normal,
	/// Name with a pooled prototype tree.
	Prototype,
}

impl EntryKind {
	/// Lowercase name.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Undefined => "undefined",
			Self::Normal => "normal",
			Self::Prototype => "prototype",
		}
	}
}

impl fmt::Display for EntryKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Summary of one registered tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
	/// Application tag.
	pub tag: u16,
	/// Registered name.
	pub name: String,
	/// Registration kind.
	pub kind: EntryKind,
	/// Nodes in the prototype tree, `0` for normal entries.
	pub nodes: usize,
	/// Opaque user word.
	pub user_value: u32,
}

struct Prototype {
	flat: FlatValue,
	template: TaggedValue,
	/// Child tag to flat index; `0` means unmapped unless the tags are equal.
	map: Vec<usize>,
	/// Head of the free list, linked through each node's `pool_next`.
	pool: Mutex<Option<TaggedValue>>,
}

impl Prototype {
	fn push(&self, value: TaggedValue) {
		let mut head = self.pool.lock();
		value.lock().pool_next = head.take();
		*head = Some(value);
	}

	fn pop(&self) -> Option<TaggedValue> {
		let mut head = self.pool.lock();
		let value = head.take()?;
		*head = value.lock().pool_next.take();
		Some(value)
	}

	/// Put every node back to its template record, dropping caller data.
	fn reset(&self, value: &TaggedValue) -> Result<()> {
		let live = value.flat_layout();
		let template = self.template.flat_layout();
		if live.len() != template.len() {
			return Err(GddError::NotAllowed {
				op: "recycle instance with changed structure",
			});
		}

		for (live, template) in live.iter().zip(&template) {
			let snapshot = template.value.snapshot(ArrayCapture::Buffer);
			let old = {
				let mut state = live.value.lock();
				if state.is_container() != snapshot.is_container() {
					return Err(GddError::NotAllowed {
						op: "recycle instance with changed structure",
					});
				}
				state.app = snapshot.app;
				state.prim = snapshot.prim;
				state.bounds = snapshot.bounds;
				state.stat = snapshot.stat;
				state.sevr = snapshot.sevr;
				state.time = snapshot.time;
				state.flags = snapshot.flags;
				match snapshot.body {
					Body::Container(_) => None,
					Body::Scalar(scalar) => Some(std::mem::replace(&mut state.payload, Payload::Scalar(scalar))),
					Body::Array(array) => {
						let fresh = array.map(|array| ArrayRef::owned(array.buf.snapshot()));
						Some(std::mem::replace(&mut state.payload, Payload::Array(fresh)))
					}
				}
			};
			drop(old);
		}
		Ok(())
	}
}

impl Drop for Prototype {
	fn drop(&mut self) {
		while let Some(value) = self.pop() {
			drop(value);
		}
	}
}

struct Entry {
	tag: u16,
	name: String,
	user_value: AtomicU32,
	prototype: Option<Prototype>,
}

impl Entry {
	fn kind(&self) -> EntryKind {
		if self.prototype.is_some() { EntryKind::Prototype } else { EntryKind::Normal }
	}

	fn info(&self) -> EntryInfo {
		EntryInfo {
			tag: self.tag,
			name: self.name.clone(),
			kind: self.kind(),
			nodes: self.prototype.as_ref().map_or(0, |proto| proto.template.flat_layout().len()),
			user_value: self.user_value.load(Ordering::Relaxed),
		}
	}

	fn release_hook(entry: &Arc<Entry>) -> Destructor<TaggedValue> {
		let entry: Weak<Entry> = Arc::downgrade(entry);
		Destructor::new(move |value: TaggedValue| match entry.upgrade() {
			Some(entry) => entry.recycle(value),
			None => drop(value),
		})
	}

	fn recycle(&self, value: TaggedValue) {
		let Some(proto) = &self.prototype else {
			tracing::warn!(tag = self.tag, "release hook fired for a normal entry");
			return;
		};
		if let Err(err) = proto.reset(&value) {
			tracing::warn!(tag = self.tag, %err, "dropping instance instead of pooling it");
			return;
		}
		tracing::debug!(tag = self.tag, name = %self.name, "returned instance to pool");
		proto.push(value);
	}
}

#[derive(Clone)]
struct Table {
	groups: Vec<Option<Box<[Option<Arc<Entry>>]>>>,
	names: HashMap<String, u16>,
	group_size: usize,
	max_groups: usize,
	max_types: usize,
	next: usize,
}

impl Table {
	fn new(config: RegistryConfig) -> Self {
		let max_types = config.max_types.clamp(1, 1 << 16).next_power_of_two() as usize;
		let group_size = config.group_size.max(1) as usize;
		Self {
			groups: vec![None],
			names: HashMap::new(),
			group_size,
			max_groups: max_types.div_ceil(group_size),
			max_types,
			next: 1,
		}
	}

	fn get(&self, tag: u16) -> Option<&Arc<Entry>> {
		let tag = usize::from(tag);
		self.groups.get(tag / self.group_size)?.as_ref()?.get(tag % self.group_size)?.as_ref()
	}

	/// Next free tag after the name and limit checks.
	fn allocate(&self, name: &str) -> Result<u16> {
		if self.names.contains_key(name) {
			return Err(GddError::AlreadyDefined { what: name.to_owned() });
		}
		match u16::try_from(self.next) {
			Ok(tag) if self.next < self.max_types => Ok(tag),
			_ => {
				tracing::warn!(name, max = self.max_types, "application type table full");
				Err(GddError::AtLimit { max: self.max_types })
			}
		}
	}

	fn insert(&mut self, entry: Entry) -> Result<()> {
		let tag = usize::from(entry.tag);
		let (group, slot) = (tag / self.group_size, tag % self.group_size);
		if group >= self.max_groups {
			return Err(GddError::AtLimit { max: self.max_types });
		}
		while self.groups.len() <= group {
			let len = (self.groups.len() * 2).min(self.max_groups);
			self.groups.resize_with(len, || None);
		}

		let group_size = self.group_size;
		let slots = self.groups[group].get_or_insert_with(|| (0..group_size).map(|_| None).collect());
		self.names.insert(entry.name.clone(), entry.tag);
		slots[slot] = Some(Arc::new(entry));
		self.next += 1;
		Ok(())
	}

	fn entries(&self) -> Vec<Arc<Entry>> {
		self.groups.iter().flatten().flat_map(|group| group.iter().flatten()).map(Arc::clone).collect()
	}
}

/// Registry of application type names, prototypes, and instance pools.
///
/// Registrations are serialised by a writer lock and publish a new table
/// snapshot. Lookups, instance checkout and release load the current
/// snapshot without locking and then work on the entry's own pool lock.
pub struct Registry {
	table: ArcSwap<Table>,
	writer: Mutex<()>,
}

impl Default for Registry {
	fn default() -> Self {
		Self::new(RegistryConfig::default())
	}
}

impl Registry {
	/// Empty registry; tag `0` is reserved.
	pub fn new(config: RegistryConfig) -> Self {
		Self {
			table: ArcSwap::from_pointee(Table::new(config)),
			writer: Mutex::new(()),
		}
	}

	fn entry(&self, tag: u16) -> Option<Arc<Entry>> {
		self.table.load().get(tag).cloned()
	}

	/// Number of registered tags plus the reserved tag `0`.
	pub fn registered_count(&self) -> usize {
		self.table.load().next
	}

	/// Register `name` and return its tag.
	pub fn register(&self, name: &str) -> Result<u16> {
		let _writer = self.writer.lock();
		let tag = self.table.load().allocate(name)?;
		self.publish(Entry {
			tag,
			name: name.to_owned(),
			user_value: AtomicU32::new(0),
			prototype: None,
		})?;
		tracing::debug!(tag, name, "registered application type");
		Ok(tag)
	}

	/// Register `name` with a prototype tree and return its tag.
	///
	/// The prototype is retagged, flattened once, and consumed. Child tags
	/// already registered are mapped to their flat index.
	pub fn register_with_prototype(&self, name: &str, proto: TaggedValue) -> Result<u16> {
		let (tag, nodes) = {
			let _writer = self.writer.lock();
			let tag = self.table.load().allocate(name)?;
			proto.set_application_type(tag);
			let flat = proto.flatten()?;
			let template = flat.to_value()?;

			let mut map = vec![0; usize::from(tag) + 1];
			let apps = flat.application_types()?;
			for (index, app) in apps.iter().enumerate() {
				if let Some(slot) = map.get_mut(usize::from(*app)) {
					*slot = index;
				}
			}

			self.publish(Entry {
				tag,
				name: name.to_owned(),
				user_value: AtomicU32::new(0),
				prototype: Some(Prototype {
					flat,
					template,
					map,
					pool: Mutex::new(None),
				}),
			})?;
			(tag, apps.len())
		};
		drop(proto);
		tracing::debug!(tag, name, nodes, "registered prototype");
		Ok(tag)
	}

	/// Swap in a copy of the table holding `entry`. Caller holds the writer lock.
	fn publish(&self, entry: Entry) -> Result<()> {
		let mut next = Table::clone(&self.table.load());
		next.insert(entry)?;
		self.table.store(Arc::new(next));
		Ok(())
	}

	/// Tag registered for `name`.
	pub fn tag_of(&self, name: &str) -> Option<u16> {
		self.table.load().names.get(name).copied()
	}

	/// Name registered for `tag`.
	pub fn name_of(&self, tag: u16) -> Option<String> {
		self.table.load().get(tag).map(|entry| entry.name.clone())
	}

	/// Registration kind of `tag`.
	pub fn kind(&self, tag: u16) -> EntryKind {
		self.table.load().get(tag).map_or(EntryKind::Undefined, |entry| entry.kind())
	}

	/// Check out an instance of `tag`.
	///
	/// Prototype tags pop their pool or materialise the stored prototype; the
	/// instance is managed and returns to the pool on final release. Normal
	/// tags give a fresh untyped scalar.
	pub fn get_instance(&self, tag: u16) -> Result<TaggedValue> {
		let entry = self.entry(tag).ok_or(GddError::NotDefined { tag })?;
		let Some(proto) = &entry.prototype else {
			return Ok(TaggedValue::new(tag));
		};

		let value = match proto.pop() {
			Some(value) => {
				tracing::debug!(tag, "reusing pooled instance");
				value
			}
			None => {
				tracing::debug!(tag, name = %entry.name, "materialising prototype instance");
				proto.flat.to_value()?
			}
		};
		value.set_release_hook(Entry::release_hook(&entry));
		Ok(value)
	}

	/// Release one handle of an instance of a registered tag.
	///
	/// Managed instances go back to their pool on the last release.
	pub fn release(&self, value: TaggedValue) -> Result<()> {
		let tag = value.application_type();
		if self.entry(tag).is_none() {
			tracing::warn!(tag, "release of value with unregistered tag");
			return Err(GddError::NotDefined { tag });
		}
		drop(value);
		Ok(())
	}

	/// Flat index of `child_tag` inside the prototype of `container_tag`.
	pub fn map_tag_to_index(&self, container_tag: u16, child_tag: u16) -> Result<usize> {
		let entry = self.entry(container_tag);
		let map = entry.as_ref().and_then(|entry| entry.prototype.as_ref()).map(|proto| proto.map.as_slice()).unwrap_or_default();
		let index = *map.get(usize::from(child_tag)).ok_or(GddError::OutOfBounds {
			index: usize::from(child_tag),
			len: map.len(),
		})?;
		if index == 0 && container_tag != child_tag {
			return Err(GddError::NotDefined { tag: child_tag });
		}
		Ok(index)
	}

	/// Copy data between a managed container and a value by matching tags.
	///
	/// Leaves without a mapping are skipped. Returns the result of the last
	/// leaf copied.
	pub fn smart_copy(&self, dest: &TaggedValue, src: &TaggedValue) -> Result<()> {
		self.smart_walk(dest, src, TaggedValue::put_value)
	}

	/// Like [`Registry::smart_copy`], aliasing array storage instead of copying.
	pub fn smart_ref(&self, dest: &TaggedValue, src: &TaggedValue) -> Result<()> {
		self.smart_walk(dest, src, TaggedValue::put_ref_value)
	}

	fn smart_walk(&self, dest: &TaggedValue, src: &TaggedValue, put: LeafPut) -> Result<()> {
		let result = if dest.is_container() && dest.is_managed() {
			self.walk_source(dest, src, put)
		} else if src.is_container() && src.is_managed() {
			self.walk_dest(dest, src, put)
		} else if !dest.is_container() && !src.is_container() {
			let tag = src.application_type();
			if dest.application_type() == tag { put(dest, src) } else { Err(GddError::NotDefined { tag }) }
		} else {
			Err(GddError::NotAllowed {
				op: "smart copy needs a managed container",
			})
		};
		if let Err(err) = &result {
			tracing::debug!(%err, "smart copy failed");
		}
		result
	}

	fn walk_source(&self, dest: &TaggedValue, src: &TaggedValue, put: LeafPut) -> Result<()> {
		if src.is_container() {
			let mut last = Ok(());
			for child in src.children() {
				last = self.walk_source(dest, &child, put);
			}
			return last;
		}
		match self.map_tag_to_index(dest.application_type(), src.application_type()) {
			Ok(index) => put(&dest.descendant(index)?, src),
			Err(_) => Ok(()),
		}
	}

	fn walk_dest(&self, dest: &TaggedValue, src: &TaggedValue, put: LeafPut) -> Result<()> {
		if dest.is_container() {
			let mut last = Ok(());
			for child in dest.children() {
				last = self.walk_dest(&child, src, put);
			}
			return last;
		}
		match self.map_tag_to_index(src.application_type(), dest.application_type()) {
			Ok(index) => put(dest, &src.descendant(index)?),
			Err(_) => Ok(()),
		}
	}

	/// Store an opaque user word against `tag`.
	pub fn store_value(&self, tag: u16, value: u32) -> Result<()> {
		let entry = self.entry(tag).ok_or(GddError::NotDefined { tag })?;
		entry.user_value.store(value, Ordering::Relaxed);
		Ok(())
	}

	/// User word stored against `tag`, `0` when undefined.
	pub fn value_of(&self, tag: u16) -> u32 {
		self.entry(tag).map_or(0, |entry| entry.user_value.load(Ordering::Relaxed))
	}

	/// Summaries of every registered tag in tag order.
	pub fn entries(&self) -> Vec<EntryInfo> {
		let entries = self.table.load().entries();
		entries.iter().map(|entry| entry.info()).collect()
	}

	/// `#define` listing of every tag and every prototype's child indices.
	pub fn describe(&self) -> String {
		let entries = self.table.load().entries();
		let mut out = String::from("\n");
		for entry in &entries {
			let _ = writeln!(out, "#define gddAppType_{}\t{}", entry.name, entry.tag);
			if let Some(proto) = &entry.prototype {
				let _ = writeln!(out, "#define gddAppTypeIndex_{} 0", entry.name);
				if proto.template.is_container() {
					describe_children(&mut out, &proto.template, 1, &entry.name, &entries);
				}
			}
		}
		out.push('\n');
		out
	}
}

type LeafPut = fn(&TaggedValue, &TaggedValue) -> Result<()>;

fn name_in(entries: &[Arc<Entry>], tag: u16) -> &str {
	entries
		.binary_search_by_key(&tag, |entry| entry.tag)
		.map_or("unknown", |found| entries[found].name.as_str())
}

/// Write one index line per child, then recurse into child containers.
fn describe_children(out: &mut String, container: &TaggedValue, mut level: usize, path: &str, entries: &[Arc<Entry>]) -> usize {
	let children = container.children();
	for child in &children {
		let _ = writeln!(out, "#define gddAppTypeIndex_{path}_{} {level}", name_in(entries, child.application_type()));
		level += 1;
	}
	for child in children.iter().filter(|child| child.is_container()) {
		let path = format!("{path}_{}", name_in(entries, child.application_type()));
		level = describe_children(out, child, level, &path, entries);
	}
	level
}

impl fmt::Debug for Registry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let table = self.table.load();
		f.debug_struct("Registry")
			.field("registered", &table.next)
			.field("max_types", &table.max_types)
			.field("group_size", &table.group_size)
			.finish_non_exhaustive()
	}
}
