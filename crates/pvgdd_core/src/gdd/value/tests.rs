use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::gdd::{AitString, ArrayBuffer, ArrayData, Bounds, DataFormat, Destructor, GddError, PrimitiveType, Registry, TaggedValue, TimeStamp, ValueFlags};

fn int_array(app: u16, values: &[i32]) -> TaggedValue {
	let value = TaggedValue::new(app);
	value.put_array(values).expect("array stored");
	value
}

#[test]
fn references_released_restore_the_count() {
	let value = TaggedValue::scalar(1, PrimitiveType::Int32);
	let handles = (0..5).map(|_| value.reference().expect("reference")).collect::<Vec<_>>();
	assert_eq!(value.ref_count(), 6);
	assert!(handles.iter().all(|handle| handle.ptr_eq(&value)));

	for handle in handles {
		handle.unreference();
	}
	assert_eq!(value.ref_count(), 1);
}

#[test]
fn concurrent_references_balance() {
	let value = TaggedValue::scalar(1, PrimitiveType::Float64);
	std::thread::scope(|scope| {
		for _ in 0..4 {
			scope.spawn(|| {
				for _ in 0..100 {
					let handle = value.reference().expect("reference");
					drop(handle);
				}
			});
		}
	});
	assert_eq!(value.ref_count(), 1);
}

#[test]
fn no_referencing_needs_a_sole_handle() {
	let value = TaggedValue::new(3);
	let other = value.reference().expect("reference");
	assert!(matches!(value.no_referencing(), Err(GddError::NotAllowed { .. })));
	drop(other);

	value.no_referencing().expect("sole handle");
	assert!(value.is_no_ref());
	assert!(matches!(value.reference(), Err(GddError::NotAllowed { .. })));
}

#[test]
fn scalar_keeps_its_type_on_converting_put() {
	let value = TaggedValue::scalar(1, PrimitiveType::Int32);
	value.put_convert(42_u8).expect("converted");
	assert_eq!(value.primitive_type(), PrimitiveType::Int32);
	assert_eq!(value.get::<i32>().expect("read back"), 42);
	assert_eq!(value.get::<f64>().expect("read as float"), 42.0);

	value.set_primitive_type(PrimitiveType::Float64).expect("retyped");
	assert_eq!(value.get::<f64>().expect("zero after retype"), 0.0);

	value.put(AitString::copied("hello")).expect("typed put");
	assert_eq!(value.primitive_type(), PrimitiveType::String);
	assert_eq!(value.get::<AitString>().expect("text").as_str(), "hello");
}

#[test]
fn text_into_unsigned_scalar() {
	let value = TaggedValue::scalar(1, PrimitiveType::Uint32);
	value.put_str("1.0e3").expect("parses");
	assert_eq!(value.get::<u32>().expect("read back"), 1000);
	value.put_str("").expect("empty parses");
	assert_eq!(value.get::<u32>().expect("read back"), 0);
	assert!(value.put_str("-1").is_err());
}

#[test]
fn untyped_scalar_adopts_the_source_type() {
	let value = TaggedValue::new(1);
	value.put_convert(2.5_f32).expect("adopted");
	assert_eq!(value.primitive_type(), PrimitiveType::Float32);
	assert_eq!(value.get::<f32>().expect("read back"), 2.5);
}

#[test]
fn put_value_clips_to_the_destination_window() {
	let dest = TaggedValue::array(1, PrimitiveType::Int32, &[3]);
	let src = int_array(2, &[1, 2, 3, 4, 5]);
	dest.put_value(&src).expect("clipped copy");

	assert_eq!(dest.bound(0).expect("axis"), Bounds::new(0, 3));
	assert_eq!(dest.data_size_elements().expect("size"), 3);
	assert_eq!(dest.get_array::<i32>().expect("values"), vec![1, 2, 3]);
}

#[test]
fn put_value_aligns_origins_and_zeroes_the_tail() {
	let dest = TaggedValue::array(1, PrimitiveType::Float64, &[4]);
	dest.gen_copy(ArrayData::Float64(vec![9.0; 4]).as_elems(), DataFormat::Local).expect("storage");
	dest.set_bound(0, 2, 4).expect("origin moved");

	let src = int_array(2, &[1, 2, 3, 4, 5]);
	src.set_status(3, 2);
	src.set_time_stamp(TimeStamp::new(10, 20));
	dest.put_value(&src).expect("aligned copy");

	assert_eq!(dest.get_array::<f64>().expect("values"), vec![3.0, 4.0, 5.0, 0.0]);
	assert_eq!((dest.status(), dest.severity()), (3, 2));
	assert_eq!(dest.time_stamp(), TimeStamp::new(10, 20));
}

#[test]
fn scalar_put_value_converts_into_the_destination_type() {
	let dest = TaggedValue::scalar(1, PrimitiveType::Int16);
	let src = TaggedValue::new(2);
	src.put(7.0_f64).expect("source set");
	dest.put_value(&src).expect("converted");

	assert_eq!(dest.primitive_type(), PrimitiveType::Int16);
	assert_eq!(dest.get::<i16>().expect("read back"), 7);
	assert_eq!(dest.application_type(), 1);
}

#[test]
fn put_value_refuses_containers_and_constants() {
	let container = TaggedValue::container(1);
	let array = int_array(2, &[1, 2]);
	assert!(matches!(container.put_value(&array), Err(GddError::NotSupported { .. })));

	let dest = TaggedValue::array(3, PrimitiveType::Int32, &[2]);
	dest.mark_constant();
	assert!(matches!(dest.put_value(&array), Err(GddError::NotAllowed { .. })));
}

#[test]
fn container_bounds_track_children() {
	let root = TaggedValue::container(1);
	for app in 10..13 {
		root.insert(TaggedValue::scalar(app, PrimitiveType::Int8)).expect("inserted");
	}
	assert_eq!(root.bound(0).expect("axis").size, 3);
	assert_eq!(root.child(1).expect("child").application_type(), 11);

	let removed = root.remove(0).expect("removed");
	assert_eq!(removed.application_type(), 10);
	assert_eq!(root.child_count(), 2);
	assert_eq!(root.bound(0).expect("axis").size, 2);
	assert!(matches!(root.child(5), Err(GddError::OutOfBounds { index: 5, len: 2 })));

	let scalar = TaggedValue::new(4);
	assert!(matches!(scalar.insert(TaggedValue::new(5)), Err(GddError::TypeMismatch { .. })));
}

#[test]
fn insert_refuses_cycles() {
	let outer = TaggedValue::container(1);
	let inner = TaggedValue::container(2);
	outer.insert(inner.reference().expect("reference")).expect("nested");

	assert!(matches!(outer.insert(outer.reference().expect("reference")), Err(GddError::NotAllowed { .. })));
	assert!(matches!(inner.insert(outer.reference().expect("reference")), Err(GddError::NotAllowed { .. })));
	assert_eq!(inner.child_count(), 0);
}

#[test]
fn descendants_follow_flatten_order() {
	let root = TaggedValue::container(1);
	let middle = TaggedValue::container(3);
	middle.insert(TaggedValue::new(5)).expect("inserted");
	middle.insert(TaggedValue::new(6)).expect("inserted");
	root.insert(TaggedValue::new(2)).expect("inserted");
	root.insert(middle).expect("inserted");
	root.insert(TaggedValue::new(4)).expect("inserted");

	let order = (0..6).map(|index| root.descendant(index).expect("descendant").application_type()).collect::<Vec<_>>();
	assert_eq!(order, vec![1, 2, 3, 4, 5, 6]);
	assert!(matches!(root.descendant(6), Err(GddError::OutOfBounds { index: 6, len: 6 })));
}

#[test]
fn copy_is_independent_and_dup_aliases() {
	let src = TaggedValue::new(1);
	src.put_array(&[1_u8, 2, 3]).expect("stored");

	let copy = TaggedValue::new(0);
	copy.copy(&src).expect("deep copy");
	let alias = TaggedValue::new(0);
	alias.dup(&src).expect("alias");
	let info = TaggedValue::new(0);
	info.copy_info(&src).expect("shape copy");

	let buf = src.array_buffer().expect("storage");
	if let ArrayData::Uint8(values) = &mut *buf.lock() {
		values[0] = 9;
	}

	assert_eq!(copy.get_array::<u8>().expect("copy"), vec![1, 2, 3]);
	assert_eq!(alias.get_array::<u8>().expect("alias"), vec![9, 2, 3]);
	assert_eq!(info.bounds().as_slice(), src.bounds().as_slice());
	assert!(info.array_buffer().is_none());
	assert_eq!(copy.application_type(), 1);
	assert!(matches!(src.copy(&src), Err(GddError::NotAllowed { .. })));
}

#[test]
fn copy_rebuilds_container_children() {
	let src = TaggedValue::container(1);
	let leaf = TaggedValue::scalar(2, PrimitiveType::Float32);
	leaf.put(1.5_f32).expect("set");
	src.insert(leaf).expect("inserted");

	let dest = TaggedValue::new(0);
	dest.copy(&src).expect("copied");
	assert!(dest.content_eq(&src));
	assert!(!dest.child(0).expect("child").ptr_eq(&src.child(0).expect("child")));
}

#[test]
fn frozen_arrays_keep_their_dimension() {
	let frozen = TaggedValue::array(1, PrimitiveType::Int32, &[2]);
	frozen.insert_flags(ValueFlags::FLAT);
	assert!(matches!(frozen.set_dimension(2, None), Err(GddError::NotAllowed { .. })));
	assert!(matches!(frozen.clear(), Err(GddError::NotAllowed { .. })));

	let scalar = TaggedValue::scalar(2, PrimitiveType::Int32);
	scalar.set_dimension(1, Some(&[Bounds::sized(4)])).expect("reshaped");
	assert_eq!(scalar.dimension(), 1);
	assert_eq!(scalar.bound(0).expect("axis").size, 4);
	assert!(scalar.is_atomic());
}

#[test]
fn clear_keeps_the_application_tag() {
	let value = TaggedValue::scalar(7, PrimitiveType::Int32);
	value.put(5_i32).expect("set");
	value.clear().expect("cleared");
	assert_eq!(value.application_type(), 7);
	assert_eq!(value.primitive_type(), PrimitiveType::Invalid);
	assert_eq!(value.dimension(), 0);
}

#[test]
fn release_hook_runs_once_on_final_release() {
	let calls = Arc::new(AtomicUsize::new(0));
	let seen = Arc::clone(&calls);
	let value = TaggedValue::scalar(1, PrimitiveType::Int16);
	value
		.register_destructor(Destructor::new(move |revived: TaggedValue| {
			assert_eq!(revived.ref_count(), 1);
			seen.fetch_add(1, Ordering::SeqCst);
		}))
		.expect("hook installed");
	assert!(matches!(
		value.register_destructor(Destructor::new(|_: TaggedValue| {})),
		Err(GddError::AlreadyDefined { .. })
	));

	let other = value.reference().expect("reference");
	drop(value);
	assert_eq!(calls.load(Ordering::SeqCst), 0);
	drop(other);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn shared_storage_releases_on_last_owner() {
	let calls = Arc::new(AtomicUsize::new(0));
	let seen = Arc::clone(&calls);
	let owner = TaggedValue::new(1);
	owner
		.put_ref(
			ArrayBuffer::new(ArrayData::Float32(vec![1.0, 2.0])),
			Some(Destructor::new(move |_: ArrayBuffer| {
				seen.fetch_add(1, Ordering::SeqCst);
			})),
		)
		.expect("attached");
	assert_eq!(owner.dimension(), 1);
	assert_eq!(owner.get_array::<f32>().expect("values"), vec![1.0, 2.0]);

	let alias = TaggedValue::array(2, PrimitiveType::Float32, &[2]);
	alias.put_ref_value(&owner).expect("aliased");
	assert!(alias.array_buffer().expect("storage").ptr_eq(&owner.array_buffer().expect("storage")));

	drop(owner);
	assert_eq!(calls.load(Ordering::SeqCst), 0);
	drop(alias);
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn sizes_follow_payload_and_bounds() {
	let doubles = TaggedValue::new(1);
	doubles.put_array(&[1.0_f64, 2.0, 3.0]).expect("stored");
	assert_eq!(doubles.data_size_bytes(), 24);
	assert_eq!(doubles.described_data_size_bytes().expect("size"), 24);
	assert_eq!(doubles.described_data_size_elements().expect("size"), 3);

	let strings = TaggedValue::new(2);
	strings.put_array(&[AitString::copied("ab"), AitString::copied("c")]).expect("stored");
	assert_eq!(strings.data_size_bytes(), 5);

	let described = TaggedValue::array(3, PrimitiveType::Int16, &[2, 3]);
	assert_eq!(described.described_data_size_elements().expect("size"), 6);
	assert_eq!(described.data_size_elements().expect("size"), 1);
}

#[test]
fn handles_are_send_and_sync() {
	fn assert_send_sync<T: Send + Sync>() {}
	assert_send_sync::<TaggedValue>();
}

#[test]
fn change_type_retypes_scalars_and_untyped_values_only() {
	let scalar = TaggedValue::scalar(1, PrimitiveType::Int16);
	scalar.put(7_i16).expect("set");
	scalar.change_type(4, PrimitiveType::Float64).expect("scalar retyped");
	assert_eq!(scalar.application_type(), 4);
	assert_eq!(scalar.primitive_type(), PrimitiveType::Float64);
	assert_eq!(scalar.get::<f64>().expect("zero value"), 0.0);

	let untyped = TaggedValue::with_dimension(2, PrimitiveType::Invalid, 1);
	untyped.change_type(5, PrimitiveType::Uint8).expect("untyped retyped");
	assert_eq!(untyped.application_type(), 5);
	assert_eq!(untyped.primitive_type(), PrimitiveType::Uint8);
	assert_eq!(untyped.dimension(), 1);

	let array = int_array(3, &[1, 2]);
	assert!(matches!(array.change_type(6, PrimitiveType::Float32), Err(GddError::TypeMismatch { .. })));
	assert_eq!(array.application_type(), 3);
	assert_eq!(array.get_array::<i32>().expect("kept"), vec![1, 2]);

	let container = TaggedValue::container(7);
	container.insert(TaggedValue::scalar(8, PrimitiveType::Int8)).expect("inserted");
	assert!(matches!(container.change_type(9, PrimitiveType::Int8), Err(GddError::TypeMismatch { .. })));
	assert_eq!(container.application_type(), 7);
	assert_eq!(container.child_count(), 1);
}

#[test]
fn retyping_a_container_releases_its_children() {
	let calls = Arc::new(AtomicUsize::new(0));
	let container = TaggedValue::container(1);
	for app in [2, 3] {
		let seen = Arc::clone(&calls);
		let child = TaggedValue::scalar(app, PrimitiveType::Int32);
		child
			.register_destructor(Destructor::new(move |_: TaggedValue| {
				seen.fetch_add(1, Ordering::SeqCst);
			}))
			.expect("hook installed");
		container.insert(child).expect("inserted");
	}

	container.set_primitive_type(PrimitiveType::Container).expect("unchanged");
	assert_eq!(container.child_count(), 2);
	assert_eq!(calls.load(Ordering::SeqCst), 0);

	container.set_primitive_type(PrimitiveType::Float32).expect("retyped");
	assert!(container.is_scalar());
	assert!(container.children().is_empty());
	assert_eq!(calls.load(Ordering::SeqCst), 2);

	container.set_primitive_type(PrimitiveType::Container).expect("container again");
	assert!(container.is_container());
	assert_eq!(container.child_count(), 0);
}

#[test]
fn copies_onto_managed_or_flat_destinations_are_refused() {
	let registry = Registry::default();
	let leaf = registry.register("leaf").expect("registered");
	let proto = TaggedValue::container(0);
	proto.insert(TaggedValue::scalar(leaf, PrimitiveType::Int32)).expect("inserted");
	let holder = registry.register_with_prototype("holder", proto).expect("registered");

	let src = TaggedValue::container(holder);
	let value = TaggedValue::scalar(leaf, PrimitiveType::Int32);
	value.put(42_i32).expect("set");
	src.insert(value).expect("inserted");

	let managed = registry.get_instance(holder).expect("instance");
	assert!(managed.is_managed());
	let flat = src.flatten().expect("flattened").to_value().expect("materialised");
	assert!(flat.is_flat());

	for dest in [&managed, &flat] {
		assert!(matches!(dest.copy_info(&src), Err(GddError::NotAllowed { .. })));
		assert!(matches!(dest.copy(&src), Err(GddError::NotAllowed { .. })));
		assert!(matches!(dest.dup(&src), Err(GddError::NotAllowed { .. })));
	}
	assert_eq!(managed.child(0).expect("leaf").get::<i32>().expect("untouched"), 0);
	assert_eq!(flat.child(0).expect("leaf").get::<i32>().expect("untouched"), 42);

	let scratch = TaggedValue::new(0);
	scratch.copy(&flat).expect("flat trees copy out");
	assert!(scratch.content_eq(&src));
	assert!(!scratch.is_flat());
}

#[test]
fn flat_containers_refuse_retyping() {
	let src = TaggedValue::container(1);
	src.insert(TaggedValue::scalar(2, PrimitiveType::Uint16)).expect("inserted");
	let flat = src.flatten().expect("flattened").to_value().expect("materialised");
	assert!(matches!(flat.set_primitive_type(PrimitiveType::Int8), Err(GddError::NotAllowed { .. })));
	assert_eq!(flat.child_count(), 1);
}
