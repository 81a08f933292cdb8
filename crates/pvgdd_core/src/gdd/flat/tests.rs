use proptest::prelude::*;

use super::{FlatEncoding, FlatValue, NODE_SIZE};
use crate::gdd::{AitString, Enum16, FixedString, GddError, PrimitiveType, TaggedValue, TimeStamp, ValueFlags};

fn u16_at(bytes: &[u8], at: usize) -> u16 {
	u16::from_ne_bytes([bytes[at], bytes[at + 1]])
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
	u32::from_ne_bytes(bytes[at..at + 4].try_into().expect("four bytes"))
}

fn sample_tree() -> TaggedValue {
	let root = TaggedValue::container(1);
	root.set_status(4, 1);
	root.set_time_stamp(TimeStamp::new(1_700_000_000, 250));

	let level = TaggedValue::scalar(2, PrimitiveType::Float64);
	level.put(12.5_f64).expect("set");
	root.insert(level).expect("inserted");

	let units = TaggedValue::new(3);
	units.put(AitString::copied("mm")).expect("set");
	root.insert(units).expect("inserted");

	let nested = TaggedValue::container(4);
	let samples = TaggedValue::new(5);
	samples.put_array(&[1_i16, -2, 3]).expect("stored");
	nested.insert(samples).expect("inserted");
	let labels = TaggedValue::new(6);
	labels.put_array(&[AitString::copied("low"), AitString::copied(""), AitString::copied("high")]).expect("stored");
	nested.insert(labels).expect("inserted");
	let tag = TaggedValue::new(7);
	tag.put(FixedString::new("PUMP:1")).expect("set");
	nested.insert(tag).expect("inserted");
	root.insert(nested).expect("inserted");

	root.insert(TaggedValue::array(8, PrimitiveType::Uint32, &[4])).expect("inserted");
	root
}

#[test]
fn records_carry_tags_shape_and_markers() {
	let tree = sample_tree();
	let flat = tree.flatten().expect("flattened");
	let bytes = flat.as_bytes();

	assert_eq!(flat.len(), tree.total_size_bytes());
	assert_eq!(flat.node_count().expect("walk"), 8);
	assert_eq!(u16_at(bytes, 0), 1);
	assert_eq!(bytes[2], PrimitiveType::Container as u8);
	assert_eq!(bytes[3], 1);
	assert_eq!(bytes[4], ValueFlags::FLAT.bits());
	assert_eq!(bytes[5], 1);
	assert_eq!(u16_at(bytes, 8), 4);
	assert_eq!(u32_at(bytes, 16), 1_700_000_000);
	assert_eq!(u32_at(bytes, 20), 4);

	let child = NODE_SIZE;
	assert_eq!(u16_at(bytes, child), 2);
	assert_eq!(bytes[child + 4], ValueFlags::NOREF.bits());
	assert_eq!(bytes[child + 5], 0);
	assert_eq!(flat.application_types().expect("tags"), vec![1, 2, 3, 4, 8, 5, 6, 7]);
}

#[test]
fn short_buffer_is_refused() {
	let tree = sample_tree();
	let need = tree.total_size_bytes();
	let err = tree.flatten_with_address(vec![0_u8; need - 8].into_boxed_slice()).expect_err("too small");
	assert!(matches!(err, GddError::BufferTooSmall { need: n, .. } if n == need));
}

#[test]
fn address_buffer_materialises_equal_tree() {
	let tree = sample_tree();
	let flat = tree.flatten().expect("flattened");
	let copy = flat.to_value().expect("materialised");
	assert!(copy.content_eq(&tree));
	assert_eq!(copy.descendant(6).expect("labels").get_array::<AitString>().expect("labels")[2].as_str(), "high");
}

#[test]
fn materialised_tree_is_frozen() {
	let copy = sample_tree().flatten().expect("flattened").to_value().expect("materialised");
	assert!(copy.is_flat());
	assert!(matches!(copy.insert(TaggedValue::new(9)), Err(GddError::NotAllowed { .. })));

	let leaf = copy.child(0).expect("child");
	assert!(leaf.is_no_ref());
	assert!(matches!(leaf.reference(), Err(GddError::NotAllowed { .. })));

	let nested = copy.child(2).expect("child");
	assert!(nested.flags().contains(ValueFlags::FLAT | ValueFlags::NOREF));
}

#[test]
fn offsets_survive_a_copy_to_a_new_buffer() {
	let tree = sample_tree();
	let buf = vec![0_u8; tree.total_size_bytes()].into_boxed_slice();
	let sent = tree.flatten_with_offsets(buf).expect("flattened");
	assert_eq!(sent.encoding(), FlatEncoding::Offsets);

	let mut received = FlatValue::from_bytes(sent.as_bytes().to_vec()).expect("adopted");
	assert_eq!(received.encoding(), FlatEncoding::Offsets);
	assert!(matches!(received.to_value(), Err(GddError::NotAllowed { .. })));
	assert!(matches!(received.convert_address_to_offsets(), Err(GddError::NotAllowed { .. })));

	received.convert_offsets_to_address().expect("rebased");
	assert_eq!(received.encoding(), FlatEncoding::Addresses);
	assert!(received.to_value().expect("materialised").content_eq(&tree));
}

#[test]
fn out_of_range_pointer_is_rejected() {
	let value = TaggedValue::new(1);
	value.put_array(&[1.0_f32, 2.0]).expect("stored");
	let flat = value.flatten_with_offsets(vec![0_u8; value.total_size_bytes()].into_boxed_slice()).expect("flattened");

	let mut bytes = flat.as_bytes().to_vec();
	let bogus = (bytes.len() as u64 + 64).to_ne_bytes();
	bytes[32..40].copy_from_slice(&bogus);
	let mut received = FlatValue::from_bytes(bytes).expect("adopted");
	assert!(matches!(received.convert_offsets_to_address(), Err(GddError::OutOfBounds { .. })));
}

#[test]
fn truncated_or_unmarked_bytes_are_rejected() {
	assert!(FlatValue::from_bytes(vec![0_u8; NODE_SIZE - 1]).is_err());
	assert!(matches!(FlatValue::from_bytes(vec![0_u8; NODE_SIZE]), Err(GddError::CorruptFlat { .. })));
}

#[test]
fn empty_container_and_dataless_array_flatten() {
	let empty = TaggedValue::container(1);
	let flat = empty.flatten().expect("flattened");
	assert_eq!(flat.node_count().expect("walk"), 1);
	assert!(flat.to_value().expect("materialised").content_eq(&empty));

	let described = TaggedValue::array(2, PrimitiveType::Int32, &[3, 2]);
	let copy = described.flatten().expect("flattened").to_value().expect("materialised");
	assert_eq!(copy.bounds().as_slice(), described.bounds().as_slice());
	assert!(copy.array_buffer().is_none());
}

#[derive(Debug, Clone)]
enum Shape {
	Int(i32),
	Enum(u16),
	Double(f64),
	Text(String),
	Fixed(String),
	Shorts(Vec<i16>),
	Texts(Vec<String>),
	Group(Vec<Shape>),
}

fn shape() -> impl Strategy<Value = Shape> {
	let leaf = prop_oneof![
		any::<i32>().prop_map(Shape::Int),
		any::<u16>().prop_map(Shape::Enum),
		(-1.0e9_f64..1.0e9).prop_map(Shape::Double),
		"[a-z]{0,12}".prop_map(Shape::Text),
		"[A-Z:]{0,30}".prop_map(Shape::Fixed),
		prop::collection::vec(any::<i16>(), 0..6).prop_map(Shape::Shorts),
		prop::collection::vec("[a-z]{0,6}", 0..4).prop_map(Shape::Texts),
	];
	leaf.prop_recursive(3, 24, 5, |inner| prop::collection::vec(inner, 0..5).prop_map(Shape::Group))
}

fn build(shape: &Shape, app: u16) -> TaggedValue {
	let value = TaggedValue::new(app);
	match shape {
		Shape::Int(v) => value.put(*v).expect("set"),
		Shape::Enum(v) => value.put(Enum16(*v)).expect("set"),
		Shape::Double(v) => value.put(*v).expect("set"),
		Shape::Text(v) => value.put(AitString::copied(v)).expect("set"),
		Shape::Fixed(v) => value.put(FixedString::new(v)).expect("set"),
		Shape::Shorts(v) => value.put_array(v).expect("stored"),
		Shape::Texts(v) => value.put_array(&v.iter().map(|text| AitString::copied(text)).collect::<Vec<_>>()).expect("stored"),
		Shape::Group(children) => {
			let group = TaggedValue::container(app);
			for (index, child) in children.iter().enumerate() {
				group.insert(build(child, app.wrapping_mul(7).wrapping_add(index as u16 + 1))).expect("inserted");
			}
			return group;
		}
	}
	value
}

proptest! {
	#[test]
	fn prop_offset_flatten_round_trips(shape in shape(), stat in any::<u16>(), sec in any::<u32>()) {
		let tree = build(&shape, 1);
		tree.set_status(stat, 0);
		tree.set_time_stamp(TimeStamp::new(sec, 0));

		let sent = tree.flatten_with_offsets(vec![0_u8; tree.total_size_bytes()].into_boxed_slice()).expect("flattened");
		let mut received = FlatValue::from_bytes(sent.as_bytes().to_vec()).expect("adopted");
		received.convert_offsets_to_address().expect("rebased");
		let copy = received.to_value().expect("materialised");
		prop_assert!(copy.content_eq(&tree));
	}
}
