#![allow(missing_docs)]

use pvgdd::gdd::{AitString, Bounds, PrimitiveType, TaggedValue};
use pvgdd_testkit::{CountingAlloc, live_allocations};

#[global_allocator]
static ALLOC: CountingAlloc = CountingAlloc;

const SCALARS: [PrimitiveType; 11] = [
	PrimitiveType::Int8,
	PrimitiveType::Uint8,
	PrimitiveType::Int16,
	PrimitiveType::Uint16,
	PrimitiveType::Enum16,
	PrimitiveType::Int32,
	PrimitiveType::Uint32,
	PrimitiveType::Float32,
	PrimitiveType::Float64,
	PrimitiveType::FixedString,
	PrimitiveType::String,
];

const TEXT: &str = "text long enough to live on the heap";

fn is_text(prim: PrimitiveType) -> bool {
	matches!(prim, PrimitiveType::String | PrimitiveType::FixedString)
}

fn change_through(value: &TaggedValue, from: PrimitiveType, to: PrimitiveType) {
	value.set_primitive_type(from).expect("first change");
	if is_text(from) {
		value.put_str(TEXT).expect("text stored");
	}
	value.set_primitive_type(to).expect("second change");
	if is_text(to) {
		value.put_str(TEXT).expect("text stored");
	}
	value.set_primitive_type(PrimitiveType::Int32).expect("restore");
}

#[test]
fn scalar_type_changes_leave_no_live_allocations() {
	let value = TaggedValue::scalar(1, PrimitiveType::Int32);
	change_through(&value, PrimitiveType::String, PrimitiveType::FixedString);

	for from in SCALARS {
		for to in SCALARS {
			let before = live_allocations();
			change_through(&value, from, to);
			assert_eq!(live_allocations(), before, "{from} -> {to}");
			assert!(value.is_scalar());
		}
	}
}

#[test]
fn text_payload_is_held_until_the_type_changes() {
	let value = TaggedValue::scalar(1, PrimitiveType::String);
	let empty = live_allocations();
	value.put_str(TEXT).expect("text stored");
	assert!(live_allocations() > empty);
	value.set_primitive_type(PrimitiveType::Float64).expect("changed");
	assert_eq!(live_allocations(), empty);
}

#[test]
fn text_scalars_rebuild_across_dimension_changes() {
	for prim in [PrimitiveType::String, PrimitiveType::FixedString] {
		let value = TaggedValue::scalar(1, prim);
		let before = live_allocations();
		for round in 0..3 {
			value.put_str(TEXT).expect("text stored");
			value.set_dimension(1, Some(&[Bounds::sized(2)])).expect("to array");
			assert!(value.is_atomic());
			value.set_dimension(0, None).expect("to scalar");
			assert!(value.is_scalar());
			assert_eq!(value.primitive_type(), prim);
			{
				let text = value.get::<AitString>().expect("read back");
				assert_eq!(text.as_str(), "", "{prim} round {round}");
			}
			assert_eq!(live_allocations(), before, "{prim} round {round}");
		}
	}
}
