use std::fmt::Debug;

use proptest::prelude::*;

use super::{ConvertOptions, Direction, Element, EnumStringTable, convert, convert_with, lookup};
use crate::gdd::{AitString, ArrayData, Elems, Enum16, FixedString, GddError, PrimitiveType};

fn convert_one<A: Element>(value: A, dest: PrimitiveType, opts: &ConvertOptions<'_>) -> crate::gdd::Result<ArrayData> {
	let source = A::into_array(vec![value]);
	let mut out = ArrayData::zeroed(dest, 1).expect("convertible destination");
	convert(&mut out.as_elems_mut(), source.as_elems(), 1, opts)?;
	Ok(out)
}

fn text_of(data: &ArrayData) -> String {
	match data {
		ArrayData::String(values) => values[0].as_str().to_owned(),
		ArrayData::FixedString(values) => values[0].to_str_lossy().into_owned(),
		other => panic!("expected string storage, got {other:?}"),
	}
}

fn round_trip<A: Element + PartialEq + Debug>(value: A, via: PrimitiveType) -> A {
	let opts = ConvertOptions::default();
	let middle = convert_one(value, via, &opts).expect("forward conversion");
	let mut back = ArrayData::zeroed(A::PRIM, 1).expect("convertible source");
	convert(&mut back.as_elems_mut(), middle.as_elems(), 1, &opts).expect("reverse conversion");
	A::slice(back.as_elems()).expect("typed view")[0].clone()
}

// Destinations that hold every value of the source type exactly. Every pair
// missing here is narrowing (width, sign, mantissa, or 6-digit text) and is
// excluded from the round-trip property.
const LOSSLESS: &[(PrimitiveType, &[PrimitiveType])] = {
	use PrimitiveType::*;
	&[
		(Int8, &[Int8, Int16, Int32, Float32, Float64, FixedString, String]),
		(Uint8, &[Uint8, Int16, Uint16, Enum16, Int32, Uint32, Float32, Float64, FixedString, String]),
		(Int16, &[Int16, Int32, Float32, Float64, FixedString, String]),
		(Uint16, &[Uint16, Enum16, Int32, Uint32, Float32, Float64, FixedString, String]),
		(Enum16, &[Uint16, Enum16, Int32, Uint32, Float32, Float64, FixedString, String]),
		(Int32, &[Int32, Float64, FixedString, String]),
		(Uint32, &[Uint32, Float64, FixedString, String]),
		(Float32, &[Float32, Float64]),
		(Float64, &[Float64]),
	]
};

fn lossless_targets(prim: PrimitiveType) -> &'static [PrimitiveType] {
	LOSSLESS.iter().find(|(source, _)| *source == prim).map(|(_, targets)| *targets).unwrap_or(&[])
}

#[test]
fn every_convertible_pair_has_a_cell_in_every_direction() {
	for direction in [Direction::Normal, Direction::ToNet, Direction::FromNet] {
		for src in PrimitiveType::ALL {
			for dest in PrimitiveType::ALL {
				let expected = src.is_convertible() && dest.is_convertible();
				assert_eq!(lookup(direction, src, dest).is_some(), expected, "{direction:?} {src} -> {dest}");
			}
		}
	}
}

#[test]
fn invalid_and_container_have_no_cells() {
	assert!(lookup(Direction::Normal, PrimitiveType::Container, PrimitiveType::Int32).is_none());
	assert!(lookup(Direction::Normal, PrimitiveType::Float64, PrimitiveType::Invalid).is_none());
	assert!(lookup(Direction::ToNet, PrimitiveType::Container, PrimitiveType::Container).is_none());
}

#[test]
fn numeric_narrowing_is_a_plain_cast() {
	let out = convert_one(300_i32, PrimitiveType::Uint8, &ConvertOptions::default()).expect("converts");
	assert_eq!(out, ArrayData::Uint8(vec![44]));

	let out = convert_one(-2.75_f64, PrimitiveType::Int16, &ConvertOptions::default()).expect("converts");
	assert_eq!(out, ArrayData::Int16(vec![-2]));
}

#[test]
fn float_text_uses_significant_digit_precision() {
	let opts = ConvertOptions::default();
	let render = |value: f64| text_of(&convert_one(value, PrimitiveType::String, &opts).expect("renders"));

	assert_eq!(render(std::f64::consts::PI), "3.14159");
	assert_eq!(render(2.5), "2.5");
	assert_eq!(render(1.0e7), "1e+07");
	assert_eq!(render(1234567.0), "1.23457e+06");
	assert_eq!(render(0.0001), "0.0001");
	assert_eq!(render(0.00001), "1e-05");
	assert_eq!(render(0.0), "0");

	let wide = ConvertOptions::default().with_precision(10);
	let out = convert_one(std::f64::consts::PI, PrimitiveType::FixedString, &wide).expect("renders");
	assert_eq!(text_of(&out), "3.141592654");
}

#[test]
fn integer_text_is_exact_decimal() {
	let out = convert_one(-2_147_483_648_i32, PrimitiveType::FixedString, &ConvertOptions::default()).expect("renders");
	assert_eq!(text_of(&out), "-2147483648");
}

#[test]
fn unsigned_destinations_accept_double_text() {
	let opts = ConvertOptions::default();
	let out = convert_one(AitString::from("1.0e3"), PrimitiveType::Uint32, &opts).expect("parses");
	assert_eq!(out, ArrayData::Uint32(vec![1000]));

	let out = convert_one(AitString::from(""), PrimitiveType::Uint32, &opts).expect("empty is zero");
	assert_eq!(out, ArrayData::Uint32(vec![0]));

	let out = convert_one(AitString::from("  0x1F "), PrimitiveType::Uint16, &opts).expect("hex parses");
	assert_eq!(out, ArrayData::Uint16(vec![31]));
}

#[test]
fn out_of_range_text_is_rejected() {
	let opts = ConvertOptions::default();
	let err = convert_one(AitString::from("-1"), PrimitiveType::Uint32, &opts).expect_err("negative unsigned");
	assert!(matches!(err, GddError::Underflow { dest: PrimitiveType::Uint32 }));

	let err = convert_one(AitString::from("70000"), PrimitiveType::Uint16, &opts).expect_err("too large");
	assert!(matches!(err, GddError::Overflow { dest: PrimitiveType::Uint16 }));

	let err = convert_one(FixedString::new("volts"), PrimitiveType::Float64, &opts).expect_err("not a number");
	assert!(matches!(err, GddError::BadNumber { .. }));
}

#[test]
fn enum_text_uses_choice_table_and_falls_back_to_numeral() {
	let choices = EnumStringTable::new(["off", "on", "fault"]);
	let opts = ConvertOptions::default().with_enum_strings(&choices);

	let out = convert_one(Enum16(1), PrimitiveType::String, &opts).expect("renders");
	assert_eq!(text_of(&out), "on");

	let out = convert_one(Enum16(999), PrimitiveType::FixedString, &opts).expect("renders");
	assert_eq!(text_of(&out), "999");

	let out = convert_one(AitString::from("fault"), PrimitiveType::Enum16, &opts).expect("parses");
	assert_eq!(out, ArrayData::Enum16(vec![Enum16(2)]));

	let out = convert_one(AitString::from("7"), PrimitiveType::Enum16, &opts).expect("parses numeral");
	assert_eq!(out, ArrayData::Enum16(vec![Enum16(7)]));
}

#[test]
fn uint16_text_ignores_enum_numerals() {
	let out = convert_one(999_u16, PrimitiveType::String, &ConvertOptions::default()).expect("renders");
	assert_eq!(text_of(&out), "999");
}

#[test]
fn network_tables_swap_words() {
	let opts = ConvertOptions::default();
	let mut out = [0_i32; 2];
	convert_with(Direction::ToNet, &mut crate::gdd::ElemsMut::Int32(&mut out), Elems::Int16(&[1, -2]), 2, &opts).expect("converts");
	assert_eq!(i32::from_be(out[0]), 1);
	assert_eq!(i32::from_be(out[1]), -2);

	let mut back = [0.0_f64; 1];
	convert_with(Direction::FromNet, &mut crate::gdd::ElemsMut::Float64(&mut back), Elems::Int16(&[258_i16.to_be()]), 1, &opts).expect("converts");
	assert_eq!(back[0], 258.0);

	let mut swapped = [0.0_f32; 1];
	convert_with(Direction::ToNet, &mut crate::gdd::ElemsMut::Float32(&mut swapped), Elems::Float32(&[1.5]), 1, &opts).expect("copies");
	assert_eq!(f32::from_bits(u32::from_be(swapped[0].to_bits())), 1.5);
}

#[test]
fn short_destination_is_out_of_bounds() {
	let mut out = [0_u8; 1];
	let err = convert(&mut crate::gdd::ElemsMut::Uint8(&mut out), Elems::Uint8(&[1, 2]), 2, &ConvertOptions::default()).expect_err("too short");
	assert!(matches!(err, GddError::OutOfBounds { index: 2, len: 1 }));
}

#[test]
fn double_to_single_is_excluded_narrowing() {
	assert!(!lossless_targets(PrimitiveType::Float64).contains(&PrimitiveType::Float32));
	assert_ne!(round_trip(0.1_f64, PrimitiveType::Float32), 0.1_f64);
}

fn check_all<A: Element + PartialEq + Debug + Copy>(value: A) -> Result<(), TestCaseError> {
	for via in lossless_targets(A::PRIM) {
		prop_assert_eq!(round_trip(value, *via), value, "via {}", via);
	}
	Ok(())
}

proptest! {
	#[test]
	fn prop_int8_round_trips(value in any::<i8>()) { check_all(value)?; }

	#[test]
	fn prop_uint8_round_trips(value in any::<u8>()) { check_all(value)?; }

	#[test]
	fn prop_int16_round_trips(value in any::<i16>()) { check_all(value)?; }

	#[test]
	fn prop_uint16_round_trips(value in any::<u16>()) { check_all(value)?; }

	#[test]
	fn prop_enum16_round_trips(value in any::<u16>()) { check_all(Enum16(value))?; }

	#[test]
	fn prop_int32_round_trips(value in any::<i32>()) { check_all(value)?; }

	#[test]
	fn prop_uint32_round_trips(value in any::<u32>()) { check_all(value)?; }

	#[test]
	fn prop_float32_round_trips(value in -1.0e30_f32..1.0e30_f32) { check_all(value)?; }

	#[test]
	fn prop_float64_round_trips(value in -1.0e300_f64..1.0e300_f64) { check_all(value)?; }
}

#[test]
fn typed_element_views_always_find_a_cell() {
	for direction in [Direction::Normal, Direction::ToNet, Direction::FromNet] {
		for src in PrimitiveType::CONVERTIBLE {
			for dest in PrimitiveType::CONVERTIBLE {
				let source = ArrayData::zeroed(src, 1).expect("typed source");
				let mut target = ArrayData::zeroed(dest, 1).expect("typed target");
				let result = convert_with(direction, &mut target.as_elems_mut(), source.as_elems(), 1, &ConvertOptions::default());
				assert!(!matches!(result, Err(GddError::NoConversion { .. })), "{direction:?} {src} -> {dest}");
			}
		}
	}
}
