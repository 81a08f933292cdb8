use super::{HEADER_MAGIC, WireHeader};
use crate::gdd::{AitString, Bounds, BoundsVec, DataFormat, GddError, PrimitiveType, TaggedValue, TimeStamp};

fn status_array() -> TaggedValue {
	let value = TaggedValue::new(5);
	value.put_array(&[1_u16, 2]).expect("stored");
	value.set_status(3, 2);
	value.set_time_stamp(TimeStamp::new(10, 20));
	value
}

#[test]
fn network_header_is_big_endian() {
	let bytes = status_array().to_wire(DataFormat::Network).expect("encoded");
	assert_eq!(&bytes[0..4], &HEADER_MAGIC);
	assert_eq!(bytes[4], 1);
	assert_eq!(bytes[5], PrimitiveType::Uint16 as u8);
	assert_eq!(&bytes[6..8], &5_u16.to_be_bytes());
	assert_eq!(&bytes[8..12], &((2_u32 << 16) | 3).to_be_bytes());
	assert_eq!(&bytes[12..16], &10_u32.to_be_bytes());
	assert_eq!(&bytes[16..20], &20_u32.to_be_bytes());
	assert_eq!(&bytes[20..24], &2_u32.to_be_bytes());
	assert_eq!(&bytes[24..28], &0_u32.to_be_bytes());
	assert_eq!(&bytes[28..], &[0, 1, 0, 2]);
}

#[test]
fn both_formats_decode_to_an_equal_value() {
	let value = status_array();
	for format in [DataFormat::Local, DataFormat::Network] {
		let bytes = value.to_wire(format).expect("encoded");
		let (decoded, consumed) = TaggedValue::from_wire(&bytes, format).expect("decoded");
		assert_eq!(consumed, bytes.len());
		assert!(decoded.content_eq(&value), "{format:?}");
	}
}

#[test]
fn out_matches_to_wire() {
	let value = status_array();
	let expected = value.to_wire(DataFormat::Local).expect("encoded");
	let mut buf = vec![0_u8; expected.len() + 8];
	let written = value.out(&mut buf, DataFormat::Local).expect("written");
	assert_eq!(&buf[..written], expected.as_slice());

	let mut short = vec![0_u8; expected.len() - 1];
	assert!(matches!(value.out(&mut short, DataFormat::Local), Err(GddError::BufferTooSmall { .. })));
}

#[test]
fn header_parse_reports_shape() {
	let bytes = status_array().to_wire(DataFormat::Local).expect("encoded");
	let (header, consumed) = WireHeader::parse(&bytes, DataFormat::Local).expect("parsed");
	assert_eq!(consumed, WireHeader::size_for(1));
	assert_eq!(header.app, 5);
	assert_eq!((header.stat, header.sevr), (3, 2));
	assert_eq!(header.element_count().expect("count"), 2);
	assert_eq!(header.encoded_len(), consumed);
}

#[test]
fn missing_magic_is_a_bad_header() {
	let err = WireHeader::parse(b"HEDX\x00\x00", DataFormat::Network).expect_err("bad magic");
	assert!(matches!(err, GddError::BadHeader { magic } if magic == *b"HEDX"));
	assert!(matches!(WireHeader::parse(b"HE", DataFormat::Local), Err(GddError::BadHeader { .. })));
}

#[test]
fn unknown_primitive_in_header_is_refused() {
	let mut bytes = status_array().to_wire(DataFormat::Local).expect("encoded");
	bytes[5] = 99;
	assert!(matches!(WireHeader::parse(&bytes, DataFormat::Local), Err(GddError::TypeMismatch { .. })));
}

#[test]
fn variable_string_is_length_prefixed() {
	let value = TaggedValue::new(1);
	value.put(AitString::copied("hello")).expect("set");
	let bytes = value.to_wire(DataFormat::Network).expect("encoded");
	assert_eq!(bytes.len(), WireHeader::size_for(0) + 4 + 5);
	assert_eq!(&bytes[20..24], &5_u32.to_be_bytes());
	assert_eq!(&bytes[24..], b"hello");

	let (decoded, _) = TaggedValue::from_wire(&bytes, DataFormat::Network).expect("decoded");
	assert_eq!(decoded.get::<AitString>().expect("text").as_str(), "hello");
}

#[test]
fn out_data_converts_to_the_requested_type() {
	let value = TaggedValue::new(1);
	value.put_array(&[1.0_f64, 300.0]).expect("stored");
	let mut buf = [0_u8; 8];
	let written = value.out_data(&mut buf, PrimitiveType::Int16, DataFormat::Network).expect("written");
	assert_eq!(written, 4);
	assert_eq!(&buf[..4], &[0, 1, 1, 44]);
}

#[test]
fn containers_have_no_wire_data() {
	let container = TaggedValue::container(1);
	assert!(matches!(container.to_wire(DataFormat::Local), Err(GddError::NotSupported { .. })));
}

#[test]
fn in_data_with_count_reshapes_and_converts() {
	let untyped = TaggedValue::new(3);
	let raw = [7_u32, 8, 9].iter().flat_map(|value| value.to_ne_bytes()).collect::<Vec<_>>();
	let consumed = untyped.in_data(&raw, 3, PrimitiveType::Uint32, DataFormat::Local).expect("read");
	assert_eq!(consumed, 12);
	assert_eq!(untyped.primitive_type(), PrimitiveType::Uint32);
	assert_eq!(untyped.get_array::<u32>().expect("values"), vec![7, 8, 9]);

	let typed = TaggedValue::scalar(4, PrimitiveType::Float64);
	let raw = [5_i16, -6].iter().flat_map(|value| value.to_be_bytes()).collect::<Vec<_>>();
	typed.in_data(&raw, 2, PrimitiveType::Int16, DataFormat::Network).expect("read");
	assert_eq!(typed.primitive_type(), PrimitiveType::Float64);
	assert_eq!(typed.get_array::<f64>().expect("values"), vec![5.0, -6.0]);
}

#[test]
fn in_data_needs_some_type() {
	let untyped = TaggedValue::new(3);
	assert!(matches!(
		untyped.in_data(&[0; 4], 1, PrimitiveType::Invalid, DataFormat::Local),
		Err(GddError::TypeMismatch { .. })
	));
}

#[test]
fn truncated_data_is_an_error() {
	let bytes = status_array().to_wire(DataFormat::Local).expect("encoded");
	assert!(TaggedValue::from_wire(&bytes[..bytes.len() - 1], DataFormat::Local).is_err());
}

fn header_bytes(prim: PrimitiveType, sizes: &[u32]) -> Vec<u8> {
	let header = WireHeader {
		prim,
		app: 7,
		stat: 0,
		sevr: 0,
		time: TimeStamp::default(),
		bounds: sizes.iter().map(|size| Bounds::sized(*size)).collect::<BoundsVec>(),
	};
	let mut buf = vec![0_u8; header.encoded_len()];
	header.write(&mut buf, DataFormat::Network).expect("header written");
	buf
}

#[test]
fn oversized_header_shapes_are_refused() {
	let huge = header_bytes(PrimitiveType::Uint8, &[u32::MAX; 3]);
	let (header, _) = WireHeader::parse(&huge, DataFormat::Network).expect("parsed");
	assert!(matches!(header.element_count(), Err(GddError::ShapeTooLarge { .. })));
	let err = TaggedValue::from_wire(&huge, DataFormat::Network).expect_err("refused");
	assert!(matches!(err, GddError::ShapeTooLarge { what: "element count" }), "{err}");
	assert_eq!(err.status(), -5);

	let strings = header_bytes(PrimitiveType::FixedString, &[1 << 31, 1 << 31]);
	let err = TaggedValue::from_wire(&strings, DataFormat::Network).expect_err("refused");
	assert!(matches!(err, GddError::ShapeTooLarge { what: "byte length" }), "{err}");
}

#[test]
fn large_header_shape_without_data_is_short_not_fatal() {
	let bytes = header_bytes(PrimitiveType::Float64, &[1 << 20, 1 << 20]);
	let err = TaggedValue::from_wire(&bytes, DataFormat::Network).expect_err("no data");
	assert!(matches!(err, GddError::BufferTooSmall { .. }), "{err}");
}
