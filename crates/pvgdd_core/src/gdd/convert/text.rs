use std::borrow::Cow;

use crate::gdd::{ConvertOptions, GddError, PrimitiveType, Result};

/// Parsed numeric text before the final cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Number {
	Int(i64),
	Float(f64),
}

/// Parse `text` for a numeric destination and range-check it.
///
/// Empty text is zero. An injected enum table is consulted first. Text with
/// `.`, `e` or `E`, and anything that is not an integer, goes through `f64`.
pub(crate) fn parse_number(text: &str, dest: PrimitiveType, opts: &ConvertOptions<'_>) -> Result<Number> {
	let trimmed = text.trim();
	if trimmed.is_empty() {
		return Ok(Number::Int(0));
	}

	if let Some(index) = opts.enum_strings.and_then(|table| table.index_of(trimmed)) {
		return Ok(Number::Int(i64::from(index)));
	}

	let (min, max) = dest.range().ok_or(GddError::NoConversion {
		src: PrimitiveType::String,
		dest,
	})?;

	let looks_float = dest.is_float() || trimmed.contains(['.', 'e', 'E']);
	if !looks_float && let Some(value) = parse_integer(trimmed) {
		check_range(value as f64, min, max, dest)?;
		return Ok(Number::Int(value));
	}

	let value = match trimmed.parse::<f64>() {
		Ok(value) => value,
		// hex text such as `0x1e` trips the float heuristic
		Err(_) => parse_integer(trimmed).map(|value| value as f64).ok_or_else(|| bad_number(trimmed, dest))?,
	};
	if value.is_nan() {
		if dest.is_float() {
			return Ok(Number::Float(value));
		}
		return Err(bad_number(trimmed, dest));
	}
	check_range(value, min, max, dest)?;
	Ok(Number::Float(value))
}

fn parse_integer(text: &str) -> Option<i64> {
	let (negative, digits) = match text.strip_prefix('-') {
		Some(rest) => (true, rest),
		None => (false, text.strip_prefix('+').unwrap_or(text)),
	};

	let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
		Some(hex) => i64::from_str_radix(hex, 16).ok()?,
		None => {
			if !digits.bytes().all(|byte| byte.is_ascii_digit()) || digits.is_empty() {
				return None;
			}
			digits.parse::<i64>().ok()?
		}
	};
	Some(if negative { -magnitude } else { magnitude })
}

fn check_range(value: f64, min: f64, max: f64, dest: PrimitiveType) -> Result<()> {
	if value < min {
		return Err(GddError::Underflow { dest });
	}
	if value > max {
		return Err(GddError::Overflow { dest });
	}
	Ok(())
}

fn bad_number(text: &str, dest: PrimitiveType) -> GddError {
	GddError::BadNumber {
		text: text.to_owned(),
		dest,
	}
}

/// Render `value` like C `%.*g` with `precision` significant digits.
pub(crate) fn format_float(value: f64, precision: usize) -> String {
	if value.is_nan() {
		return "nan".to_owned();
	}
	if value.is_infinite() {
		return if value < 0.0 { "-inf".to_owned() } else { "inf".to_owned() };
	}
	if value == 0.0 {
		return if value.is_sign_negative() { "-0".to_owned() } else { "0".to_owned() };
	}

	let precision = precision.max(1);
	let scientific = format!("{:.*e}", precision - 1, value);
	let Some((mantissa, exponent)) = scientific.split_once('e') else {
		return scientific;
	};
	let Ok(exponent) = exponent.parse::<i32>() else {
		return scientific;
	};

	if exponent < -4 || exponent >= precision as i32 {
		let sign = if exponent < 0 { '-' } else { '+' };
		format!("{}e{sign}{:02}", trim_fraction(mantissa), exponent.unsigned_abs())
	} else {
		let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
		trim_fraction(&format!("{value:.decimals$}")).to_owned()
	}
}

fn trim_fraction(text: &str) -> &str {
	if !text.contains('.') {
		return text;
	}
	text.trim_end_matches('0').trim_end_matches('.')
}

/// Label for an enum index: the table string when defined, else the numeral.
pub(crate) fn enum_label<'a>(index: u16, opts: &ConvertOptions<'a>) -> Cow<'a, str> {
	match opts.enum_strings.and_then(|table| table.label(index)) {
		Some(label) => Cow::Borrowed(label),
		None => Cow::Owned(index.to_string()),
	}
}
