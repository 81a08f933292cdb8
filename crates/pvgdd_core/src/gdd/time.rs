use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds and nanoseconds since the Unix epoch, as carried in headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeStamp {
	/// Whole seconds.
	pub sec: u32,
	/// Nanoseconds within the second.
	pub nsec: u32,
}

impl TimeStamp {
	/// Stamp from raw parts.
	pub const fn new(sec: u32, nsec: u32) -> Self {
		Self { sec, nsec }
	}

	/// Current wall-clock time, saturating outside the representable range.
	pub fn now() -> Self {
		let since = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
		Self::from(since)
	}
}

impl From<Duration> for TimeStamp {
	fn from(value: Duration) -> Self {
		Self {
			sec: u32::try_from(value.as_secs()).unwrap_or(u32::MAX),
			nsec: value.subsec_nanos(),
		}
	}
}

impl From<TimeStamp> for Duration {
	fn from(value: TimeStamp) -> Self {
		Duration::new(u64::from(value.sec), value.nsec)
	}
}
