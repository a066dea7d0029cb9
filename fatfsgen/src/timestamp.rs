//! Calendar timestamps and the packed date/time fields of FAT directory
//! entries.

use core::fmt::{self, Display, Formatter};

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

pub const MIN_YEAR: i32 = 1980;
pub const MAX_YEAR: i32 = 2107;

/// A calendar date and time with one-second resolution.
///
/// Field order matters: the derived [`Ord`] is chronological.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarTimestamp {
	pub year: u16,
	/// 1 = January
	pub month: u8,
	pub day: u8,
	pub hour: u8,
	pub minute: u8,
	pub second: u8,
}

impl CalendarTimestamp {
	/// 1980-01-01 00:00:00, the earliest timestamp a FAT directory entry can
	/// hold.
	pub const FAT_EPOCH: Self = Self {
		year: MIN_YEAR as u16,
		month: 1,
		day: 1,
		hour: 0,
		minute: 0,
		second: 0,
	};
	/// 2107-12-31 23:59:58, the latest timestamp a FAT directory entry can
	/// hold.
	pub const FAT_MAX: Self = Self {
		year: MAX_YEAR as u16,
		month: 12,
		day: 31,
		hour: 23,
		minute: 59,
		second: 58,
	};

	/// Creates a timestamp, checking that it names a real calendar date and
	/// time of day inside the FAT range.
	///
	/// # Examples
	/// ```
	/// # use fatfsgen::timestamp::CalendarTimestamp;
	/// assert!(CalendarTimestamp::new(2024, 2, 29, 12, 0, 0).is_ok());
	/// assert!(CalendarTimestamp::new(2023, 2, 29, 12, 0, 0).is_err());
	/// assert!(CalendarTimestamp::new(1979, 12, 31, 23, 59, 59).unwrap_err().underflow());
	/// ```
	pub fn new(
		year: u16,
		month: u8,
		day: u8,
		hour: u8,
		minute: u8,
		second: u8,
	) -> Result<Self, RangeError> {
		let ts = Self {
			year,
			month,
			day,
			hour,
			minute,
			second,
		};
		ts.validate()?;
		Ok(ts)
	}

	pub const fn validate(&self) -> Result<(), RangeError> {
		if (self.year as i32) < MIN_YEAR {
			return Err(RangeError::new(RangeErrorKind::Underflow));
		}
		if self.year as i32 > MAX_YEAR {
			return Err(RangeError::new(RangeErrorKind::Overflow));
		}
		if self.month == 0
			|| self.month > 12
			|| self.day == 0
			|| self.day > days_in_month(self.year, self.month)
			|| self.hour > 23
			|| self.minute > 59
			|| self.second > 59
		{
			return Err(RangeError::new(RangeErrorKind::InvalidField));
		}
		Ok(())
	}

	/// The same timestamp rounded down to the two-second resolution of the
	/// FAT write time.
	#[inline]
	pub const fn truncated(self) -> Self {
		Self {
			second: self.second & !1,
			..self
		}
	}

	/// Displays only the date part as `YYYY-MM-DD`.
	#[inline]
	pub const fn date(self) -> DateDisplay {
		DateDisplay(self)
	}

	pub fn from_naive(dt: NaiveDateTime) -> Result<Self, RangeError> {
		if dt.year() < MIN_YEAR {
			return Err(RangeError::new(RangeErrorKind::Underflow));
		}
		if dt.year() > MAX_YEAR {
			return Err(RangeError::new(RangeErrorKind::Overflow));
		}
		Self::new(
			dt.year() as u16,
			dt.month() as u8,
			dt.day() as u8,
			dt.hour() as u8,
			dt.minute() as u8,
			dt.second() as u8,
		)
	}

	pub fn to_naive(self) -> Option<NaiveDateTime> {
		NaiveDate::from_ymd_opt(self.year.into(), self.month.into(), self.day.into())?.and_hms_opt(
			self.hour.into(),
			self.minute.into(),
			self.second.into(),
		)
	}

	/// Converts a host file time, saturating at the ends of the FAT range.
	#[cfg(feature = "std")]
	pub fn from_system_time(time: std::time::SystemTime) -> Self {
		let local = chrono::DateTime::<chrono::Local>::from(time);
		Self::from_naive(local.naive_local()).unwrap_or_else(RangeError::saturating)
	}
}

impl Default for CalendarTimestamp {
	#[inline]
	fn default() -> Self {
		Self::FAT_EPOCH
	}
}

impl Display for CalendarTimestamp {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} {:02}:{:02}:{:02}",
			self.date(),
			self.hour,
			self.minute,
			self.second
		)
	}
}

/// Date part of a [`CalendarTimestamp`], see [`CalendarTimestamp::date`].
#[derive(Clone, Copy, Debug)]
pub struct DateDisplay(CalendarTimestamp);

impl Display for DateDisplay {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "{:04}-{:02}-{:02}", self.0.year, self.0.month, self.0.day)
	}
}

const fn is_leap_year(year: u16) -> bool {
	year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Returns 0 for an invalid month.
pub const fn days_in_month(year: u16, month: u8) -> u8 {
	match month {
		1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
		4 | 6 | 9 | 11 => 30,
		2 if is_leap_year(year) => 29,
		2 => 28,
		_ => 0,
	}
}

/// Packed date field of a directory entry, in native endianness.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PackedFatDate(pub u16);

/// Packed write time field of a directory entry, in native endianness.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PackedFatTime(pub u16);

/// Encodes a timestamp into the packed directory-entry fields, dropping the
/// odd second.
///
/// # Errors
/// Throws if the timestamp lies outside the FAT range or is not a valid
/// calendar value.
///
/// # Examples
/// ```
/// # use fatfsgen::timestamp::{decode, encode, CalendarTimestamp};
/// let ts = CalendarTimestamp::new(2022, 9, 14, 17, 29, 3).unwrap();
/// let (date, time) = encode(ts).unwrap();
/// assert_eq!(decode(date, time), ts.truncated());
///
/// let too_late = CalendarTimestamp { year: 2108, ..ts };
/// assert!(encode(too_late).unwrap_err().overflow());
/// ```
pub const fn encode(ts: CalendarTimestamp) -> Result<(PackedFatDate, PackedFatTime), RangeError> {
	if let Err(e) = ts.validate() {
		return Err(e);
	}
	let date = match pack_date((ts.year as i32, ts.month, ts.day)) {
		Ok(date) => date,
		Err(e) => return Err(e),
	};
	Ok((
		PackedFatDate(date),
		PackedFatTime(pack_write_time((ts.hour, ts.minute, ts.second))),
	))
}

/// Like [`encode`], but clamps timestamps outside the FAT range.
///
/// # Examples
/// ```
/// # use fatfsgen::timestamp::{decode, encode_saturating, CalendarTimestamp};
/// let ts = CalendarTimestamp { year: 2200, ..CalendarTimestamp::FAT_EPOCH };
/// let (date, time) = encode_saturating(ts);
/// assert_eq!(decode(date, time), CalendarTimestamp::FAT_MAX);
/// ```
pub const fn encode_saturating(ts: CalendarTimestamp) -> (PackedFatDate, PackedFatTime) {
	match encode(ts) {
		Ok(packed) => packed,
		Err(e) => (e.saturating_date(), e.saturating_time()),
	}
}

/// Decodes the packed directory-entry fields.
///
/// Every bit pattern decodes to a valid timestamp: fields outside their
/// range are clamped to the nearest valid value.
///
/// # Examples
/// ```
/// # use fatfsgen::timestamp::{decode, default_timestamp, PackedFatDate, PackedFatTime};
/// assert_eq!(decode(PackedFatDate(0), PackedFatTime(0)), default_timestamp());
/// let ts = decode(PackedFatDate(u16::MAX), PackedFatTime(u16::MAX));
/// assert_eq!((ts.year, ts.month, ts.day), (2107, 12, 31));
/// assert_eq!((ts.hour, ts.minute, ts.second), (23, 59, 58));
/// ```
pub const fn decode(date: PackedFatDate, time: PackedFatTime) -> CalendarTimestamp {
	let (year, month, day) = unpack_date(date.0);
	let (hour, minute, second) = unpack_write_time(time.0);
	let year = year as u16;
	let month = clamp(month, 1, 12);
	let day = clamp(day, 1, days_in_month(year, month));
	CalendarTimestamp {
		year,
		month,
		day,
		hour: clamp(hour, 0, 23),
		minute: clamp(minute, 0, 59),
		second: clamp(second, 0, 58),
	}
}

const fn clamp(v: u8, min: u8, max: u8) -> u8 {
	if v < min {
		min
	} else if v > max {
		max
	} else {
		v
	}
}

/// The timestamp given to entries whose source has no reliable modification
/// time, or when timestamps are suppressed for reproducible images.
#[inline]
pub const fn default_timestamp() -> CalendarTimestamp {
	CalendarTimestamp::FAT_EPOCH
}

/// Encodes `(year, month, day)` into a packed native-endian FAT date.
///
/// The result will not represent a valid date if the input has an invalid month
/// or day component.
///
/// # Errors
/// Throws if the year lies outside the valid range.
///
/// # Examples
/// ```
/// # use fatfsgen::timestamp::{pack_date, MAX_YEAR};
/// assert_eq!(pack_date((2015, 5, 15)).unwrap(), 0x46AF);
///
/// let e = pack_date((2177, 5, 15)).unwrap_err();
/// assert!(e.overflow());
/// assert_eq!(e.saturating().year as i32, MAX_YEAR);
/// ```
pub const fn pack_date((year, month, day): (i32, u8, u8)) -> Result<u16, RangeError> {
	if year < MIN_YEAR {
		return Err(RangeError::new(RangeErrorKind::Underflow));
	}
	let year = year - MIN_YEAR;
	if year >= 0x80 {
		return Err(RangeError::new(RangeErrorKind::Overflow));
	}
	Ok((year as u16) << 9 | (month as u16) << 5 | day as u16)
}

/// Decodes a packed native-endian FAT date into `(year, month, day)`.
///
/// The result might not be a valid date.
///
/// # Examples
/// ```
/// # use fatfsgen::timestamp::{unpack_date, MAX_YEAR, MIN_YEAR};
/// assert_eq!(unpack_date(0), (MIN_YEAR, 0, 0));
/// assert_eq!(unpack_date(0x46AF), (2015, 5, 15));
/// assert_eq!(unpack_date(u16::MAX), (MAX_YEAR, 15, 31));
/// ```
pub const fn unpack_date(packed: u16) -> (i32, u8, u8) {
	(
		MIN_YEAR + (packed >> 9) as i32,
		(packed >> 5) as u8 & 0x0F,
		packed as u8 & 0x1F,
	)
}

/// Encodes `(hours, minutes, seconds)` into a packed native-endian FAT write
/// time.
///
/// The result will not represent a valid time if the input was invalid.
///
/// # Examples
/// ```
/// # use fatfsgen::timestamp::pack_write_time;
/// assert_eq!(pack_write_time((17, 29, 3)), 0x8BA1);
/// ```
pub const fn pack_write_time((hours, minutes, seconds): (u8, u8, u8)) -> u16 {
	(hours as u16) << 0xB | (minutes as u16) << 5 | seconds as u16 >> 1
}

/// Decodes a packed native-endian FAT write time into
/// `(hours, minutes, seconds)`.
///
/// The result might not be a valid time.
///
/// # Examples
/// ```
/// # use fatfsgen::timestamp::unpack_write_time;
/// assert_eq!(unpack_write_time(0x8BA1), (17, 29, 2));
/// ```
pub const fn unpack_write_time(packed: u16) -> (u8, u8, u8) {
	(
		(packed >> 0xB) as u8,
		(packed >> 5) as u8 & 0x3F,
		(packed as u8 & 0x1F) << 1,
	)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RangeErrorKind {
	Underflow,
	Overflow,
	InvalidField,
}

/// A timestamp that a FAT directory entry cannot hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeError {
	kind: RangeErrorKind,
}

impl RangeError {
	const fn new(kind: RangeErrorKind) -> Self {
		Self { kind }
	}

	/// Whether the year was past [`MAX_YEAR`].
	#[inline]
	pub const fn overflow(self) -> bool {
		matches!(self.kind, RangeErrorKind::Overflow)
	}
	/// Whether the year was before [`MIN_YEAR`].
	#[inline]
	pub const fn underflow(self) -> bool {
		matches!(self.kind, RangeErrorKind::Underflow)
	}

	/// The closest timestamp that can be stored.
	///
	/// An invalid month, day or time of day has no closest value, so
	/// [`CalendarTimestamp::FAT_EPOCH`] is returned for those.
	#[inline]
	pub const fn saturating(self) -> CalendarTimestamp {
		match self.kind {
			RangeErrorKind::Overflow => CalendarTimestamp::FAT_MAX,
			_ => CalendarTimestamp::FAT_EPOCH,
		}
	}
	/// [`Self::saturating`] in packed form.
	#[inline]
	pub const fn saturating_date(self) -> PackedFatDate {
		match self.kind {
			RangeErrorKind::Overflow => PackedFatDate(0xFF9F),
			_ => PackedFatDate(0x21),
		}
	}
	#[inline]
	pub const fn saturating_time(self) -> PackedFatTime {
		match self.kind {
			RangeErrorKind::Overflow => PackedFatTime(0xBF7D),
			_ => PackedFatTime(0),
		}
	}
}

impl Display for RangeError {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str("FAT timestamp out of range: ")?;
		f.write_str(match self.kind {
			RangeErrorKind::Underflow => "year before 1980",
			RangeErrorKind::Overflow => "year after 2107",
			RangeErrorKind::InvalidField => "not a valid calendar date and time",
		})
	}
}

#[cfg(feature = "std")]
impl std::error::Error for RangeError {}

/// Something that knows the current time.
///
/// A [`CalendarTimestamp`] is a time source that never advances.
pub trait TimeSource {
	fn now(&self) -> CalendarTimestamp;
}

impl TimeSource for CalendarTimestamp {
	#[inline]
	fn now(&self) -> CalendarTimestamp {
		*self
	}
}

/// The host's local wall clock.
#[cfg(feature = "std")]
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

#[cfg(feature = "std")]
impl TimeSource for SystemClock {
	fn now(&self) -> CalendarTimestamp {
		CalendarTimestamp::from_naive(chrono::Local::now().naive_local())
			.unwrap_or_else(RangeError::saturating)
	}
}
