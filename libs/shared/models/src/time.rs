use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, SecondsFormat, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

static CLINIC_OFFSET: OnceLock<FixedOffset> = OnceLock::new();

/// Sets the clinic's UTC offset once at startup. Returns false if it was
/// already set.
pub fn set_clinic_offset(offset: FixedOffset) -> bool {
    CLINIC_OFFSET.set(offset).is_ok()
}

/// The clinic's UTC offset; UTC until configured.
pub fn clinic_offset() -> FixedOffset {
    CLINIC_OFFSET.get().copied().unwrap_or_else(|| Utc.fix())
}

/// The one temporal value used past the store boundary.
///
/// Store documents carry times in several shapes (RFC 3339 strings,
/// `timestamp without time zone` text, bare dates, epoch milliseconds and
/// `{seconds, nanoseconds}` objects). They are all converted here, on
/// deserialization, and nowhere else.
///
/// A value written with an explicit offset keeps it. Values without one are
/// read as clinic wall-clock time (naive text, bare dates), or placed in the
/// clinic offset (epoch shapes). Equality and ordering compare instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<FixedOffset>);

impl Timestamp {
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(value: DateTime<Utc>) -> Self {
        Self(value.with_timezone(&clinic_offset()))
    }

    pub fn from_millis(millis: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(millis).single().map(Self::from_datetime)
    }

    fn from_wall_clock(value: NaiveDateTime) -> Option<Self> {
        clinic_offset().from_local_datetime(&value).single().map(Self)
    }

    /// Midnight clinic time on the given day.
    pub fn from_date(date: NaiveDate) -> Self {
        let offset = clinic_offset();
        let midnight = date.and_time(chrono::NaiveTime::MIN);
        let utc = midnight - Duration::seconds(i64::from(offset.local_minus_utc()));
        Self(DateTime::from_naive_utc_and_offset(utc, offset))
    }

    /// The instant in UTC.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0.with_timezone(&Utc)
    }

    /// The value in the offset it was recorded with.
    pub fn local(&self) -> DateTime<FixedOffset> {
        self.0
    }

    /// Calendar date component as recorded, ignoring time of day.
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(value) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self(value));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(value) = NaiveDateTime::parse_from_str(raw, format) {
                return Self::from_wall_clock(value);
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .map(Self::from_date)
    }

    /// Renders an optional timestamp, falling back to `N/A`.
    pub fn display_or_na(value: Option<&Timestamp>) -> String {
        value
            .map(|ts| ts.0.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::from_datetime(value)
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Self(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Text(String),
    Millis(i64),
    Fractional(f64),
    Parts {
        #[serde(alias = "_seconds")]
        seconds: i64,
        #[serde(default, alias = "_nanoseconds")]
        nanoseconds: u32,
    },
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Text(raw) => Timestamp::parse(&raw),
            RawTimestamp::Millis(millis) => Timestamp::from_millis(millis),
            RawTimestamp::Fractional(millis) => Timestamp::from_millis(millis as i64),
            RawTimestamp::Parts { seconds, nanoseconds } => Utc
                .timestamp_opt(seconds, nanoseconds)
                .single()
                .map(Timestamp::from_datetime),
        };

        parsed.ok_or_else(|| de::Error::custom("unrecognised timestamp value"))
    }
}
