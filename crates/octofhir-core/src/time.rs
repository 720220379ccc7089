use crate::error::{CoreError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FhirDateTime(pub OffsetDateTime);

impl FhirDateTime {
    pub fn new(datetime: OffsetDateTime) -> Self {
        Self(datetime)
    }

    pub fn inner(&self) -> &OffsetDateTime {
        &self.0
    }

    pub fn into_inner(self) -> OffsetDateTime {
        self.0
    }
}

impl fmt::Display for FhirDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self.0.format(&Rfc3339).map_err(|_| fmt::Error)?;
        write!(f, "{formatted}")
    }
}

impl FromStr for FhirDateTime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let datetime = OffsetDateTime::parse(s, &Rfc3339).map_err(|e| {
            CoreError::invalid_date_time(format!("Failed to parse FHIR DateTime '{s}': {e}"))
        })?;
        Ok(FhirDateTime(datetime))
    }
}

impl Serialize for FhirDateTime {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let formatted = self.0.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&formatted)
    }
}

impl<'de> Deserialize<'de> for FhirDateTime {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FhirDateTime::from_str(&s).map_err(serde::de::Error::custom)
    }
}

pub fn now_utc() -> FhirDateTime {
    FhirDateTime(OffsetDateTime::now_utc())
}

/// How much of a FHIR date/dateTime value was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    Year,
    Month,
    Day,
    Instant,
}

/// A FHIR `date` or `dateTime` value at whatever precision it was written.
///
/// FHIR allows `YYYY`, `YYYY-MM`, `YYYY-MM-DD` and full RFC 3339 timestamps.
/// The first three denote a whole period rather than a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialDateTime {
    Year(i32),
    YearMonth(i32, Month),
    Date(Date),
    DateTime(OffsetDateTime),
}

impl PartialDateTime {
    pub fn precision(&self) -> Precision {
        match self {
            Self::Year(_) => Precision::Year,
            Self::YearMonth(..) => Precision::Month,
            Self::Date(_) => Precision::Day,
            Self::DateTime(_) => Precision::Instant,
        }
    }

    /// Half-open `[start, end)` range of days covered by the value.
    ///
    /// Returns `None` for a full timestamp, which is a single instant.
    pub fn period(&self) -> Result<Option<(Date, Date)>> {
        let range = match *self {
            Self::Year(year) => (first_day(year, Month::January)?, first_day(year + 1, Month::January)?),
            Self::YearMonth(year, month) => {
                let end = match month {
                    Month::December => first_day(year + 1, Month::January)?,
                    _ => first_day(year, month.next())?,
                };
                (first_day(year, month)?, end)
            }
            Self::Date(date) => {
                let end = date.next_day().ok_or_else(|| {
                    CoreError::invalid_date_time(format!("Date {date} has no following day"))
                })?;
                (date, end)
            }
            Self::DateTime(_) => return Ok(None),
        };
        Ok(Some(range))
    }
}

fn first_day(year: i32, month: Month) -> Result<Date> {
    Date::from_calendar_date(year, month, 1)
        .map_err(|e| CoreError::invalid_date_time(format!("{year}-{}: {e}", month as u8)))
}

impl FromStr for PartialDateTime {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |detail: &dyn fmt::Display| {
            CoreError::invalid_date_time(format!("Failed to parse FHIR date '{s}': {detail}"))
        };
        let bytes = s.as_bytes();
        let all_digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);

        match bytes.len() {
            4 if all_digits(0..4) => {
                let year = s.parse::<i32>().map_err(|e| invalid(&e))?;
                Ok(Self::Year(year))
            }
            7 if all_digits(0..4) && bytes[4] == b'-' && all_digits(5..7) => {
                let year = s[..4].parse::<i32>().map_err(|e| invalid(&e))?;
                let month = s[5..7].parse::<u8>().map_err(|e| invalid(&e))?;
                let month = Month::try_from(month).map_err(|e| invalid(&e))?;
                Ok(Self::YearMonth(year, month))
            }
            10 => Date::parse(s, format_description!("[year]-[month]-[day]"))
                .map(Self::Date)
                .map_err(|e| invalid(&e)),
            _ => OffsetDateTime::parse(s, &Rfc3339)
                .map(Self::DateTime)
                .map_err(|e| invalid(&e)),
        }
    }
}
