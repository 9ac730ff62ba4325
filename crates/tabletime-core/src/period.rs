//! # Report Periods
//!
//! Turns a user's period choice into an inclusive, day-granular range on the
//! business calendar.
//!
//! ## Resolution
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Selector       │ Inputs needed          │ Range                        │
//! │  ───────────────┼────────────────────────┼───────────────────────────── │
//! │  Today          │ -                      │ today .. today               │
//! │  ThisWeek       │ -                      │ Monday .. Sunday             │
//! │  ThisMonth      │ -                      │ 1st .. last day of month     │
//! │  SpecificDate   │ specific_date          │ date .. date                 │
//! │  DateRange      │ start_date, end_date   │ start .. end (start ≤ end)   │
//! │                                                                         │
//! │  Every range spans 00:00:00.000 of its first day through               │
//! │  23:59:59.999 of its last day, in the business calendar's offset.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Missing inputs are a [`ValidationError`], never an empty report.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveTime, Offset, TimeZone,
    Utc,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::TableSession;

/// Largest accepted business-calendar offset from UTC, in minutes.
pub const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

// =============================================================================
// Business Calendar
// =============================================================================

/// The fixed UTC offset that decides which day a timestamp belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    offset: FixedOffset,
}

impl BusinessCalendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// Calendar for an offset east of UTC, in minutes (negative = west).
    pub fn from_offset_minutes(minutes: i32) -> Result<Self, ValidationError> {
        if minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(ValidationError::OutOfRange {
                field: "utc_offset_minutes".to_string(),
                min: -(MAX_UTC_OFFSET_MINUTES as i64),
                max: MAX_UTC_OFFSET_MINUTES as i64,
            });
        }
        FixedOffset::east_opt(minutes * 60)
            .map(Self::new)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "utc_offset_minutes".to_string(),
                reason: format!("{minutes} is not a valid offset"),
            })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// The business day a timestamp falls on.
    pub fn day_of(&self, ts: DateTime<Utc>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }

    /// 00:00:00.000 of `date`, as a UTC instant.
    pub fn start_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::MIN);
        let utc = local_midnight - Duration::seconds(self.offset.local_minus_utc() as i64);
        Utc.from_utc_datetime(&utc)
    }

    /// 23:59:59.999 of `date`, as a UTC instant.
    pub fn end_of_day(&self, date: NaiveDate) -> DateTime<Utc> {
        self.start_of_day(date) + Duration::days(1) - Duration::milliseconds(1)
    }
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

// =============================================================================
// Period Selector
// =============================================================================

/// The user's choice of report window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub enum PeriodSelector {
    Today,
    ThisWeek,
    ThisMonth,
    SpecificDate,
    DateRange,
}

impl std::str::FromStr for PeriodSelector {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "today" => Ok(PeriodSelector::Today),
            "thisweek" | "week" => Ok(PeriodSelector::ThisWeek),
            "thismonth" | "month" => Ok(PeriodSelector::ThisMonth),
            "specificdate" | "date" => Ok(PeriodSelector::SpecificDate),
            "daterange" | "range" => Ok(PeriodSelector::DateRange),
            _ => Err(ValidationError::NotAllowed {
                field: "period".to_string(),
                allowed: ["today", "thisWeek", "thisMonth", "specificDate", "dateRange"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

/// User-supplied dates; which ones are required depends on the selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DateInputs {
    #[ts(as = "Option<String>")]
    pub specific_date: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub start_date: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub end_date: Option<NaiveDate>,
}

impl DateInputs {
    pub fn specific(date: NaiveDate) -> Self {
        Self {
            specific_date: Some(date),
            ..Self::default()
        }
    }

    pub fn range(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
            ..Self::default()
        }
    }
}

// =============================================================================
// Report Range
// =============================================================================

/// An inclusive day range with its wall-clock bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReportRange {
    #[ts(as = "String")]
    pub start_date: NaiveDate,
    #[ts(as = "String")]
    pub end_date: NaiveDate,
    /// 00:00:00.000 of `start_date`.
    #[ts(as = "String")]
    pub start: DateTime<Utc>,
    /// 23:59:59.999 of `end_date`.
    #[ts(as = "String")]
    pub end: DateTime<Utc>,
}

impl ReportRange {
    /// Builds a range, rejecting `start_date > end_date`.
    pub fn new(
        start_date: NaiveDate,
        end_date: NaiveDate,
        calendar: &BusinessCalendar,
    ) -> Result<Self, ValidationError> {
        if start_date > end_date {
            return Err(ValidationError::InvalidRange {
                start: start_date.to_string(),
                end: end_date.to_string(),
            });
        }
        Ok(Self {
            start_date,
            end_date,
            start: calendar.start_of_day(start_date),
            end: calendar.end_of_day(end_date),
        })
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        self.start_date <= day && day <= self.end_date
    }

    /// Closed sessions whose end falls on a day inside the range.
    pub fn includes(&self, session: &TableSession, calendar: &BusinessCalendar) -> bool {
        session
            .end_time
            .map(|end| self.contains_day(calendar.day_of(end)))
            .unwrap_or(false)
    }

    /// Number of days covered.
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

// =============================================================================
// Resolution
// =============================================================================

impl PeriodSelector {
    /// Resolves this selector to a concrete range relative to `now`.
    ///
    /// ```rust
    /// use chrono::{NaiveDate, TimeZone, Utc};
    /// use tabletime_core::{BusinessCalendar, DateInputs, PeriodSelector};
    ///
    /// // Thursday 2026-03-05
    /// let now = Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap();
    /// let range = PeriodSelector::ThisWeek
    ///     .resolve(&DateInputs::default(), &BusinessCalendar::utc(), now)
    ///     .unwrap();
    /// assert_eq!(range.start_date, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    /// assert_eq!(range.end_date, NaiveDate::from_ymd_opt(2026, 3, 8).unwrap());
    /// ```
    pub fn resolve(
        &self,
        inputs: &DateInputs,
        calendar: &BusinessCalendar,
        now: DateTime<Utc>,
    ) -> Result<ReportRange, ValidationError> {
        let today = calendar.day_of(now);

        let (start, end) = match self {
            PeriodSelector::Today => (today, today),
            PeriodSelector::ThisWeek => {
                let monday =
                    today - Duration::days(today.weekday().num_days_from_monday() as i64);
                (monday, monday + Duration::days(6))
            }
            PeriodSelector::ThisMonth => {
                let first = today - Duration::days(today.day0() as i64);
                let last = first
                    .checked_add_months(Months::new(1))
                    .and_then(|next| next.pred_opt())
                    .ok_or_else(|| ValidationError::InvalidFormat {
                        field: "date".to_string(),
                        reason: "outside the supported calendar".to_string(),
                    })?;
                (first, last)
            }
            PeriodSelector::SpecificDate => {
                let date = inputs
                    .specific_date
                    .ok_or_else(|| ValidationError::required("specificDate"))?;
                (date, date)
            }
            PeriodSelector::DateRange => {
                let start = inputs
                    .start_date
                    .ok_or_else(|| ValidationError::required("startDate"))?;
                let end = inputs
                    .end_date
                    .ok_or_else(|| ValidationError::required("endDate"))?;
                (start, end)
            }
        };

        ReportRange::new(start, end, calendar)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_today_spans_whole_day() {
        let cal = BusinessCalendar::utc();
        let range = PeriodSelector::Today
            .resolve(&DateInputs::default(), &cal, noon(2026, 3, 5))
            .unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).unwrap());
        assert_eq!(
            range.end,
            Utc.with_ymd_and_hms(2026, 3, 5, 23, 59, 59).unwrap() + Duration::milliseconds(999)
        );
        assert_eq!(range.days(), 1);
    }

    #[test]
    fn test_this_week_starts_monday_even_on_sunday() {
        let cal = BusinessCalendar::utc();
        // 2026-03-08 is a Sunday
        let range = PeriodSelector::ThisWeek
            .resolve(&DateInputs::default(), &cal, noon(2026, 3, 8))
            .unwrap();
        assert_eq!(range.start_date, date(2026, 3, 2));
        assert_eq!(range.end_date, date(2026, 3, 8));
    }

    #[test]
    fn test_this_month_handles_february_and_december() {
        let cal = BusinessCalendar::utc();
        let feb = PeriodSelector::ThisMonth
            .resolve(&DateInputs::default(), &cal, noon(2028, 2, 10))
            .unwrap();
        assert_eq!(feb.start_date, date(2028, 2, 1));
        assert_eq!(feb.end_date, date(2028, 2, 29));

        let dec = PeriodSelector::ThisMonth
            .resolve(&DateInputs::default(), &cal, noon(2026, 12, 31))
            .unwrap();
        assert_eq!(dec.end_date, date(2026, 12, 31));
    }

    #[test]
    fn test_missing_inputs_are_validation_errors() {
        let cal = BusinessCalendar::utc();
        let now = noon(2026, 3, 5);

        let err = PeriodSelector::SpecificDate
            .resolve(&DateInputs::default(), &cal, now)
            .unwrap_err();
        assert_eq!(err, ValidationError::required("specificDate"));

        let only_start = DateInputs {
            start_date: Some(date(2026, 3, 1)),
            ..DateInputs::default()
        };
        let err = PeriodSelector::DateRange
            .resolve(&only_start, &cal, now)
            .unwrap_err();
        assert_eq!(err, ValidationError::required("endDate"));
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let cal = BusinessCalendar::utc();
        let err = PeriodSelector::DateRange
            .resolve(
                &DateInputs::range(date(2026, 3, 10), date(2026, 3, 1)),
                &cal,
                noon(2026, 3, 5),
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidRange { .. }));
    }

    #[test]
    fn test_business_offset_moves_day_boundary() {
        // UTC+4: 21:30 UTC on the 5th is 01:30 on the 6th locally.
        let cal = BusinessCalendar::from_offset_minutes(240).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 3, 5, 21, 30, 0).unwrap();
        assert_eq!(cal.day_of(late), date(2026, 3, 6));
        assert_eq!(
            cal.start_of_day(date(2026, 3, 6)),
            Utc.with_ymd_and_hms(2026, 3, 5, 20, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_offset_out_of_range() {
        assert!(BusinessCalendar::from_offset_minutes(19 * 60).is_err());
        assert!(BusinessCalendar::from_offset_minutes(-18 * 60).is_ok());
    }

    #[test]
    fn test_includes_only_closed_sessions_ending_in_range() {
        let cal = BusinessCalendar::utc();
        let range = ReportRange::new(date(2026, 3, 5), date(2026, 3, 5), &cal).unwrap();

        let mut s = TableSession::open(
            "s1",
            "t1",
            "Masa 1",
            Utc.with_ymd_and_hms(2026, 3, 4, 23, 0, 0).unwrap(),
            Money::from_major(10),
        );
        assert!(!range.includes(&s, &cal), "open sessions are never included");

        // Started the day before, ended inside the range: counted by end day.
        s.end_time = Some(Utc.with_ymd_and_hms(2026, 3, 5, 0, 30, 0).unwrap());
        assert!(range.includes(&s, &cal));

        s.end_time = Some(Utc.with_ymd_and_hms(2026, 3, 6, 0, 0, 0).unwrap());
        assert!(!range.includes(&s, &cal));
    }

    #[test]
    fn test_selector_from_str() {
        assert_eq!("today".parse::<PeriodSelector>(), Ok(PeriodSelector::Today));
        assert_eq!("this-week".parse::<PeriodSelector>(), Ok(PeriodSelector::ThisWeek));
        assert_eq!("dateRange".parse::<PeriodSelector>(), Ok(PeriodSelector::DateRange));
        assert!("yesterday".parse::<PeriodSelector>().is_err());
    }
}
