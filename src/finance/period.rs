//! Logical reporting periods resolved to concrete calendar-date ranges.

use serde::Deserialize;
use time::{macros::format_description, Date, Duration, Month};

use crate::error::ApiError;

/// Raw query parameters for `GET /finance/period`. Exactly one of the three
/// modes must be supplied: `{month, year}`, `{week, year}`, or
/// `{startDate, endDate}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodQuery {
    pub year: Option<i32>,
    pub month: Option<u8>,
    pub week: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: Date,
    pub end: Date,
}

impl DateRange {
    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }
}

fn parse_date(raw: &str, field: &str) -> Result<Date, ApiError> {
    let fmt = format_description!("[year]-[month]-[day]");
    Date::parse(raw, &fmt)
        .map_err(|_| ApiError::validation(format!("{field} must be a YYYY-MM-DD date")))
}

impl PeriodQuery {
    /// Resolve the query into a date range, rejecting ambiguous or malformed
    /// combinations.
    pub fn resolve(&self) -> Result<DateRange, ApiError> {
        let custom = self.start_date.is_some() || self.end_date.is_some();
        let modes = [self.month.is_some(), self.week.is_some(), custom];
        match modes.iter().filter(|&&m| m).count() {
            0 => {
                return Err(ApiError::validation(
                    "Provide month/year, week/year, or startDate/endDate",
                ))
            }
            1 => {}
            _ => {
                return Err(ApiError::validation(
                    "month, week and startDate/endDate are mutually exclusive",
                ))
            }
        }

        if let Some(month) = self.month {
            let year = self
                .year
                .ok_or_else(|| ApiError::validation("year is required with month"))?;
            return month_range(year, month);
        }

        if let Some(week) = self.week {
            let year = self
                .year
                .ok_or_else(|| ApiError::validation("year is required with week"))?;
            return week_range(year, week);
        }

        let start = self
            .start_date
            .as_deref()
            .ok_or_else(|| ApiError::validation("startDate is required with endDate"))?;
        let end = self
            .end_date
            .as_deref()
            .ok_or_else(|| ApiError::validation("endDate is required with startDate"))?;
        let range = DateRange {
            start: parse_date(start, "startDate")?,
            end: parse_date(end, "endDate")?,
        };
        if range.start > range.end {
            return Err(ApiError::validation("startDate must not be after endDate"));
        }
        Ok(range)
    }
}

/// First through last calendar day of the month. Month is 1-indexed.
fn month_range(year: i32, month: u8) -> Result<DateRange, ApiError> {
    let month = Month::try_from(month)
        .map_err(|_| ApiError::validation("month must be between 1 and 12"))?;
    let start = Date::from_calendar_date(year, month, 1)
        .map_err(|_| ApiError::validation("invalid year"))?;
    let end = Date::from_calendar_date(year, month, time::util::days_in_year_month(year, month))
        .map_err(|_| ApiError::validation("invalid year"))?;
    Ok(DateRange { start, end })
}

/// Sunday-aligned week. Week 1 starts on the Sunday on or before January 1st;
/// each week spans Sunday through the following Saturday.
fn week_range(year: i32, week: u32) -> Result<DateRange, ApiError> {
    if week == 0 {
        return Err(ApiError::validation("week must be at least 1"));
    }
    let jan1 = Date::from_calendar_date(year, Month::January, 1)
        .map_err(|_| ApiError::validation("invalid year"))?;
    let first_sunday = jan1 - Duration::days(jan1.weekday().number_days_from_sunday() as i64);
    let start = first_sunday + Duration::weeks((week - 1) as i64);
    Ok(DateRange {
        start,
        end: start + Duration::days(6),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;
    use time::Weekday;

    fn month_query(year: i32, month: u8) -> PeriodQuery {
        PeriodQuery {
            year: Some(year),
            month: Some(month),
            ..Default::default()
        }
    }

    #[test]
    fn month_mode_covers_leap_day() {
        let range = month_query(2024, 2).resolve().unwrap();
        assert_eq!(range.start, date!(2024 - 02 - 01));
        assert_eq!(range.end, date!(2024 - 02 - 29));
        assert!(range.contains(date!(2024 - 02 - 29)));
        assert!(!range.contains(date!(2024 - 03 - 01)));
    }

    #[test]
    fn month_mode_non_leap_february() {
        let range = month_query(2023, 2).resolve().unwrap();
        assert_eq!(range.end, date!(2023 - 02 - 28));
    }

    #[test]
    fn week_one_starts_on_sunday_before_jan_first() {
        // 2024-01-01 is a Monday; week 1 reaches back to Sunday 2023-12-31.
        let range = PeriodQuery {
            year: Some(2024),
            week: Some(1),
            ..Default::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(range.start, date!(2023 - 12 - 31));
        assert_eq!(range.start.weekday(), Weekday::Sunday);
        assert_eq!(range.end, date!(2024 - 01 - 06));
        assert_eq!(range.end.weekday(), Weekday::Saturday);
    }

    #[test]
    fn weeks_advance_in_seven_day_steps() {
        let w1 = PeriodQuery {
            year: Some(2024),
            week: Some(1),
            ..Default::default()
        }
        .resolve()
        .unwrap();
        let w3 = PeriodQuery {
            year: Some(2024),
            week: Some(3),
            ..Default::default()
        }
        .resolve()
        .unwrap();
        assert_eq!(w3.start - w1.start, Duration::weeks(2));
    }

    #[test]
    fn custom_range_is_inclusive() {
        let range = PeriodQuery {
            start_date: Some("2024-03-10".into()),
            end_date: Some("2024-03-20".into()),
            ..Default::default()
        }
        .resolve()
        .unwrap();
        assert!(range.contains(date!(2024 - 03 - 10)));
        assert!(range.contains(date!(2024 - 03 - 20)));
        assert!(!range.contains(date!(2024 - 03 - 21)));
    }

    #[test]
    fn missing_mode_is_rejected() {
        let err = PeriodQuery::default().resolve().unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn mixed_modes_are_rejected() {
        let query = PeriodQuery {
            year: Some(2024),
            month: Some(2),
            week: Some(1),
            ..Default::default()
        };
        assert!(matches!(
            query.resolve().unwrap_err(),
            ApiError::Validation(_)
        ));
    }

    #[test]
    fn month_without_year_is_rejected() {
        let query = PeriodQuery {
            month: Some(5),
            ..Default::default()
        };
        assert!(matches!(
            query.resolve().unwrap_err(),
            ApiError::Validation(_)
        ));
    }

    #[test]
    fn month_out_of_range_is_rejected() {
        assert!(month_query(2024, 0).resolve().is_err());
        assert!(month_query(2024, 13).resolve().is_err());
    }

    #[test]
    fn reversed_custom_range_is_rejected() {
        let query = PeriodQuery {
            start_date: Some("2024-03-20".into()),
            end_date: Some("2024-03-10".into()),
            ..Default::default()
        };
        assert!(query.resolve().is_err());
    }

    #[test]
    fn malformed_date_is_rejected() {
        let query = PeriodQuery {
            start_date: Some("03/10/2024".into()),
            end_date: Some("2024-03-20".into()),
            ..Default::default()
        };
        assert!(query.resolve().is_err());
    }
}
