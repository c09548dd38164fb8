use std::ops::RangeInclusive;

use chrono::{Datelike as _, NaiveDate};
use kitchen::week::week_start_for;

use crate::http_server::ServerError;

pub(crate) mod auth;
pub(crate) mod calendar;
pub(crate) mod household;
pub(crate) mod meta;
pub(crate) mod pantry;
pub(crate) mod plans;
pub(crate) mod recipes;
pub(crate) mod scans;
pub(crate) mod settings;
pub(crate) mod shopping;
pub(crate) mod sync;
pub(crate) mod templates;

/// Years a week may fall in. Week and calendar math stays far from chrono's limits.
const PLANNABLE_YEARS: RangeInclusive<i32> = 1900..=9999;

/// Any ISO date names the week it falls in.
pub(crate) fn parse_week(raw: &str) -> Result<NaiveDate, ServerError> {
    let date: NaiveDate = raw
        .parse()
        .map_err(|_| ServerError::bad_request(format!("Invalid week {raw}, expected YYYY-MM-DD")))?;

    if !PLANNABLE_YEARS.contains(&date.year()) {
        return Err(ServerError::bad_request(format!(
            "Week {raw} is out of range, years must be between {} and {}",
            PLANNABLE_YEARS.start(),
            PLANNABLE_YEARS.end()
        )));
    }

    Ok(week_start_for(date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weeks_snap_to_monday() {
        assert_eq!(
            parse_week("2025-12-11").unwrap(),
            "2025-12-08".parse::<NaiveDate>().unwrap()
        );
        assert!(parse_week("next-week").is_err());
    }

    #[test]
    fn far_off_years_are_rejected() {
        for raw in ["+262142-12-31", "-0001-01-01", "1899-12-31", "+10000-01-03"] {
            let err = parse_week(raw).unwrap_err();
            assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST, "{raw}");
        }

        assert_eq!(
            parse_week("9999-12-31").unwrap(),
            "9999-12-27".parse::<NaiveDate>().unwrap()
        );
        assert!(parse_week("1900-01-01").is_ok());
    }
}
