//! Lifetime and day-of-week download statistics.

use chrono::{Datelike, Days, NaiveDate};

use super::client::NpmClient;
use super::error::NpmError;
use super::types::{DownloadRange, parse_day};
use crate::metrics::DayOfWeekAverages;
use crate::sync::{DAY_OF_WEEK_WINDOW_DAYS, DOWNLOAD_WINDOW_DAYS};

/// First day the downloads API has data for.
pub fn downloads_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 10).unwrap_or(NaiveDate::MIN)
}

/// Sum a package's downloads from `created` through `today`.
///
/// The range API caps a request at roughly eighteen months, so the span is
/// walked in [`DOWNLOAD_WINDOW_DAYS`] windows, each starting the day after
/// the previous request's last day. A response that ends early does not pull
/// the next window back.
pub async fn lifetime_downloads(
    client: &NpmClient,
    package: &str,
    created: NaiveDate,
    today: NaiveDate,
) -> Result<u64, NpmError> {
    let window = Days::new(DOWNLOAD_WINDOW_DAYS.unsigned_abs());
    let mut from = created.max(downloads_epoch()).min(today);
    let mut total = 0u64;

    loop {
        let to = from.checked_add_days(window).unwrap_or(today).min(today);
        let range = client.download_range(package, from, to).await?;
        total = total.saturating_add(range.total());

        let end = range.end_date().unwrap_or(to);
        if end >= today || to >= today {
            break;
        }
        match to.succ_opt() {
            Some(next) => from = next,
            None => break,
        }
    }

    Ok(total)
}

/// Average downloads per weekday over the last thirty days.
pub async fn day_of_week_averages(
    client: &NpmClient,
    package: &str,
    today: NaiveDate,
) -> Result<DayOfWeekAverages, NpmError> {
    let from = today
        .checked_sub_days(Days::new(DAY_OF_WEEK_WINDOW_DAYS.unsigned_abs()))
        .unwrap_or(today);
    let range = client.download_range(package, from, today).await?;
    Ok(weekday_averages(&range))
}

/// Bucket daily downloads by weekday (Sunday first) and divide by four weeks.
///
/// Days that fail to parse are skipped. Halves round up.
pub fn weekday_averages(range: &DownloadRange) -> DayOfWeekAverages {
    let mut totals = [0u64; 7];
    for day in &range.downloads {
        if let Some(date) = parse_day(&day.day) {
            let slot = date.weekday().num_days_from_sunday() as usize;
            totals[slot] = totals[slot].saturating_add(day.downloads);
        }
    }
    DayOfWeekAverages(totals.map(|total| total.saturating_add(2) / 4))
}
