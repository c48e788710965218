//! Popularity counters shared by owners and their detail rows.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Normalize an owner or item name for keyed lookups.
///
/// Upstream names are case-insensitive, so `TanStack` and `tanstack` must
/// land on the same row.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Average downloads per weekday, Sunday first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayOfWeekAverages(pub [u64; 7]);

impl DayOfWeekAverages {
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0)
    }

    /// Average for a weekday index (0 = Sunday). Indexes wrap modulo 7.
    #[must_use]
    pub fn for_weekday(&self, index: usize) -> u64 {
        self.0[index % 7]
    }

    /// Encode as the JSON array stored in the database.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.0.iter().map(|v| (*v).into()).collect())
    }

    /// Decode from the stored JSON array.
    ///
    /// Anything that isn't an array of seven non-negative integers decodes to
    /// all zeros.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

impl Add for DayOfWeekAverages {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        for (lhs, rhs) in self.0.iter_mut().zip(rhs.0) {
            *lhs = lhs.saturating_add(rhs);
        }
        self
    }
}

/// The tracked counters of an owner or a single repository/package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub star_count: u64,
    pub contributor_count: u64,
    pub dependent_count: u64,
    pub download_count: u64,
    pub day_of_week_averages: DayOfWeekAverages,
}

impl Metrics {
    /// Metrics for a listed repository.
    #[must_use]
    pub fn repository(star_count: u64, contributor_count: u64, dependent_count: u64) -> Self {
        Self {
            star_count,
            contributor_count,
            dependent_count,
            ..Self::default()
        }
    }

    /// Metrics for a registry package.
    #[must_use]
    pub fn package(download_count: u64, day_of_week_averages: DayOfWeekAverages) -> Self {
        Self {
            download_count,
            day_of_week_averages,
            ..Self::default()
        }
    }

    /// Merge freshly fetched values over stored ones.
    ///
    /// `star_count` comes straight from a structured API field and is taken
    /// as-is. The scraped and derived counters treat zero as "not resolved"
    /// and keep the stored value instead.
    #[must_use]
    pub fn merge_fresh(&self, fresh: &Metrics) -> Metrics {
        Metrics {
            star_count: fresh.star_count,
            contributor_count: nonzero_or(fresh.contributor_count, self.contributor_count),
            dependent_count: nonzero_or(fresh.dependent_count, self.dependent_count),
            download_count: nonzero_or(fresh.download_count, self.download_count),
            day_of_week_averages: if fresh.day_of_week_averages.is_zero() {
                self.day_of_week_averages
            } else {
                fresh.day_of_week_averages
            },
        }
    }
}

fn nonzero_or(fresh: u64, stored: u64) -> u64 {
    if fresh == 0 { stored } else { fresh }
}

impl Add for Metrics {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            star_count: self.star_count.saturating_add(rhs.star_count),
            contributor_count: self.contributor_count.saturating_add(rhs.contributor_count),
            dependent_count: self.dependent_count.saturating_add(rhs.dependent_count),
            download_count: self.download_count.saturating_add(rhs.download_count),
            day_of_week_averages: self.day_of_week_averages + rhs.day_of_week_averages,
        }
    }
}

impl AddAssign for Metrics {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for Metrics {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Metrics::default(), Add::add)
    }
}

/// Convert a counter to the signed column type.
#[must_use]
pub(crate) fn to_db_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Convert a stored column back to a counter. Negative values read as zero.
#[must_use]
pub(crate) fn from_db_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_name_trims_and_lowercases() {
        assert_eq!(normalize_name("  TanStack "), "tanstack");
        assert_eq!(normalize_name("@TanStack/Query"), "@tanstack/query");
    }

    #[test]
    fn merge_keeps_stored_contributors_when_fresh_value_is_zero() {
        let stored = Metrics::repository(10, 5, 3);
        let fresh = Metrics::repository(10, 0, 0);

        let merged = stored.merge_fresh(&fresh);
        assert_eq!(merged.contributor_count, 5);
        assert_eq!(merged.dependent_count, 3);
        assert_eq!(merged, stored);
    }

    #[test]
    fn merge_takes_star_count_even_when_it_drops_to_zero() {
        let stored = Metrics::repository(10, 5, 3);
        let fresh = Metrics::repository(0, 7, 0);

        let merged = stored.merge_fresh(&fresh);
        assert_eq!(merged.star_count, 0);
        assert_eq!(merged.contributor_count, 7);
        assert_eq!(merged.dependent_count, 3);
    }

    #[test]
    fn merge_keeps_stored_weekday_averages_when_fresh_ones_are_empty() {
        let averages = DayOfWeekAverages([1, 2, 3, 4, 5, 6, 7]);
        let stored = Metrics::package(100, averages);

        let merged = stored.merge_fresh(&Metrics::package(0, DayOfWeekAverages::default()));
        assert_eq!(merged.download_count, 100);
        assert_eq!(merged.day_of_week_averages, averages);

        let fresh = DayOfWeekAverages([7, 6, 5, 4, 3, 2, 1]);
        let merged = stored.merge_fresh(&Metrics::package(120, fresh));
        assert_eq!(merged.download_count, 120);
        assert_eq!(merged.day_of_week_averages, fresh);
    }

    #[test]
    fn sum_adds_every_counter_and_weekday() {
        let total: Metrics = vec![
            Metrics::repository(1, 2, 3),
            Metrics::repository(10, 20, 30),
            Metrics::package(5, DayOfWeekAverages([1, 1, 1, 1, 1, 1, 1])),
            Metrics::package(6, DayOfWeekAverages([0, 1, 2, 3, 4, 5, 6])),
        ]
        .into_iter()
        .sum();

        assert_eq!(total.star_count, 11);
        assert_eq!(total.contributor_count, 22);
        assert_eq!(total.dependent_count, 33);
        assert_eq!(total.download_count, 11);
        assert_eq!(total.day_of_week_averages, DayOfWeekAverages([1, 2, 3, 4, 5, 6, 7]));
    }

    #[test]
    fn empty_sum_is_all_zero() {
        let total: Metrics = std::iter::empty().sum();
        assert_eq!(total, Metrics::default());
    }

    #[test]
    fn weekday_averages_round_trip_through_json_and_tolerate_garbage() {
        let averages = DayOfWeekAverages([3, 0, 9, 1, 1, 2, 8]);
        assert_eq!(DayOfWeekAverages::from_json(&averages.to_json()), averages);
        assert_eq!(
            DayOfWeekAverages::from_json(&serde_json::json!([1, 2])),
            DayOfWeekAverages::default()
        );
        assert_eq!(
            DayOfWeekAverages::from_json(&serde_json::json!({"sunday": 1})),
            DayOfWeekAverages::default()
        );
        assert_eq!(averages.for_weekday(9), 9);
    }

    #[test]
    fn db_count_conversions_clamp() {
        assert_eq!(to_db_count(u64::MAX), i64::MAX);
        assert_eq!(from_db_count(-4), 0);
        assert_eq!(from_db_count(42), 42);
    }
}
