use std::{collections::BTreeMap, ops::Add};

use chrono::{DateTime, DurationRound, FixedOffset, TimeDelta};

/// Hour-aligned time series.
///
/// Built by bucketing irregular source points onto hour boundaries in the
/// canonical offset. Missing hours are simply absent: the caller decides
/// whether absence means zero energy or an unknown price. Values are never
/// interpolated.
pub struct HourlySeries<V>(BTreeMap<DateTime<FixedOffset>, V>);

impl<V> Default for HourlySeries<V> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<V> HourlySeries<V> {
    /// Bucket the points by hour, summing points that share an hour.
    pub fn from_summed_points(
        points: impl IntoIterator<Item = (DateTime<FixedOffset>, V)>,
    ) -> Self
    where
        V: Copy + Add<Output = V>,
    {
        let mut buckets = BTreeMap::new();
        for (time, value) in points {
            buckets
                .entry(truncated_to_hour(time))
                .and_modify(|total: &mut V| *total = *total + value)
                .or_insert(value);
        }
        Self(buckets)
    }

    /// Bucket the points by hour, letting the latest point in an hour win.
    pub fn from_latest_points(
        points: impl IntoIterator<Item = (DateTime<FixedOffset>, V)>,
    ) -> Self {
        let mut buckets: BTreeMap<DateTime<FixedOffset>, (DateTime<FixedOffset>, V)> =
            BTreeMap::new();
        for (time, value) in points {
            let hour = truncated_to_hour(time);
            if buckets.get(&hour).is_none_or(|(seen_at, _)| *seen_at <= time) {
                buckets.insert(hour, (time, value));
            }
        }
        Self(buckets.into_iter().map(|(hour, (_, value))| (hour, value)).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V: Copy> HourlySeries<V> {
    /// Value for the hour containing the given instant.
    pub fn get(&self, time: DateTime<FixedOffset>) -> Option<V> {
        self.0.get(&truncated_to_hour(time)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DateTime<FixedOffset>, V)> + '_ {
        self.0.iter().map(|(time, value)| (*time, *value))
    }
}

fn truncated_to_hour(time: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    time.duration_trunc(TimeDelta::hours(1)).unwrap_or(time)
}
