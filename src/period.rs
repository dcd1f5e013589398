use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

/// A half-open weekly reward window `[Monday 00:00 UTC, next Monday 00:00 UTC)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RewardPeriod {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl RewardPeriod {
    /// The weekly window containing `instant`.
    pub fn containing(instant: DateTime<Utc>) -> RewardPeriod {
        let date = instant.date_naive();
        let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
        let from = DateTime::from_naive_utc_and_offset(monday.and_time(NaiveTime::MIN), Utc);
        RewardPeriod {
            from,
            to: from + Duration::weeks(1),
        }
    }

    /// The window containing `now`.
    pub fn current(now: DateTime<Utc>) -> RewardPeriod {
        RewardPeriod::containing(now)
    }

    /// `limit` consecutive windows starting `offset` weeks before the window
    /// containing `now`, most recent first. Each window is derived by
    /// subtracting whole weeks from the current bounds so that the 7-day
    /// alignment is exact regardless of the calendar date.
    pub fn previous_periods(now: DateTime<Utc>, offset: u32, limit: u32) -> Vec<RewardPeriod> {
        let current = RewardPeriod::containing(now);
        (0..limit)
            .map(|i| {
                let weeks = Duration::weeks(i64::from(offset + i));
                RewardPeriod {
                    from: current.from - weeks,
                    to: current.to - weeks,
                }
            })
            .collect()
    }

    pub fn previous(&self) -> RewardPeriod {
        RewardPeriod {
            from: self.from - Duration::weeks(1),
            to: self.to - Duration::weeks(1),
        }
    }

    /// Mid-week marker, used to look a period up from any instant inside it.
    pub fn median(&self) -> DateTime<Utc> {
        self.from + Duration::days(3)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.from && instant < self.to
    }
}
