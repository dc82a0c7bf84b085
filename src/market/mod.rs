//! Market session gate
//!
//! Decides whether a live quote is worth fetching and whether end-of-day
//! prices are due. Weekends are closed; holiday calendars are not modelled.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

/// Regular trading session of one exchange, in its local timezone
#[derive(Debug, Clone, Copy)]
pub struct MarketHours {
    pub tz: Tz,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl Default for MarketHours {
    fn default() -> Self {
        Self::us_equities()
    }
}

impl MarketHours {
    /// NYSE / NASDAQ regular session, 09:30-16:00 America/New_York
    pub fn us_equities() -> Self {
        Self {
            tz: chrono_tz::America::New_York,
            open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or(NaiveTime::MIN),
            close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }

    /// True during the regular session on a weekday
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz);
        if is_weekend(local.weekday()) {
            return false;
        }
        let time = local.time();
        time >= self.open && time < self.close
    }

    /// Calendar date at the exchange
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }

    /// Whether end-of-day prices should be (re)loaded.
    ///
    /// Due when today is a weekday past the close and today's EOD is missing,
    /// or when the prior workday's EOD is missing.
    pub fn eods_needed<F>(&self, now: DateTime<Utc>, have_eod_for: F) -> bool
    where
        F: Fn(NaiveDate) -> bool,
    {
        let local = now.with_timezone(&self.tz);
        let today = local.date_naive();

        if !is_weekend(local.weekday()) && local.time() >= self.close && !have_eod_for(today) {
            return true;
        }

        !have_eod_for(prior_workday(today))
    }
}

/// The closest Mon-Fri date strictly before `date`
pub fn prior_workday(date: NaiveDate) -> NaiveDate {
    let mut day = date.pred_opt().unwrap_or(date);
    while is_weekend(day.weekday()) {
        day = day.pred_opt().unwrap_or(day);
    }
    day
}

/// The closest Mon-Fri date strictly after `date`
pub fn next_workday(date: NaiveDate) -> NaiveDate {
    let mut day = date.succ_opt().unwrap_or(date);
    while is_weekend(day.weekday()) {
        day = day.succ_opt().unwrap_or(day);
    }
    day
}

pub fn is_workday(date: NaiveDate) -> bool {
    !is_weekend(date.weekday())
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}
