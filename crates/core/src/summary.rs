//! Period summaries and the calendar rules that decide when they are due.
//!
//! Summaries form a cascade: daily → weekly → monthly → quarterly →
//! semi-annual → annual. Each tier keeps exactly one current
//! [`PeriodSummary`]; a [`RunMarker`] records the day it was last produced.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// One level of the summary cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Tier {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
}

impl Tier {
    /// All tiers, lowest first. Cascades run in this order.
    pub const ALL: [Tier; 6] = [
        Tier::Daily,
        Tier::Weekly,
        Tier::Monthly,
        Tier::Quarterly,
        Tier::SemiAnnual,
        Tier::Annual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Daily => "daily",
            Tier::Weekly => "weekly",
            Tier::Monthly => "monthly",
            Tier::Quarterly => "quarterly",
            Tier::SemiAnnual => "semiAnnual",
            Tier::Annual => "annual",
        }
    }

    /// How many trailing days of records this tier summarizes.
    pub fn window_days(&self) -> u32 {
        match self {
            Tier::Daily => 1,
            Tier::Weekly => 7,
            Tier::Monthly => 30,
            Tier::Quarterly => 90,
            Tier::SemiAnnual => 180,
            Tier::Annual => 365,
        }
    }

    /// The tier this one rolls up from.
    pub fn lower(&self) -> Option<Tier> {
        match self {
            Tier::Daily => None,
            Tier::Weekly => Some(Tier::Daily),
            Tier::Monthly => Some(Tier::Weekly),
            Tier::Quarterly => Some(Tier::Monthly),
            Tier::SemiAnnual => Some(Tier::Quarterly),
            Tier::Annual => Some(Tier::SemiAnnual),
        }
    }

    /// The most recent trigger day on or before `today`.
    ///
    /// Months are matched zero-based: quarterly fires on the 1st of
    /// January, April, July and October (`month0 % 3 == 0`), semi-annual on
    /// the 1st of January and July (`month0 % 6 == 0`).
    pub fn anchor(&self, today: NaiveDate, week_start: Weekday) -> NaiveDate {
        match self {
            Tier::Daily => today,
            Tier::Weekly => {
                let back = (7 + today.weekday().num_days_from_monday()
                    - week_start.num_days_from_monday())
                    % 7;
                today
                    .checked_sub_days(Days::new(u64::from(back)))
                    .unwrap_or(today)
            }
            Tier::Monthly => first_of_month(today, today.month0()),
            Tier::Quarterly => first_of_month(today, today.month0() - today.month0() % 3),
            Tier::SemiAnnual => first_of_month(today, today.month0() - today.month0() % 6),
            Tier::Annual => first_of_month(today, 0),
        }
    }
}

fn first_of_month(today: NaiveDate, month0: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(today.year(), month0 + 1, 1).unwrap_or(today)
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "daily" => Ok(Tier::Daily),
            "weekly" => Ok(Tier::Weekly),
            "monthly" => Ok(Tier::Monthly),
            "quarterly" => Ok(Tier::Quarterly),
            "semiannual" => Ok(Tier::SemiAnnual),
            "annual" | "yearly" => Ok(Tier::Annual),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}

/// Calendar rules for the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeSchedule {
    /// The weekday the weekly tier fires on.
    pub week_start: Weekday,

    /// Whether a missed trigger day still makes the tier due later in the
    /// same period. Off by default: a tier is only due on its trigger day.
    pub catch_up_missed: bool,
}

impl Default for CascadeSchedule {
    fn default() -> Self {
        Self {
            week_start: Weekday::Mon,
            catch_up_missed: false,
        }
    }
}

impl CascadeSchedule {
    /// Whether `tier` should be regenerated on `today`, given when it last ran.
    pub fn is_due(&self, tier: Tier, today: NaiveDate, last_run: Option<NaiveDate>) -> bool {
        let anchor = tier.anchor(today, self.week_start);
        if !self.catch_up_missed && today != anchor {
            return false;
        }
        match last_run {
            None => true,
            Some(last) => last < anchor,
        }
    }
}

/// The current summary for one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub tier: Tier,
    pub content: String,
    pub generated_at: DateTime<Utc>,
}

/// The day a tier was last regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMarker {
    pub tier: Tier,
    pub last_run_date: NaiveDate,
}
