use crate::models::attendance::AttendanceRecord;
use crate::stores::ledger::AttendanceLedger;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use tracing::debug;

/// Parsed report filter. Each part is optional and ignored when absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFilter {
    pub subject: Option<String>,
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound: start of the day after `to_date`
    pub until: Option<DateTime<Utc>>,
}

impl ReportFilter {
    /// Build a filter from raw request strings.
    ///
    /// Blank values mean "no filter". Dates that fail to parse as `YYYY-MM-DD`
    /// are dropped on their own without affecting the other bound.
    pub fn parse(subject: Option<&str>, from_date: Option<&str>, to_date: Option<&str>) -> Self {
        let subject = subject
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let from = parse_day("from_date", from_date).map(start_of_day);
        let until = parse_day("to_date", to_date)
            .and_then(|day| day.checked_add_days(Days::new(1)))
            .map(start_of_day);

        Self {
            subject,
            from,
            until,
        }
    }

    pub fn matches(&self, record: &AttendanceRecord) -> bool {
        if let Some(subject) = &self.subject {
            if &record.subject != subject {
                return false;
            }
        }
        if let Some(from) = self.from {
            if record.timestamp < from {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.timestamp >= until {
                return false;
            }
        }
        true
    }
}

fn parse_day(field: &str, raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(day) => Some(day),
        Err(e) => {
            debug!(field = field, value = raw, error = %e, "Ignoring unparsable report date");
            None
        }
    }
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

pub fn filtered_report(ledger: &AttendanceLedger, filter: &ReportFilter) -> Vec<AttendanceRecord> {
    ledger.query(|r| filter.matches(r))
}
