//! Time-range query text

use std::fmt;
use std::str::FromStr;

/// One end of a `TD_TIME_RANGE` predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    /// Unix timestamp in seconds
    Unix(i64),
    /// Unbounded (`NULL`)
    Open,
}

impl FromStr for TimeBound {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("null") {
            return Ok(TimeBound::Open);
        }
        s.parse().map(TimeBound::Unix)
    }
}

impl fmt::Display for TimeBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeBound::Unix(ts) => write!(f, "{}", ts),
            TimeBound::Open => f.write_str("NULL"),
        }
    }
}

/// Builds `SELECT .. FROM .. WHERE TD_TIME_RANGE(time, min, max) [LIMIT n]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBuilder {
    table: String,
    columns: String,
    min: TimeBound,
    max: TimeBound,
    limit: Option<u64>,
}

impl QueryBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".to_string(),
            min: TimeBound::Open,
            max: TimeBound::Open,
            limit: None,
        }
    }

    /// Comma separated column list; single quotes are stripped
    pub fn columns(mut self, columns: &str) -> Self {
        self.columns = columns.replace('\'', "");
        self
    }

    pub fn time_range(mut self, min: TimeBound, max: TimeBound) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn limit(mut self, limit: Option<u64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn build(&self) -> String {
        let mut sql = format!(
            "SELECT {} FROM {} WHERE TD_TIME_RANGE(time, {}, {})",
            self.columns, self.table, self.min, self.max
        );
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        sql
    }
}
