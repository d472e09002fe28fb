//! Command line arguments

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use job_lifecycle::{Engine, Query, ResultFormat};

use crate::error::ArgumentError;
use crate::logging::LogFormat;
use crate::query::{QueryBuilder, TimeBound};

pub const ABOUT: &str = "Issue a query on Treasure Data against a database and table to retrieve \
                         the values of a specified set of columns in a specified date/time range.";

/// Time-range query runner
#[derive(Parser, Debug)]
#[command(name = "td-query", version)]
#[command(about = ABOUT)]
#[command(override_usage = "td-query <DATABASE> <TABLE> [OPTIONS]")]
pub struct Cli {
    /// Database to query
    pub database: Option<String>,

    /// Table to query
    pub table: Option<String>,

    /// Output format: 'tabular' or 'csv'
    #[arg(short, long, default_value = "tabular")]
    pub format: ResultFormat,

    /// Comma separated list of columns (e.g. 'column1,column2'); all columns if omitted
    #[arg(short, long, default_value = "*")]
    pub column: String,

    /// Maximum number of records to return; all records if omitted
    #[arg(short, long)]
    pub limit: Option<String>,

    /// Minimum timestamp, as a unix timestamp or NULL
    #[arg(short = 'm', long = "min", value_name = "MIN_TIME")]
    pub min: Option<String>,

    /// Maximum timestamp, as a unix timestamp or NULL
    #[arg(short = 'M', long = "MAX", value_name = "MAX_TIME")]
    pub max: Option<String>,

    /// Query engine: 'presto' or 'hive'
    #[arg(short, long, default_value = "presto")]
    pub engine: Engine,

    /// Give up (and kill the job) after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<String>,

    /// Account profile to read instead of ~/.td/td.conf
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log output format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// A validated command line
#[derive(Debug, Clone)]
pub struct Invocation {
    pub query: Query,
    pub format: ResultFormat,
    pub timeout: Option<Duration>,
    pub config: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Cli {
    /// Parse and validate `args` (including the program name)
    pub fn parse_invocation<I, T>(args: I) -> Result<Invocation, ArgumentError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(args)?.into_invocation()
    }

    pub fn into_invocation(self) -> Result<Invocation, ArgumentError> {
        let (database, table) = match (self.database, self.table) {
            (Some(database), Some(table)) => (database, table),
            _ => return Err(ArgumentError::MissingPositional),
        };

        let min: TimeBound = parse_number("min", self.min.as_deref())?
            .ok_or(ArgumentError::MissingOption { option: "min" })?;
        let max: TimeBound = parse_number("MAX", self.max.as_deref())?
            .ok_or(ArgumentError::MissingOption { option: "MAX" })?;
        let limit: Option<u64> = parse_number("limit", self.limit.as_deref())?;

        let timeout = match parse_number::<u64>("timeout", self.timeout.as_deref())? {
            Some(0) => {
                return Err(ArgumentError::InvalidNumber {
                    option: "timeout",
                    value: "0".to_string(),
                })
            }
            secs => secs.map(Duration::from_secs),
        };

        let text = QueryBuilder::new(table)
            .columns(&self.column)
            .time_range(min, max)
            .limit(limit)
            .build();

        Ok(Invocation {
            query: Query::new(database, text, self.engine),
            format: self.format,
            timeout,
            config: self.config,
            log_format: self.log_format,
        })
    }

    /// Help text printed after argument errors
    pub fn usage() -> String {
        Self::command().render_help().to_string()
    }
}

fn parse_number<T: FromStr>(
    option: &'static str,
    value: Option<&str>,
) -> Result<Option<T>, ArgumentError> {
    value
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ArgumentError::InvalidNumber { option, value: raw.to_string() })
        })
        .transpose()
}
