//! Result rendering

use std::io::{self, Write};

use job_lifecycle::ResultStream;

/// Printed before the first row
pub const RESULT_HEADER: &str = "SQL result:";

/// Printed after the last row; downstream scrapers look for it
pub const RESULT_TRAILER: &str = "END__";

/// Writes result rows between the header and trailer lines
pub struct ResultSink<W: Write> {
    out: W,
}

impl<W: Write> ResultSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Write every row of `rows`; returns the number of rows written
    pub fn render(&mut self, rows: ResultStream) -> io::Result<usize> {
        writeln!(self.out, "{}", RESULT_HEADER)?;

        let mut count = 0;
        for row in rows {
            writeln!(self.out, "{}", row)?;
            count += 1;
        }

        writeln!(self.out, "{}", RESULT_TRAILER)?;
        self.out.flush()?;
        Ok(count)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use job_lifecycle::ResultFormat;

    #[test]
    fn test_rows_are_bracketed() {
        let mut sink = ResultSink::new(Vec::new());
        let rows = ResultStream::new(ResultFormat::Tabular, "a\t1\nb\t2\n".to_string());

        assert_eq!(sink.render(rows).unwrap(), 2);
        let printed = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(printed, "SQL result:\na\t1\nb\t2\nEND__\n");
    }

    #[test]
    fn test_empty_result_still_has_trailer() {
        let mut sink = ResultSink::new(Vec::new());
        let rows = ResultStream::new(ResultFormat::Csv, String::new());

        assert_eq!(sink.render(rows).unwrap(), 0);
        assert_eq!(String::from_utf8(sink.into_inner()).unwrap(), "SQL result:\nEND__\n");
    }
}
