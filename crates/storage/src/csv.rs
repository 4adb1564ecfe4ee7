//! CSV telemetry logger

use crate::StorageError;
use chrono::{DateTime, TimeZone};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Comma-joined row writer that drops a row identical to the one before it.
///
/// Every written line is flushed immediately, so a log cut short by a crash
/// or power loss keeps all rows up to that point.
pub struct CsvLogger<W: Write> {
    writer: W,
    /// Last line written, header included
    last_line: Option<String>,
    rows_written: usize,
}

impl CsvLogger<File> {
    /// Create (or truncate) a log file at `path`
    pub fn create(path: &Path) -> Result<Self, StorageError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = File::create(path)?;
        info!("Logging telemetry to {}", path.display());
        Ok(Self::new(file))
    }
}

impl<W: Write> CsvLogger<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            last_line: None,
            rows_written: 0,
        }
    }

    /// Write the column header
    pub fn write_header<I, S>(&mut self, columns: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let line = join(columns);
        self.write_line(&line)?;
        self.last_line = Some(line);
        Ok(())
    }

    /// Write a row unless it repeats the previous line.
    /// Returns whether the row was written.
    pub fn write_row<I, S>(&mut self, cells: I) -> Result<bool, StorageError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let line = join(cells);
        if self.last_line.as_deref() == Some(line.as_str()) {
            debug!("Skipping duplicate row");
            return Ok(false);
        }
        self.write_line(&line)?;
        self.last_line = Some(line);
        self.rows_written += 1;
        Ok(true)
    }

    /// Data rows written so far (header excluded)
    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    /// Flush and hand back the underlying writer
    pub fn close(mut self) -> Result<W, StorageError> {
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write_line(&mut self, line: &str) -> Result<(), StorageError> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

fn join<I, S>(cells: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    cells
        .into_iter()
        .map(|c| c.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// File name for a session log started at `start`, e.g. `obd_16-10-2026_08-30-00.csv`
pub fn log_file_name<Tz: TimeZone>(start: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("obd_{}.csv", start.format("%d-%m-%Y_%H-%M-%S"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn contents(logger: CsvLogger<Vec<u8>>) -> String {
        String::from_utf8(logger.close().unwrap()).unwrap()
    }

    #[test]
    fn test_identical_rows_collapse() {
        let mut logger = CsvLogger::new(Vec::new());
        logger.write_header(["time_s", "rpm"]).unwrap();
        assert!(logger.write_row(["0", "800"]).unwrap());
        assert!(!logger.write_row(["0", "800"]).unwrap());

        assert_eq!(logger.rows_written(), 1);
        assert_eq!(contents(logger), "time_s,rpm\n0,800\n");
    }

    #[test]
    fn test_differing_rows_kept_in_order() {
        let mut logger = CsvLogger::new(Vec::new());
        logger.write_header(["time_s", "rpm"]).unwrap();
        logger.write_row(["0", "800"]).unwrap();
        logger.write_row(["1", "800"]).unwrap();
        logger.write_row(["0", "800"]).unwrap();

        assert_eq!(contents(logger), "time_s,rpm\n0,800\n1,800\n0,800\n");
    }

    #[test]
    fn test_empty_cells() {
        let mut logger = CsvLogger::new(Vec::new());
        logger.write_row(vec!["3".to_string(), String::new(), "90".to_string()]).unwrap();
        assert_eq!(contents(logger), "3,,90\n");
    }

    #[test]
    fn test_create_writes_file() {
        let dir = std::env::temp_dir().join(format!("csv-{}", uuid::Uuid::new_v4()));
        let path = dir.join("logs").join("session.csv");
        let mut logger = CsvLogger::create(&path).unwrap();
        logger.write_header(["time_s"]).unwrap();
        logger.write_row(["0"]).unwrap();
        logger.close().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "time_s\n0\n");
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_log_file_name() {
        let start = Utc.with_ymd_and_hms(2026, 10, 16, 8, 30, 5).unwrap();
        assert_eq!(log_file_name(&start), "obd_16-10-2026_08-30-05.csv");
    }
}
