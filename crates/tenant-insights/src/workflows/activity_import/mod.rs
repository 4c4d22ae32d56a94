//! Loads tenant activity from CSV exports into an [`InMemoryActivitySource`].

mod parser;

use std::fmt;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::workflows::insights::InMemoryActivitySource;
use parser::{ActivityRow, AppointmentRow, InvoiceRow, JobRow, NpsRow, QuoteRow};

/// One export file per record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityFile {
    Invoices,
    Appointments,
    Quotes,
    Jobs,
    Nps,
}

impl ActivityFile {
    pub const ALL: [ActivityFile; 5] = [
        ActivityFile::Invoices,
        ActivityFile::Appointments,
        ActivityFile::Quotes,
        ActivityFile::Jobs,
        ActivityFile::Nps,
    ];

    pub const fn file_name(self) -> &'static str {
        match self {
            ActivityFile::Invoices => "invoices.csv",
            ActivityFile::Appointments => "appointments.csv",
            ActivityFile::Quotes => "quotes.csv",
            ActivityFile::Jobs => "jobs.csv",
            ActivityFile::Nps => "nps.csv",
        }
    }
}

impl fmt::Display for ActivityFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv {
        file: ActivityFile,
        source: csv::Error,
    },
    InvalidRow {
        file: ActivityFile,
        line: u64,
        message: String,
    },
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read activity export: {}", err),
            ImportError::Csv { file, source } => write!(f, "invalid CSV data in {file}: {source}"),
            ImportError::InvalidRow {
                file,
                line,
                message,
            } => write!(f, "{file} line {line}: {message}"),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv { source, .. } => Some(source),
            ImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

pub struct CsvActivityImporter;

impl CsvActivityImporter {
    /// Reads every export present in `dir`. Missing files count as empty record sets.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<InMemoryActivitySource, ImportError> {
        let dir = dir.as_ref();
        let mut source = InMemoryActivitySource::new();

        for file in ActivityFile::ALL {
            let path = dir.join(file.file_name());
            let handle = match std::fs::File::open(&path) {
                Ok(handle) => handle,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "activity export missing; treating as empty");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let rows = Self::from_reader(file, handle, &mut source)?;
            debug!(path = %path.display(), rows, "imported activity export");
        }

        Ok(source)
    }

    /// Appends the rows of one export to `source`, returning how many were read.
    pub fn from_reader<R: Read>(
        file: ActivityFile,
        reader: R,
        source: &mut InMemoryActivitySource,
    ) -> Result<usize, ImportError> {
        match file {
            ActivityFile::Invoices => import_rows::<R, InvoiceRow>(file, reader, source),
            ActivityFile::Appointments => import_rows::<R, AppointmentRow>(file, reader, source),
            ActivityFile::Quotes => import_rows::<R, QuoteRow>(file, reader, source),
            ActivityFile::Jobs => import_rows::<R, JobRow>(file, reader, source),
            ActivityFile::Nps => import_rows::<R, NpsRow>(file, reader, source),
        }
    }
}

fn import_rows<R, T>(
    file: ActivityFile,
    reader: R,
    source: &mut InMemoryActivitySource,
) -> Result<usize, ImportError>
where
    R: Read,
    T: ActivityRow,
{
    let csv_error = |source| ImportError::Csv { file, source };
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers().map_err(csv_error)?.clone();
    let mut raw = csv::StringRecord::new();
    let mut count = 0;

    while csv_reader.read_record(&mut raw).map_err(csv_error)? {
        let line = raw.position().map(|position| position.line()).unwrap_or_default();
        let row: T = raw.deserialize(Some(&headers)).map_err(csv_error)?;
        row.apply(source).map_err(|message| ImportError::InvalidRow {
            file,
            line,
            message,
        })?;
        count += 1;
    }

    Ok(count)
}
