use std::path::PathBuf;
use fnv::FnvHashSet;

pub type Set<T> = FnvHashSet<T>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Which schema rule a record broke.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Violation {
  DuplicateDepot,
  DuplicateId,
  NegativeId,
  NegativeDemand,
  TimeWindowOrder,
  NegativeServiceTime,
  OutOfRange { field: &'static str },
}

impl std::fmt::Display for Violation {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Violation::DuplicateDepot => f.write_str("more than one depot record (id 0)"),
      Violation::DuplicateId => f.write_str("duplicate customer id"),
      Violation::NegativeId => f.write_str("id must be non-negative"),
      Violation::NegativeDemand => f.write_str("demand must be non-negative"),
      Violation::TimeWindowOrder => f.write_str("time window start exceeds end"),
      Violation::NegativeServiceTime => f.write_str("service time must be non-negative"),
      Violation::OutOfRange { field } => write!(f, "{} does not fit its column type", field),
    }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("no archive member matching '{pattern}' found in {archive:?}")]
  NotFound { pattern: String, archive: PathBuf },

  #[error("malformed header: {0}")]
  MalformedHeader(String),

  #[error("malformed row at line {line}: {reason}")]
  MalformedRow { line: usize, reason: String },

  #[error("record {id}: {rule}")]
  SchemaViolation { id: i64, rule: Violation },

  #[error("vehicle capacity must be positive, got {0}")]
  InvalidCapacity(i64),

  #[error("failed to write {path:?}: {reason}")]
  Serialization { path: PathBuf, reason: String },

  #[error("invalid member pattern: {0}")]
  Pattern(#[from] regex::Error),

  #[error("archive error: {0}")]
  Archive(#[from] zip::result::ZipError),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

/// Fieldless discriminant of [`Error`], for tallying batch failures.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ErrorKind {
  NotFound,
  MalformedHeader,
  MalformedRow,
  SchemaViolation,
  InvalidCapacity,
  Serialization,
  Pattern,
  Archive,
  Io,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::NotFound { .. } => ErrorKind::NotFound,
      Error::MalformedHeader(_) => ErrorKind::MalformedHeader,
      Error::MalformedRow { .. } => ErrorKind::MalformedRow,
      Error::SchemaViolation { .. } => ErrorKind::SchemaViolation,
      Error::InvalidCapacity(_) => ErrorKind::InvalidCapacity,
      Error::Serialization { .. } => ErrorKind::Serialization,
      Error::Pattern(_) => ErrorKind::Pattern,
      Error::Archive(_) => ErrorKind::Archive,
      Error::Io(_) => ErrorKind::Io,
    }
  }

  pub(crate) fn serialization(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
    Error::Serialization { path: path.into(), reason: reason.to_string() }
  }
}

pub mod archive;
pub mod config;
pub mod convert;
pub mod dataset;
pub mod output;
pub mod params;
pub mod raw;
pub mod schema;

mod parsers;
pub use parsers::{ParseInstance, HombergerFmt, HombergerText, detect_layout};
pub use raw::homberger::{Homberger, InstanceHeader, Layout, RawRow};

pub use config::ConvertConfig;
pub use convert::{convert, convert_claiming, convert_text, Conversion};
pub use params::InstanceParameters;
pub use schema::{CustomerSet, DepotInfo, DepotSource, NormalizedInstance, PointRecord};
