//! Writing a converted instance as `<base>_customers.parquet` + `<base>_params.json`.
//!
//! Customers are always written before params, and a params file only exists next to a
//! complete customers file: each artifact goes to a temporary file in the destination
//! directory and is renamed into place, and a failed params write removes the customers
//! file it would have been paired with.
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use parquet::column::writer::ColumnWriter;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::SerializedFileWriter;
use parquet::record::{Field, Row};
use parquet::schema::parser::parse_message_type;
use tempfile::NamedTempFile;
use tracing::*;
use crate::{Error, Result, Set};
use crate::config::OutputConfig;
use crate::params::InstanceParameters;
use crate::schema::{CustomerSet, PointRecord};

const CUSTOMER_SCHEMA: &str = "
  message customers {
    REQUIRED INT32 customer_id;
    REQUIRED FLOAT x;
    REQUIRED FLOAT y;
    REQUIRED INT32 demand (INT_16);
    REQUIRED INT32 tw_start;
    REQUIRED INT32 tw_end;
    REQUIRED INT32 service_time (INT_16);
  }
";

/// Filesystem-safe stem for an instance identifier: `.` and ` ` become `_`.
///
/// Identifiers differing only in those characters collide.
pub fn base_name(identifier: &str) -> String {
  identifier.replace(|c: char| c == '.' || c == ' ', "_")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
  pub customers: PathBuf,
  pub params: PathBuf,
}

impl ArtifactPaths {
  pub fn new(out_dir: &Path, identifier: &str, cfg: &OutputConfig) -> Self {
    let base = base_name(identifier);
    ArtifactPaths {
      customers: out_dir.join(format!("{}_customers.{}", base, cfg.customers_ext)),
      params: out_dir.join(format!("{}_params.{}", base, cfg.params_ext)),
    }
  }
}

/// Artifact paths taken by the conversions of one batch. Two conversions sharing an
/// output directory must not write the same pair.
#[derive(Debug, Default)]
pub struct OutputClaims {
  claimed: Mutex<Set<PathBuf>>,
}

impl OutputClaims {
  /// Reserves both paths, or fails if another conversion already holds either.
  pub fn claim(&self, paths: &ArtifactPaths) -> Result<()> {
    let mut claimed = self.claimed.lock()
      .map_err(|_| Error::serialization(&paths.customers, "output claims are poisoned"))?;
    for p in [&paths.customers, &paths.params].iter() {
      if claimed.contains(*p) {
        return Err(Error::serialization(*p, "already written by another conversion in this batch"));
      }
    }
    claimed.insert(paths.customers.clone());
    claimed.insert(paths.params.clone());
    Ok(())
  }
}

enum Column {
  Int(Vec<i32>),
  Float(Vec<f32>),
}

fn customer_columns(customers: &CustomerSet) -> Vec<Column> {
  let ints = |f: fn(&PointRecord) -> i32| Column::Int(customers.iter().map(f).collect());
  let floats = |f: fn(&PointRecord) -> f32| Column::Float(customers.iter().map(f).collect());
  vec![
    ints(|c| c.id),
    floats(|c| c.x as f32),
    floats(|c| c.y as f32),
    ints(|c| c.demand as i32),
    ints(|c| c.tw_start),
    ints(|c| c.tw_end),
    ints(|c| c.service_time as i32),
  ]
}

/// Writes the customer table as a single-row-group parquet file.
pub fn write_customer_table<W: Write + Send>(sink: W, customers: &CustomerSet) -> parquet::errors::Result<()> {
  let schema = Arc::new(parse_message_type(CUSTOMER_SCHEMA)?);
  let props = Arc::new(WriterProperties::builder().build());
  let mut writer = SerializedFileWriter::new(sink, schema, props)?;

  let mut columns = customer_columns(customers).into_iter();
  let mut row_group = writer.next_row_group()?;
  while let Some(mut col_writer) = row_group.next_column()? {
    let data = columns.next()
      .ok_or_else(|| ParquetError::General("schema has more columns than the customer table".to_string()))?;
    match (col_writer.untyped(), &data) {
      (ColumnWriter::Int32ColumnWriter(typed), Column::Int(values)) => {
        typed.write_batch(values, None, None)?;
      }
      (ColumnWriter::FloatColumnWriter(typed), Column::Float(values)) => {
        typed.write_batch(values, None, None)?;
      }
      _ => return Err(ParquetError::General("column type does not match schema".to_string())),
    }
    col_writer.close()?;
  }
  row_group.close()?;
  writer.close()?;
  Ok(())
}

fn scratch_dir_of(dest: &Path) -> &Path {
  match dest.parent() {
    Some(p) if !p.as_os_str().is_empty() => p,
    _ => Path::new("."),
  }
}

/// Runs `write` against a temporary sibling of `dest`, then renames it into place.
fn write_atomic<F, E>(dest: &Path, write: F) -> Result<()>
  where
    F: FnOnce(&mut File) -> std::result::Result<(), E>,
    E: std::fmt::Display,
{
  let mut tmp = NamedTempFile::new_in(scratch_dir_of(dest))
    .map_err(|e| Error::serialization(dest, e))?;
  write(tmp.as_file_mut()).map_err(|e| Error::serialization(dest, e))?;
  tmp.persist(dest).map_err(|e| Error::serialization(dest, e.error))?;
  Ok(())
}

pub fn write_customers(path: &Path, customers: &CustomerSet) -> Result<()> {
  write_atomic(path, |f| write_customer_table(f, customers))?;
  debug!(path = ?path, rows = customers.len(), "wrote customers");
  Ok(())
}

pub fn write_params(path: &Path, params: &InstanceParameters) -> Result<()> {
  write_atomic(path, |f| -> std::io::Result<()> {
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, params)?;
    w.flush()
  })?;
  debug!(path = ?path, "wrote params");
  Ok(())
}

/// Writes both artifacts into `out_dir`, creating it if needed.
pub fn write_artifacts(
  out_dir: &Path,
  customers: &CustomerSet,
  params: &InstanceParameters,
  cfg: &OutputConfig,
) -> Result<ArtifactPaths> {
  std::fs::create_dir_all(out_dir).map_err(|e| Error::serialization(out_dir, e))?;
  let paths = ArtifactPaths::new(out_dir, &params.instance, cfg);

  write_customers(&paths.customers, customers)?;
  if let Err(e) = write_params(&paths.params, params) {
    if let Err(rm) = std::fs::remove_file(&paths.customers) {
      warn!(path = ?paths.customers, error = %rm, "could not remove orphaned customers file");
    }
    return Err(e);
  }
  Ok(paths)
}

fn invalid_data(e: impl std::fmt::Display) -> Error {
  Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
}

fn int_field(row: &Row, idx: usize) -> Result<i64> {
  match row.get_column_iter().nth(idx).map(|(_, f)| f) {
    Some(Field::Short(v)) => Ok(*v as i64),
    Some(Field::Int(v)) => Ok(*v as i64),
    Some(Field::Long(v)) => Ok(*v),
    other => Err(invalid_data(format!("column {} is not an integer: {:?}", idx, other))),
  }
}

fn float_field(row: &Row, idx: usize) -> Result<f64> {
  match row.get_column_iter().nth(idx).map(|(_, f)| f) {
    Some(Field::Float(v)) => Ok(*v as f64),
    Some(Field::Double(v)) => Ok(*v),
    other => Err(invalid_data(format!("column {} is not a float: {:?}", idx, other))),
  }
}

/// Reads a customer table written by [`write_customers`].
pub fn read_customers(path: &Path) -> Result<Vec<PointRecord>> {
  let reader = SerializedFileReader::new(File::open(path)?).map_err(invalid_data)?;
  let rows = reader.get_row_iter(None).map_err(invalid_data)?;
  let mut out = Vec::new();
  for row in rows {
    let row = row.map_err(invalid_data)?;
    let narrow = |v: i64| -> Result<i32> {
      num_traits::cast(v).ok_or_else(|| invalid_data(format!("value {} out of range", v)))
    };
    out.push(PointRecord {
      id: narrow(int_field(&row, 0)?)?,
      x: float_field(&row, 1)?,
      y: float_field(&row, 2)?,
      demand: num_traits::cast(int_field(&row, 3)?).ok_or_else(|| invalid_data("demand out of range"))?,
      tw_start: narrow(int_field(&row, 4)?)?,
      tw_end: narrow(int_field(&row, 5)?)?,
      service_time: num_traits::cast(int_field(&row, 6)?).ok_or_else(|| invalid_data("service_time out of range"))?,
    });
  }
  Ok(out)
}

pub fn read_params(path: &Path) -> Result<InstanceParameters> {
  let f = BufReader::new(File::open(path)?);
  let params = serde_json::from_reader(f).map_err(std::io::Error::from)?;
  Ok(params)
}
