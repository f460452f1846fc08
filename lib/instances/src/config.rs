use std::path::{Path, PathBuf};
use serde::Deserialize;
use crate::Result;
use crate::schema::DepotInfo;

/// Where the layout parser looks for its anchors. Line indices are 0-based and count
/// only non-blank lines.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
  /// First token of the landmark line.
  pub sentinel: String,
  /// Fixed-offset layout: line holding `declared_point_count capacity`.
  pub header_line: usize,
  /// Fixed-offset layout: first point row.
  pub first_row_line: usize,
}

impl Default for LayoutConfig {
  fn default() -> Self {
    LayoutConfig {
      sentinel: "CUSTOMER".to_string(),
      header_line: 4,
      first_row_line: 9,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
  /// Substituted when the source has no id 0 record.
  pub default_depot: DepotInfo,
}

impl Default for NormalizeConfig {
  fn default() -> Self {
    NormalizeConfig {
      default_depot: DepotInfo {
        x: 50.0,
        y: 50.0,
        tw_start: 0,
        tw_end: 1000,
        service_time: 0,
      },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
  pub customers_ext: String,
  pub params_ext: String,
}

impl Default for OutputConfig {
  fn default() -> Self {
    OutputConfig {
      customers_ext: "parquet".to_string(),
      params_ext: "json".to_string(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
  pub layout: LayoutConfig,
  pub normalize: NormalizeConfig,
  pub output: OutputConfig,
  /// Directory for the temporary extracted member; the system temp dir if `None`.
  pub scratch_dir: Option<PathBuf>,
}

impl ConvertConfig {
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let file = std::fs::File::open(path.as_ref())?;
    let cfg = serde_json::from_reader(std::io::BufReader::new(file))
      .map_err(std::io::Error::from)?;
    Ok(cfg)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn partial_config_keeps_defaults() -> anyhow::Result<()> {
    let mut f = tempfile::NamedTempFile::new()?;
    write!(f, r#"{{ "layout": {{ "sentinel": "NODES" }}, "normalize": {{ "default_depot": {{ "x": 0.0, "y": 0.0, "tw_start": 0, "tw_end": 240, "service_time": 0 }} }} }}"#)?;
    let cfg = ConvertConfig::from_file(f.path())?;
    assert_eq!(cfg.layout.sentinel, "NODES");
    assert_eq!(cfg.layout.header_line, 4);
    assert_eq!(cfg.layout.first_row_line, 9);
    assert_eq!(cfg.normalize.default_depot.tw_end, 240);
    assert_eq!(cfg.output, OutputConfig::default());
    assert_eq!(cfg.scratch_dir, None);
    Ok(())
  }

  #[test]
  fn bad_config_is_io_error() -> anyhow::Result<()> {
    let mut f = tempfile::NamedTempFile::new()?;
    write!(f, "{{ not json")?;
    let err = ConvertConfig::from_file(f.path()).unwrap_err();
    assert_eq!(err.kind(), crate::ErrorKind::Io);
    Ok(())
  }
}
