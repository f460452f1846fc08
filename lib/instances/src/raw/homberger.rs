/// Which physical layout an instance file uses.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Layout {
  /// Header sits on the line before the sentinel; rows follow it.
  Landmark { sentinel_line: usize },
  /// Header and rows sit at configured line offsets.
  FixedOffset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceHeader {
  pub identifier: String,
  /// Includes the depot.
  pub declared_points: i64,
  pub capacity: i64,
}

/// A point row exactly as read, before narrowing and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
  /// 1-based line number in the input.
  pub line: usize,
  pub id: i64,
  pub x: f64,
  pub y: f64,
  pub demand: i64,
  pub tw_start: i64,
  pub tw_end: i64,
  pub service_time: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Homberger {
  pub header: InstanceHeader,
  pub layout: Layout,
  pub rows: Vec<RawRow>,
  /// Landmark-region lines dropped for not having 7 tokens.
  pub skipped_rows: usize,
}
