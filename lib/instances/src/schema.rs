use num_traits::NumCast;
use serde::{Deserialize, Serialize};
use tracing::*;
use crate::{Error, Result, Set, Violation};
use crate::config::NormalizeConfig;
use crate::raw::FromRaw;
use crate::raw::homberger::*;

pub type Id = i32;
pub type Demand = i16;
pub type Time = i32;
pub type ServiceTime = i16;

/// One depot or customer row at its column precision.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
  pub id: Id,
  pub x: f64,
  pub y: f64,
  pub demand: Demand,
  pub tw_start: Time,
  pub tw_end: Time,
  pub service_time: ServiceTime,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepotInfo {
  pub x: f64,
  pub y: f64,
  pub tw_start: Time,
  pub tw_end: Time,
  pub service_time: ServiceTime,
}

impl From<&PointRecord> for DepotInfo {
  fn from(p: &PointRecord) -> Self {
    DepotInfo {
      x: p.x,
      y: p.y,
      tw_start: p.tw_start,
      tw_end: p.tw_end,
      service_time: p.service_time,
    }
  }
}

/// Whether the depot came from the input or from [`NormalizeConfig::default_depot`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DepotSource {
  Parsed,
  Default,
}

/// Customer records (every id except 0) in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomerSet(Vec<PointRecord>);

impl CustomerSet {
  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> std::slice::Iter<'_, PointRecord> { self.0.iter() }

  pub fn ids(&self) -> impl Iterator<Item=Id> + '_ { self.0.iter().map(|c| c.id) }

  pub fn total_demand(&self) -> i64 {
    self.0.iter().map(|c| c.demand as i64).sum()
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedInstance {
  pub header: InstanceHeader,
  pub layout: Layout,
  pub depot: DepotInfo,
  pub depot_source: DepotSource,
  pub customers: CustomerSet,
  pub skipped_rows: usize,
}

impl NormalizedInstance {
  pub fn depot_defaulted(&self) -> bool { self.depot_source == DepotSource::Default }
}

fn violation(id: i64, rule: Violation) -> Error {
  Error::SchemaViolation { id, rule }
}

fn narrow<T: NumCast>(id: i64, field: &'static str, value: i64) -> Result<T> {
  num_traits::cast(value).ok_or_else(|| violation(id, Violation::OutOfRange { field }))
}

fn coordinate(id: i64, field: &'static str, value: f64) -> Result<f64> {
  if value.is_finite() && value.abs() <= f32::MAX as f64 {
    Ok(value)
  } else {
    Err(violation(id, Violation::OutOfRange { field }))
  }
}

/// Checks the per-record rules and narrows to column types.
pub fn point_record(row: &RawRow) -> Result<PointRecord> {
  let id = row.id;
  if id < 0 {
    return Err(violation(id, Violation::NegativeId));
  }
  if row.demand < 0 {
    return Err(violation(id, Violation::NegativeDemand));
  }
  if row.tw_start > row.tw_end {
    return Err(violation(id, Violation::TimeWindowOrder));
  }
  if row.service_time < 0 {
    return Err(violation(id, Violation::NegativeServiceTime));
  }

  Ok(PointRecord {
    id: narrow(id, "id", id)?,
    x: coordinate(id, "x", row.x)?,
    y: coordinate(id, "y", row.y)?,
    demand: narrow(id, "demand", row.demand)?,
    tw_start: narrow(id, "tw_start", row.tw_start)?,
    tw_end: narrow(id, "tw_end", row.tw_end)?,
    service_time: narrow(id, "service_time", row.service_time)?,
  })
}

impl FromRaw<Homberger> for NormalizedInstance {
  type Options = NormalizeConfig;

  fn from_raw(raw: Homberger, cfg: &NormalizeConfig) -> Result<Self> {
    let Homberger { header, layout, rows, skipped_rows } = raw;
    let mut depot = None;
    let mut seen = Set::default();
    let mut customers = Vec::with_capacity(rows.len().saturating_sub(1));

    for row in &rows {
      let rec = point_record(row)?;
      if rec.id == 0 {
        if depot.is_some() {
          return Err(violation(0, Violation::DuplicateDepot));
        }
        depot = Some(DepotInfo::from(&rec));
      } else {
        if !seen.insert(rec.id) {
          return Err(violation(row.id, Violation::DuplicateId));
        }
        customers.push(rec);
      }
    }

    let (depot, depot_source) = match depot {
      Some(d) => (d, DepotSource::Parsed),
      None => {
        warn!(instance = %header.identifier, depot = ?cfg.default_depot, "no depot record, substituting default");
        (cfg.default_depot, DepotSource::Default)
      }
    };

    debug!(instance = %header.identifier, customers = customers.len(), ?depot_source, "normalized");

    Ok(NormalizedInstance {
      header,
      layout,
      depot,
      depot_source,
      customers: CustomerSet(customers),
      skipped_rows,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn row(id: i64, demand: i64, tw: (i64, i64), service_time: i64) -> RawRow {
    RawRow { line: 0, id, x: 1.5, y: -2.0, demand, tw_start: tw.0, tw_end: tw.1, service_time }
  }

  fn raw(rows: Vec<RawRow>) -> Homberger {
    Homberger {
      header: InstanceHeader { identifier: "T 1.0".to_string(), declared_points: rows.len() as i64, capacity: 100 },
      layout: Layout::FixedOffset,
      rows,
      skipped_rows: 2,
    }
  }

  fn normalize(rows: Vec<RawRow>) -> Result<NormalizedInstance> {
    NormalizedInstance::from_raw(raw(rows), &NormalizeConfig::default())
  }

  fn rule_of(r: Result<NormalizedInstance>) -> (i64, Violation) {
    match r {
      Err(Error::SchemaViolation { id, rule }) => (id, rule),
      other => panic!("expected schema violation, got {:?}", other),
    }
  }

  #[test]
  fn splits_depot_and_customers() -> Result<()> {
    let inst = normalize(vec![
      row(3, 10, (0, 5), 1),
      row(0, 0, (0, 1000), 0),
      row(1, 20, (2, 8), 1),
    ])?;
    assert_eq!(inst.depot_source, DepotSource::Parsed);
    assert!(!inst.depot_defaulted());
    assert_eq!(inst.depot, DepotInfo { x: 1.5, y: -2.0, tw_start: 0, tw_end: 1000, service_time: 0 });
    assert_eq!(inst.customers.ids().collect::<Vec<_>>(), vec![3, 1]);
    assert_eq!(inst.customers.total_demand(), 30);
    assert_eq!(inst.skipped_rows, 2);
    Ok(())
  }

  #[test]
  fn missing_depot_uses_configured_default() -> Result<()> {
    let mut cfg = NormalizeConfig::default();
    cfg.default_depot.x = 7.0;
    let inst = NormalizedInstance::from_raw(raw(vec![row(1, 5, (0, 1), 0)]), &cfg)?;
    assert_eq!(inst.depot_source, DepotSource::Default);
    assert!(inst.depot_defaulted());
    assert_eq!(inst.depot.x, 7.0);
    assert_eq!(inst.depot.y, 50.0);
    assert_eq!(inst.depot.tw_end, 1000);
    Ok(())
  }

  #[test]
  fn negative_demand_is_rejected() {
    assert_eq!(rule_of(normalize(vec![row(0, 0, (0, 9), 0), row(4, -5, (0, 9), 0)])), (4, Violation::NegativeDemand));
  }

  #[test]
  fn duplicate_ids() {
    assert_eq!(rule_of(normalize(vec![row(0, 0, (0, 9), 0), row(0, 0, (0, 9), 0)])), (0, Violation::DuplicateDepot));
    assert_eq!(rule_of(normalize(vec![row(2, 1, (0, 9), 0), row(2, 1, (0, 9), 0)])), (2, Violation::DuplicateId));
  }

  #[test]
  fn record_rules() {
    assert_eq!(rule_of(normalize(vec![row(-1, 1, (0, 9), 0)])), (-1, Violation::NegativeId));
    assert_eq!(rule_of(normalize(vec![row(1, 1, (10, 9), 0)])), (1, Violation::TimeWindowOrder));
    assert_eq!(rule_of(normalize(vec![row(1, 1, (0, 9), -3)])), (1, Violation::NegativeServiceTime));
  }

  #[test]
  fn values_must_fit_columns() {
    assert_eq!(rule_of(normalize(vec![row(1, 40_000, (0, 9), 0)])), (1, Violation::OutOfRange { field: "demand" }));
    assert_eq!(rule_of(normalize(vec![row(1 << 40, 1, (0, 9), 0)])).1, Violation::OutOfRange { field: "id" });
    assert_eq!(rule_of(normalize(vec![row(1, 1, (0, 1 << 33), 0)])).1, Violation::OutOfRange { field: "tw_end" });
    let mut r = row(1, 1, (0, 9), 0);
    r.x = f64::NAN;
    assert_eq!(rule_of(normalize(vec![r])).1, Violation::OutOfRange { field: "x" });
  }

  #[test]
  fn equal_time_window_bounds_are_fine() -> Result<()> {
    let inst = normalize(vec![row(1, 1, (5, 5), 0)])?;
    assert_eq!(inst.customers.len(), 1);
    Ok(())
  }
}
