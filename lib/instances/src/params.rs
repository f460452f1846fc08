use std::convert::TryFrom;
use serde::{Deserialize, Serialize};
use tracing::*;
use crate::{Error, Result};
use crate::schema::{DepotInfo, NormalizedInstance};

/// Fleet oversizing factor 1.2, kept as a ratio so the estimate is exact.
const MARGIN_NUM: i128 = 6;
const MARGIN_DEN: i128 = 5;

#[allow(non_snake_case)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceParameters {
  pub instance: String,
  /// Estimated fleet size.
  pub K: u32,
  /// Vehicle capacity.
  pub Q: u32,
  pub depot: DepotInfo,
}

/// `max(1, floor(total_demand / capacity * 1.2))`
///
/// A seed for the solver's vehicle count, not a bound on anything.
pub fn estimate_fleet_size(total_demand: i64, capacity: i64) -> Result<u32> {
  if capacity <= 0 {
    return Err(Error::InvalidCapacity(capacity));
  }
  let k = (total_demand as i128 * MARGIN_NUM) / (capacity as i128 * MARGIN_DEN);
  Ok(k.max(1).min(u32::MAX as i128) as u32)
}

pub fn derive(inst: &NormalizedInstance) -> Result<InstanceParameters> {
  let capacity = inst.header.capacity;
  let total_demand = inst.customers.total_demand();
  let k = estimate_fleet_size(total_demand, capacity)?;
  let q = u32::try_from(capacity)
    .map_err(|_| Error::MalformedHeader(format!("capacity {} does not fit a 32-bit count", capacity)))?;
  debug!(instance = %inst.header.identifier, total_demand, K = k, Q = q, "derived parameters");

  Ok(InstanceParameters {
    instance: inst.header.identifier.clone(),
    K: k,
    Q: q,
    depot: inst.depot,
  })
}
