use std::path::Path;
use tracing::*;
use crate::Result;
use crate::archive::{InstanceArchive, MemberPattern};
use crate::config::ConvertConfig;
use crate::output::{self, ArtifactPaths, OutputClaims};
use crate::params::{self, InstanceParameters};
use crate::parsers::{HombergerFmt, HombergerText, ParseInstance};
use crate::raw::FromRaw;
use crate::raw::homberger::{Homberger, Layout};
use crate::schema::{DepotSource, NormalizedInstance};

/// What one finished conversion produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
  /// Archive member the instance came from; `None` for [`convert_text`].
  pub member: Option<String>,
  pub paths: ArtifactPaths,
  /// Rows in the customer table.
  pub customers: usize,
  pub params: InstanceParameters,
  pub depot_source: DepotSource,
  pub skipped_rows: usize,
  pub layout: Layout,
}

impl Conversion {
  pub fn depot_defaulted(&self) -> bool { self.depot_source == DepotSource::Default }
}

/// Converts the first member of `archive_path` whose base name matches `pattern`.
///
/// Nothing is written until the instance has been parsed, validated and its parameters
/// derived, so a failure before the write leaves `out_dir` untouched.
pub fn convert(archive_path: &Path, pattern: &str, out_dir: &Path, cfg: &ConvertConfig) -> Result<Conversion> {
  convert_archive(archive_path, pattern, out_dir, cfg, None)
}

/// Like [`convert`], but first claims the artifact paths in `claims` and fails with
/// [`Error::Serialization`](crate::Error::Serialization) if another conversion of the
/// same batch already holds them.
pub fn convert_claiming(
  archive_path: &Path,
  pattern: &str,
  out_dir: &Path,
  cfg: &ConvertConfig,
  claims: &OutputClaims,
) -> Result<Conversion> {
  convert_archive(archive_path, pattern, out_dir, cfg, Some(claims))
}

fn convert_archive(
  archive_path: &Path,
  pattern: &str,
  out_dir: &Path,
  cfg: &ConvertConfig,
  claims: Option<&OutputClaims>,
) -> Result<Conversion> {
  let span = info_span!("convert", archive = ?archive_path);
  let _enter = span.enter();

  let pattern = MemberPattern::new(pattern)?;
  let mut archive = InstanceArchive::open(archive_path)?;
  let member = archive.locate(&pattern)?;
  info!(member = %member.name, "converting instance");

  let raw = {
    let tmp = archive.extract_to_temp(&member, cfg.scratch_dir.as_deref())?;
    Homberger::parse(HombergerFmt(tmp.path()), &cfg.layout)?
  };

  let mut conversion = finish(raw, out_dir, cfg, claims)?;
  conversion.member = Some(member.name);
  Ok(conversion)
}

/// Like [`convert`], for instance text that is already in memory.
pub fn convert_text(text: &str, out_dir: &Path, cfg: &ConvertConfig) -> Result<Conversion> {
  let raw = Homberger::parse(HombergerText(text), &cfg.layout)?;
  finish(raw, out_dir, cfg, None)
}

fn finish(raw: Homberger, out_dir: &Path, cfg: &ConvertConfig, claims: Option<&OutputClaims>) -> Result<Conversion> {
  let layout = raw.layout;
  let inst = NormalizedInstance::from_raw(raw, &cfg.normalize)?;
  let params = params::derive(&inst)?;
  if let Some(claims) = claims {
    claims.claim(&ArtifactPaths::new(out_dir, &params.instance, &cfg.output))?;
  }
  let paths = output::write_artifacts(out_dir, &inst.customers, &params, &cfg.output)?;

  info!(
    instance = %params.instance,
    customers = inst.customers.len(),
    K = params.K,
    Q = params.Q,
    depot_defaulted = inst.depot_defaulted(),
    "converted"
  );

  Ok(Conversion {
    member: None,
    paths,
    customers: inst.customers.len(),
    params,
    depot_source: inst.depot_source,
    skipped_rows: inst.skipped_rows,
    layout,
  })
}
