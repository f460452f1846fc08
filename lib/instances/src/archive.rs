//! Selecting one instance file out of a zip archive.
//!
//! Benchmark archives often bundle several instance families, so members are picked
//! by a regular expression over their base name. The first match in archive order wins;
//! callers that need one particular file must pass a pattern specific enough to name it.
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use regex::Regex;
use tempfile::NamedTempFile;
use tracing::*;
use zip::ZipArchive;
use crate::{Error, Result};

/// A member-name pattern. It must match at the start of the
/// base name but need not consume all of it.
#[derive(Debug, Clone)]
pub struct MemberPattern {
  source: String,
  re: Regex,
}

impl MemberPattern {
  pub fn new(pattern: &str) -> Result<Self> {
    let re = Regex::new(&format!("^(?:{})", pattern))?;
    Ok(MemberPattern { source: pattern.to_string(), re })
  }

  pub fn as_str(&self) -> &str { &self.source }

  pub fn matches(&self, base_name: &str) -> bool {
    self.re.is_match(base_name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMember {
  /// Position in the archive's central directory.
  pub index: usize,
  /// Full name, including any directories.
  pub name: String,
}

impl ArchiveMember {
  pub fn base_name(&self) -> &str { base_name(&self.name) }
}

fn base_name(name: &str) -> &str {
  name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name)
}

pub struct InstanceArchive<R> {
  path: PathBuf,
  zip: ZipArchive<R>,
}

impl InstanceArchive<BufReader<File>> {
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let file = File::open(path)?;
    Self::from_reader(path, BufReader::new(file))
  }
}

impl<R: Read + Seek> InstanceArchive<R> {
  /// `path` is only used to label errors.
  pub fn from_reader(path: impl Into<PathBuf>, reader: R) -> Result<Self> {
    let zip = ZipArchive::new(reader)?;
    Ok(InstanceArchive { path: path.into(), zip })
  }

  /// Every file member whose base name matches, in archive order. Only reads the
  /// central directory.
  pub fn candidates(&mut self, pattern: &MemberPattern) -> Result<Vec<ArchiveMember>> {
    let mut found = Vec::new();
    for index in 0..self.zip.len() {
      let entry = self.zip.by_index_raw(index)?;
      if entry.is_dir() {
        continue;
      }
      if pattern.matches(base_name(entry.name())) {
        found.push(ArchiveMember { index, name: entry.name().to_string() });
      }
    }
    Ok(found)
  }

  pub fn locate(&mut self, pattern: &MemberPattern) -> Result<ArchiveMember> {
    let mut found = self.candidates(pattern)?;
    if found.len() > 1 {
      debug!(pattern = pattern.as_str(), matches = found.len(), chosen = %found[0].name, "several members match, taking the first");
    }
    if found.is_empty() {
      Err(Error::NotFound { pattern: pattern.as_str().to_string(), archive: self.path.clone() })
    } else {
      Ok(found.swap_remove(0))
    }
  }

  /// Copies `member` into a temporary file, which is deleted when the handle drops.
  pub fn extract_to_temp(&mut self, member: &ArchiveMember, scratch_dir: Option<&Path>) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("instance-").suffix(".txt");
    let mut tmp = match scratch_dir {
      Some(dir) => builder.tempfile_in(dir)?,
      None => builder.tempfile()?,
    };
    let mut entry = self.zip.by_index(member.index)?;
    let n = std::io::copy(&mut entry, tmp.as_file_mut())?;
    debug!(member = %member.name, bytes = n, tmp = ?tmp.path(), "extracted");
    Ok(tmp)
  }
}

#[cfg(test)]
pub(crate) fn write_zip(path: &Path, entries: &[(&str, &str)]) -> std::io::Result<()> {
  use std::io::Write;
  let mut w = zip::ZipWriter::new(File::create(path)?);
  let opts = zip::write::FileOptions::default();
  for (name, contents) in entries {
    if name.ends_with('/') {
      w.add_directory(*name, opts)?;
    } else {
      w.start_file(*name, opts)?;
      w.write_all(contents.as_bytes())?;
    }
  }
  w.finish()?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fixture(dir: &Path) -> anyhow::Result<PathBuf> {
    let path = dir.join("homberger.zip");
    write_zip(&path, &[
      ("homberger/", ""),
      ("homberger/c2/c2_2_1.txt", "C2_2_1"),
      ("homberger/notes/readme_rc2.txt", "notes"),
      ("homberger/rc2/rc2_10_1.txt", "RC2_10_1"),
      ("homberger/rc2/rc2_10_2.txt", "RC2_10_2"),
      ("rc2_dir/", ""),
    ])?;
    Ok(path)
  }

  #[test]
  fn first_match_on_base_name() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut archive = InstanceArchive::open(fixture(dir.path())?)?;
    let pattern = MemberPattern::new(r"rc2.*\.txt")?;

    let all = archive.candidates(&pattern)?;
    assert_eq!(all.iter().map(|m| m.base_name()).collect::<Vec<_>>(), vec!["rc2_10_1.txt", "rc2_10_2.txt"]);

    let member = archive.locate(&pattern)?;
    assert_eq!(member.name, "homberger/rc2/rc2_10_1.txt");
    assert_eq!(member.index, 3);

    let member = archive.locate(&MemberPattern::new(r"rc2_10_2")?)?;
    assert_eq!(member.base_name(), "rc2_10_2.txt");
    Ok(())
  }

  #[test]
  fn no_match() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = fixture(dir.path())?;
    let mut archive = InstanceArchive::open(&path)?;
    match archive.locate(&MemberPattern::new(r"r1.*\.txt")?) {
      Err(Error::NotFound { pattern, archive }) => {
        assert_eq!(pattern, r"r1.*\.txt");
        assert_eq!(archive, path);
      }
      other => panic!("unexpected {:?}", other),
    }
    Ok(())
  }

  #[test]
  fn bad_pattern() {
    assert!(matches!(MemberPattern::new("rc2(.*"), Err(Error::Pattern(_))));
  }

  #[test]
  fn temp_copy_is_removed_on_drop() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut archive = InstanceArchive::open(fixture(dir.path())?)?;
    let member = archive.locate(&MemberPattern::new("c2_")?)?;
    let scratch = dir.path().join("scratch");
    std::fs::create_dir(&scratch)?;

    let tmp = archive.extract_to_temp(&member, Some(&scratch))?;
    let tmp_path = tmp.path().to_path_buf();
    assert!(tmp_path.starts_with(&scratch));
    assert_eq!(std::fs::read_to_string(&tmp_path)?, "C2_2_1");
    drop(tmp);
    assert!(!tmp_path.exists());
    assert_eq!(std::fs::read_dir(&scratch)?.count(), 0);
    Ok(())
  }

  #[test]
  fn not_a_zip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("plain.zip");
    std::fs::write(&path, "not a zip")?;
    assert!(matches!(InstanceArchive::open(&path), Err(Error::Archive(_))));
    Ok(())
  }
}
