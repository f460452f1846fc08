use std::path::{Path, PathBuf};
use crate::Result;

/// An ordered list of archives for batch conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSet {
  paths: Vec<PathBuf>,
}

impl ArchiveSet {
  pub fn from_paths<I, P>(paths: I) -> Self
    where
      I: IntoIterator<Item=P>,
      P: Into<PathBuf>,
  {
    ArchiveSet { paths: paths.into_iter().map(Into::into).collect() }
  }

  /// All paths matching a glob pattern, in the order `glob` yields them (sorted).
  pub fn from_glob(patt: &str) -> Result<Self> {
    let entries = glob::glob(patt).map_err(|e| {
      std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("bad glob '{}': {}", patt, e))
    })?;
    let paths: std::result::Result<Vec<PathBuf>, _> = entries.collect();
    let paths = paths.map_err(std::io::Error::from)?;
    Ok(ArchiveSet { paths })
  }

  pub fn extend(&mut self, other: ArchiveSet) {
    self.paths.extend(other.paths);
  }

  pub fn is_empty(&self) -> bool { self.paths.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item=&Path> + '_ {
    self.paths.iter().map(PathBuf::as_path)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn glob_is_sorted() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    for name in &["rc2.zip", "c2.zip", "notes.txt"] {
      std::fs::write(dir.path().join(name), "")?;
    }
    let patt = format!("{}/*.zip", dir.path().display());
    let set = ArchiveSet::from_glob(&patt)?;
    let names: Vec<_> = set.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
    assert_eq!(names, vec!["c2.zip", "rc2.zip"]);
    Ok(())
  }

  #[test]
  fn bad_glob() {
    assert!(ArchiveSet::from_glob("a/[b").is_err());
  }

  #[test]
  fn extend_keeps_order() {
    let mut set = ArchiveSet::from_paths(vec!["b.zip"]);
    assert!(!set.is_empty());
    set.extend(ArchiveSet::from_paths(vec!["a.zip", "c.zip"]));
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![Path::new("b.zip"), Path::new("a.zip"), Path::new("c.zip")]);
    assert!(ArchiveSet::default().is_empty());
  }
}
