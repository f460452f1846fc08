use std::collections::HashMap;
use std::path::{Path, PathBuf};
use itertools::Itertools;
use rayon::prelude::*;
use tracing::*;
use vrptw_instances::{convert_claiming, Conversion, ConvertConfig, Error};
use vrptw_instances::ErrorKind;
use vrptw_instances::dataset::ArchiveSet;
use vrptw_instances::output::OutputClaims;

/// Convert one pattern-selected member out of each archive in a set.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub archives: ArchiveSet,
    pub pattern: String,
    pub out_dir: PathBuf,
    /// Write each archive's artifacts to `out_dir/<archive stem>` instead of `out_dir`.
    pub split_by_archive: bool,
    pub cfg: ConvertConfig,
}

impl BatchJob {
    pub fn out_dir_for(&self, archive: &Path) -> PathBuf {
        match archive.file_stem() {
            Some(stem) if self.split_by_archive => self.out_dir.join(stem),
            _ => self.out_dir.clone(),
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Converted(Conversion),
    Failed(Error),
    /// The archive file does not exist.
    Missing,
}

#[derive(Debug)]
pub struct ArchiveOutcome {
    pub archive: PathBuf,
    pub outcome: Outcome,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ArchiveOutcome>,
}

impl BatchReport {
    pub fn converted(&self) -> impl Iterator<Item=&Conversion> + '_ {
        self.outcomes.iter().filter_map(|o| match &o.outcome {
            Outcome::Converted(c) => Some(c),
            _ => None,
        })
    }

    pub fn num_converted(&self) -> usize { self.converted().count() }

    pub fn num_failed(&self) -> usize { self.outcomes.len() - self.num_converted() }

    pub fn all_converted(&self) -> bool { self.num_failed() == 0 }

    /// Failure counts per error kind; missing archives are counted under `None`.
    pub fn failures_by_kind(&self) -> HashMap<Option<ErrorKind>, usize> {
        self.outcomes.iter()
            .filter_map(|o| match &o.outcome {
                Outcome::Converted(_) => None,
                Outcome::Failed(e) => Some(Some(e.kind())),
                Outcome::Missing => Some(None),
            })
            .counts()
    }
}

fn convert_one(job: &BatchJob, claims: &OutputClaims, archive: &Path) -> ArchiveOutcome {
    let outcome = if !archive.is_file() {
        warn!(archive = ?archive, "skipping, archive not found");
        Outcome::Missing
    } else {
        match convert_claiming(archive, &job.pattern, &job.out_dir_for(archive), &job.cfg, claims) {
            Ok(c) => Outcome::Converted(c),
            Err(e) => {
                error!(archive = ?archive, error = %e, "conversion failed");
                Outcome::Failed(e)
            }
        }
    };
    ArchiveOutcome { archive: archive.to_path_buf(), outcome }
}

/// Runs every conversion on the current rayon pool. A failed archive never stops the
/// others; outcomes keep the archive order. When two archives produce the same artifact
/// paths, whichever claims them first is written and the other fails.
pub fn run(job: &BatchJob) -> BatchReport {
    let archives = job.archives.iter().collect_vec();
    info!(archives = archives.len(), pattern = %job.pattern, "starting batch");
    let claims = OutputClaims::default();
    let outcomes: Vec<_> = archives.par_iter()
        .map(|a| convert_one(job, &claims, a))
        .collect();
    let report = BatchReport { outcomes };
    info!(converted = report.num_converted(), failed = report.num_failed(), "batch finished");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use vrptw_instances::output::{read_customers, read_params};

    fn instance(name: &str) -> String {
        format!("{}\n\n3 100\nCUSTOMER\n0 0 0 0 0 100 0\n1 1 1 40 0 50 5\n2 2 2 50 10 60 5\n", name)
    }

    fn write_zip(path: &Path, entries: &[(&str, String)]) -> anyhow::Result<()> {
        let mut w = zip::ZipWriter::new(std::fs::File::create(path)?);
        for (name, contents) in entries {
            w.start_file(*name, zip::write::FileOptions::default())?;
            w.write_all(contents.as_bytes())?;
        }
        w.finish()?;
        Ok(())
    }

    #[test]
    fn continues_past_failures() -> anyhow::Result<()> {
        let _g = crate::init_test_logging(None::<&str>)?;
        let dir = tempfile::tempdir()?;
        let good = dir.path().join("rc2.zip");
        let empty = dir.path().join("c2.zip");
        let missing = dir.path().join("r1.zip");
        write_zip(&good, &[("rc2_2_1.txt", instance("RC2_2_1"))])?;
        write_zip(&empty, &[("c2_2_1.txt", instance("C2_2_1"))])?;

        let job = BatchJob {
            archives: ArchiveSet::from_paths(vec![good.clone(), empty.clone(), missing.clone()]),
            pattern: r"rc2.*\.txt".to_string(),
            out_dir: dir.path().join("out"),
            split_by_archive: true,
            cfg: ConvertConfig::default(),
        };
        let report = run(&job);

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.outcomes.iter().map(|o| o.archive.clone()).collect_vec(), vec![good, empty, missing]);
        assert_eq!(report.num_converted(), 1);
        assert_eq!(report.num_failed(), 2);
        assert!(!report.all_converted());

        let kinds = report.failures_by_kind();
        assert_eq!(kinds.get(&Some(ErrorKind::NotFound)), Some(&1));
        assert_eq!(kinds.get(&None), Some(&1));

        let c = report.converted().next().unwrap();
        assert_eq!(c.params.K, 1);
        assert_eq!(c.params.Q, 100);
        assert_eq!(c.paths.params, dir.path().join("out").join("rc2").join("RC2_2_1_params.json"));
        assert!(c.paths.customers.is_file());
        assert!(!dir.path().join("out").join("c2").exists());
        Ok(())
    }

    #[test]
    fn same_instance_in_two_archives() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let a = dir.path().join("a.zip");
        let b = dir.path().join("b.zip");
        write_zip(&a, &[("rc2_2_1.txt", instance("RC2_2_1"))])?;
        write_zip(&b, &[("rc2_2_1.txt", instance("RC2_2_1").replace("3 100", "3 150"))])?;
        let mut job = BatchJob {
            archives: ArchiveSet::from_paths(vec![a.clone(), b.clone()]),
            pattern: "rc2".to_string(),
            out_dir: dir.path().join("out"),
            split_by_archive: false,
            cfg: ConvertConfig::default(),
        };

        let in_order = rayon::ThreadPoolBuilder::new().num_threads(1).build()?.install(|| run(&job));
        assert!(matches!(in_order.outcomes[0].outcome, Outcome::Converted(_)));
        match &in_order.outcomes[1].outcome {
            Outcome::Failed(e) => assert_eq!(e.kind(), ErrorKind::Serialization),
            other => panic!("unexpected {:?}", other),
        }

        let parallel = rayon::ThreadPoolBuilder::new().num_threads(2).build()?.install(|| run(&job));
        assert_eq!(parallel.num_converted(), 1);
        assert_eq!(parallel.failures_by_kind().get(&Some(ErrorKind::Serialization)), Some(&1));
        let c = parallel.converted().next().unwrap();
        assert_eq!(read_params(&c.paths.params)?, c.params);
        assert_eq!(read_customers(&c.paths.customers)?.len(), c.customers);

        job.split_by_archive = true;
        assert!(run(&job).all_converted());
        Ok(())
    }

    #[test]
    fn shared_out_dir() {
        let job = BatchJob {
            archives: ArchiveSet::default(),
            pattern: "x".to_string(),
            out_dir: PathBuf::from("out"),
            split_by_archive: false,
            cfg: ConvertConfig::default(),
        };
        assert_eq!(job.out_dir_for(Path::new("data/rc2.zip")), PathBuf::from("out"));
        let report = run(&job);
        assert!(report.outcomes.is_empty());
        assert!(report.all_converted());
    }
}
