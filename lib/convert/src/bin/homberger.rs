use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use itertools::Itertools;
use rayon::ThreadPoolBuilder;
use anyhow::{Context, Result};
use tracing::*;
use structopt::StructOpt;

use vrptw_convert::*;
use vrptw_convert::batch::{self, BatchJob, BatchReport, Outcome};
use vrptw_instances::{ConvertConfig, Conversion, PointRecord};
use vrptw_instances::dataset::ArchiveSet;
use vrptw_instances::output::read_customers;

#[derive(Debug, Copy, Clone)]
enum ReportFormat {
    Json,
    Summary,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "summary" => Ok(Self::Summary),
            _ => Err(format!("invalid report format: {}", s)),
        }
    }
}

fn parse_jobs(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("need at least one job".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Convert Homberger VRPTW instances inside zip archives into a parquet customer table
/// and a JSON parameters file.
#[derive(Debug, StructOpt)]
#[structopt(name = "homberger")]
struct ClArgs {
    /// Zip archives to convert
    #[structopt(parse(from_os_str))]
    archives: Vec<PathBuf>,
    /// Also convert every archive matching this glob
    #[structopt(long, short="g")]
    glob: Option<String>,
    /// Regular expression selecting the instance file by base name (first match wins)
    #[structopt(long, short="p", default_value=r"rc2.*\.txt")]
    pattern: String,
    #[structopt(long="output-dir", short="d", parse(from_os_str), default_value="data/vrptw/homberger")]
    output_dir: PathBuf,
    /// Put each archive's outputs in a subdirectory named after the archive
    #[structopt(long="split-by-archive")]
    split_by_archive: bool,
    /// Archives converted at the same time
    #[structopt(long, short="j", default_value="1", parse(try_from_str=parse_jobs))]
    jobs: usize,
    /// JSON file overriding layout, depot default and output settings
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,
    /// Number of customer rows to read back and show per converted instance
    #[structopt(long, default_value="3")]
    sample: usize,
    #[structopt(long="format", short="f", default_value="summary", possible_values=&["json", "summary"])]
    format: ReportFormat,
    /// Write the report here instead of stdout
    #[structopt(long="output", short="o", parse(from_os_str))]
    report_file: Option<PathBuf>,
    /// Also log to this file, as newline-delimited JSON
    #[structopt(long, parse(from_os_str))]
    log: Option<PathBuf>,
}

struct BatchSummary<'a> {
    report: &'a BatchReport,
    samples: Vec<Vec<PointRecord>>,
}

impl<'a> BatchSummary<'a> {
    fn new(report: &'a BatchReport, sample: usize) -> Self {
        let samples = report.converted()
            .map(|c| match read_customers(&c.paths.customers) {
                Ok(mut rows) => { rows.truncate(sample); rows },
                Err(e) => {
                    warn!(path = ?c.paths.customers, error = %e, "could not read back customers");
                    Vec::new()
                }
            })
            .collect();
        BatchSummary { report, samples }
    }

    fn to_json(&self) -> json::JsonValue {
        let mut samples = self.samples.iter();
        let mut converted = Vec::new();
        let mut failed = Vec::new();
        for o in &self.report.outcomes {
            let archive = o.archive.display().to_string();
            match &o.outcome {
                Outcome::Converted(c) => {
                    let sample = samples.next().map(Vec::as_slice).unwrap_or(&[]);
                    let mut record = conversion_record(c, sample);
                    record["archive"] = archive.into();
                    converted.push(record);
                }
                Outcome::Failed(e) => failed.push(json::object! {
                    archive: archive,
                    kind: format!("{:?}", e.kind()),
                    error: e.to_string(),
                }),
                Outcome::Missing => failed.push(json::object! {
                    archive: archive,
                    kind: "Missing",
                    error: "archive not found",
                }),
            }
        }
        return json::object! {
            converted: converted,
            failed: failed,
        }
    }

    fn write_summary(&self, mut buf: impl Write) -> Result<()> {
        let mut samples = self.samples.iter();
        for o in &self.report.outcomes {
            match &o.outcome {
                Outcome::Converted(c) => {
                    writeln!(buf, "converted {} from {}", c.member.as_deref().unwrap_or("?"), o.archive.display())?;
                    writeln!(buf, "   customers:  {} ({} customers)", c.paths.customers.display(), c.customers)?;
                    writeln!(buf, "   parameters: {}", c.paths.params.display())?;
                    writeln!(buf, "   vehicles: {}, capacity: {}", c.params.K, c.params.Q)?;
                    let d = &c.params.depot;
                    let note = if c.depot_defaulted() { " (default, no depot in source)" } else { "" };
                    writeln!(buf, "   depot: ({}, {}){}", d.x, d.y, note)?;
                    if c.skipped_rows > 0 {
                        writeln!(buf, "   skipped lines: {}", c.skipped_rows)?;
                    }
                    for p in samples.next().into_iter().flatten() {
                        writeln!(buf, "   {:>6} {:>8} {:>8} {:>6} {:>6} {:>6} {:>4}",
                                 p.id, p.x, p.y, p.demand, p.tw_start, p.tw_end, p.service_time)?;
                    }
                }
                Outcome::Failed(e) => writeln!(buf, "FAILED {}: {}", o.archive.display(), e)?,
                Outcome::Missing => writeln!(buf, "SKIPPED {}: archive not found", o.archive.display())?,
            }
        }
        writeln!(buf, "{} converted, {} failed", self.report.num_converted(), self.report.num_failed())?;
        return Ok(())
    }

    fn write(&self, mut buf: impl Write, format: ReportFormat) -> Result<()> {
        match format {
            ReportFormat::Json => self.to_json().write_pretty(&mut buf, 2)?,
            ReportFormat::Summary => self.write_summary(&mut buf)?,
        }
        buf.flush()?;
        Ok(())
    }

    /// Writes to `file` if given, stdout otherwise.
    fn emit(&self, file: Option<&Path>, format: ReportFormat) -> Result<()> {
        match file {
            Some(path) => {
                let f = std::fs::File::create(path).with_context(|| format!("failed to create report {:?}", path))?;
                self.write(std::io::BufWriter::new(f), format)
            }
            None => self.write(std::io::stdout(), format),
        }
    }
}

fn point_record(p: &PointRecord) -> json::JsonValue {
    return json::object! {
        customer_id: p.id,
        x: p.x,
        y: p.y,
        demand: p.demand,
        tw_start: p.tw_start,
        tw_end: p.tw_end,
        service_time: p.service_time,
    }
}

fn conversion_record(c: &Conversion, sample: &[PointRecord]) -> json::JsonValue {
    let member = c.member.clone();
    let customers_path = c.paths.customers.display().to_string();
    let params_path = c.paths.params.display().to_string();
    let layout = format!("{:?}", c.layout);
    let sample = sample.iter().map(point_record).collect_vec();
    return json::object! {
        member: member,
        instance: c.params.instance.as_str(),
        customers_path: customers_path,
        params_path: params_path,
        customers: c.customers,
        K: c.params.K,
        Q: c.params.Q,
        depot_defaulted: c.depot_defaulted(),
        skipped_rows: c.skipped_rows,
        layout: layout,
        sample: sample,
    }
}

fn main() -> anyhow::Result<()> {
    let args : ClArgs = StructOpt::from_args();
    let _g = init_logging(args.log.clone()).context("failed to open log file")?;
    debug!(?args);
    ThreadPoolBuilder::new().num_threads(args.jobs).build_global().context("failed to construct thread pool")?;

    let cfg = match &args.config {
        Some(path) => ConvertConfig::from_file(path).with_context(|| format!("failed to load config {:?}", path))?,
        None => ConvertConfig::default(),
    };

    let mut archives = ArchiveSet::from_paths(args.archives.clone());
    if let Some(patt) = &args.glob {
        archives.extend(ArchiveSet::from_glob(patt)?);
    }
    if archives.is_empty() {
        anyhow::bail!("no archives given (pass paths or --glob)");
    }

    let job = BatchJob {
        archives,
        pattern: args.pattern.clone(),
        out_dir: args.output_dir.clone(),
        split_by_archive: args.split_by_archive,
        cfg,
    };
    let report = batch::run(&job);
    BatchSummary::new(&report, args.sample).emit(args.report_file.as_deref(), args.format)?;

    if !report.all_converted() {
        anyhow::bail!("{} of {} conversions failed", report.num_failed(), report.outcomes.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_must_be_positive() {
        assert_eq!(parse_jobs("4"), Ok(4));
        assert!(parse_jobs("0").is_err());
        assert!(parse_jobs("-1").is_err());
    }

    #[test]
    fn report_lists_failures() -> Result<()> {
        let report = BatchReport {
            outcomes: vec![batch::ArchiveOutcome { archive: PathBuf::from("r1.zip"), outcome: Outcome::Missing }],
        };
        let summary = BatchSummary::new(&report, 3);
        let js = summary.to_json();
        assert_eq!(js["failed"][0]["kind"], "Missing");
        assert!(js["converted"].is_empty());

        let mut text = Vec::new();
        summary.write(&mut text, "summary".parse().map_err(anyhow::Error::msg)?)?;
        let text = String::from_utf8(text)?;
        assert!(text.contains("SKIPPED r1.zip"), "{}", text);
        assert!(text.ends_with("0 converted, 1 failed\n"), "{}", text);
        Ok(())
    }
}
