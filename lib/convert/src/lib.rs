use std::path::Path;

pub mod batch;


mod logging_setup {
    use super::*;
    use tracing_subscriber::{EnvFilter, fmt, registry, prelude::*};
    use tracing_appender::{non_blocking, non_blocking::WorkerGuard};
    use std::fs::OpenOptions;

    fn env_filter() -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }

    fn build_and_set_global_subscriber<P>(logfile: Option<P>, is_test : bool) -> std::io::Result<Option<WorkerGuard>> where
        P : AsRef<Path>
    {
        let stderr_log = fmt::layer().with_writer(std::io::stderr);
        let r = registry().with(env_filter()).with(stderr_log);

        let flush_guard = match logfile {
            Some(p) => {
                let logfile = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(p)?;
                let (writer, guard) = non_blocking::NonBlockingBuilder::default()
                    .lossy(false)
                    .finish(logfile);
                let json = fmt::layer()
                    .json()
                    .with_span_list(true)
                    .with_current_span(false)
                    .with_writer(writer);

                let r = r.with(json);
                if is_test { r.try_init().ok(); }
                else { r.init(); }
                Some(guard)
            },
            None => {
                if is_test { r.try_init().ok(); }
                else { r.init(); }
                None
            }
        };
        Ok(flush_guard)
    }

    /// Installs the global subscriber: human-readable events on stderr, filtered by
    /// `RUST_LOG` (default `info`), plus newline-delimited JSON in `logfile` if given.
    /// Keep the returned guard alive until exit so the logfile gets flushed.
    pub fn init_logging(logfile: Option<impl AsRef<Path>>) -> std::io::Result<Option<WorkerGuard>> {
        build_and_set_global_subscriber(logfile, false)
    }

    /// Like [`init_logging`], but a subscriber that is already installed is not an error.
    pub fn init_test_logging(logfile: Option<impl AsRef<Path>>) -> std::io::Result<Option<WorkerGuard>> {
        build_and_set_global_subscriber(logfile, true)
    }
}
pub use logging_setup::*;
