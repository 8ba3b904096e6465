use {
    crate::{
        candidate,
        prober::Probe,
        ranker::{self, Shortlist},
        scheduler::{Probed, Scheduler},
        sink::Sink,
    },
    anyhow::{Context, Result, bail},
    getset::{CopyGetters, Getters},
    std::path::Path,
    tokio::fs,
    tracing::info,
};

/// Composes the whole pipeline: expands candidates, probes them,
/// ranks the outcomes and stores the [Shortlist].
pub struct Runner<P> {
    scheduler: Scheduler<P>,
    total: usize,
}

/// What a single run has ended up with.
#[derive(Debug, Getters, CopyGetters)]
pub struct Report {
    #[getset(get_copy = "pub")]
    addresses: usize,

    #[getset(get_copy = "pub")]
    accepted: usize,

    #[getset(get_copy = "pub")]
    rejected: usize,

    #[getset(get_copy = "pub")]
    failed: usize,

    #[getset(get = "pub")]
    shortlist: Shortlist,
}

impl Report {
    fn new(probed: &[Probed], shortlist: Shortlist) -> Self {
        let count = |f: fn(&Probed) -> bool| probed.iter().filter(|p| f(p)).count();

        Self {
            addresses: probed.len(),
            accepted: count(|p| p.outcome().is_accepted()),
            rejected: count(|p| p.outcome().is_rejected()),
            failed: count(|p| p.outcome().is_failed()),
            shortlist,
        }
    }
}

impl<P: Probe> Runner<P> {
    /// Creates a [Runner] that probes with up to `max_workers` probes at once
    /// and keeps at most `total` addresses.
    pub fn new(prober: P, max_workers: usize, total: usize) -> Result<Self> {
        if total == 0 {
            bail!("the shortlist length must be positive")
        }

        Ok(Self {
            scheduler: Scheduler::new(prober, max_workers)?,
            total,
        })
    }

    /// Runs the pipeline over the candidates from the `input` file,
    /// storing the [Shortlist] in the given [Sink].
    ///
    /// An unreadable input or unwritable output aborts the run before
    /// any probing starts. In the former case the output is left untouched,
    /// otherwise it is truncated first and rewritten at the end.
    pub async fn run(&self, input: &Path, sink: &Sink) -> Result<Report> {
        let text = fs::read_to_string(input)
            .await
            .with_context(|| format!("cannot read candidates from {}", input.display()))?;

        sink.truncate().await?;

        let report = self.probe_lines(&candidate::parse_lines(&text)).await;

        sink.write(report.shortlist())
            .await
            .with_context(|| "the probing is done, but its result is lost")?;

        info!(
            written = report.shortlist().len(),
            path = %sink.path().display(),
            "the shortlist has been stored",
        );

        Ok(report)
    }

    /// Probes the given candidate lines and ranks the outcomes,
    /// storing nothing anywhere.
    pub async fn probe_lines<S: AsRef<str>>(&self, lines: &[S]) -> Report {
        info!(
            lines = lines.len(),
            workers = self.scheduler.max_workers(),
            "candidates are loaded, probing...",
        );

        let probed = self.scheduler.run(candidate::addresses(lines)).await;
        let shortlist = ranker::select(&probed, self.total);
        let report = Report::new(&probed, shortlist);

        info!(
            addresses = report.addresses,
            accepted = report.accepted,
            rejected = report.rejected,
            failed = report.failed,
            shortlisted = report.shortlist.len(),
            total = self.total,
            "probing is completed",
        );

        report
    }
}
