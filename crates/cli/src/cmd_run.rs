use {
    crate::{Executable, args, build_info::ENV_PREFIX},
    anyhow::{Context, Result, bail},
    clap::Args as ClapArgs,
    const_format::concatcp,
    humantime::Duration as DisplayedDuration,
    sieve::{Runner, Sink},
    std::path::PathBuf,
    tokio::time::Instant,
    tracing::info,
};

/// The list of options for the "run" command.
#[derive(ClapArgs)]
pub struct Args {
    /// The file with candidates, one address or CIDR network per line
    #[arg(
        short,
        long,
        value_name("PATH"),
        default_value = "ip.txt",
        env(concatcp!(ENV_PREFIX, "INPUT_FILE")),
        hide_env = true,
    )]
    input: PathBuf,

    /// The file the fastest addresses are written to, one per line
    #[arg(
        short,
        long,
        value_name("PATH"),
        default_value = "yes.txt",
        env(concatcp!(ENV_PREFIX, "OUTPUT_FILE")),
        hide_env = true,
    )]
    output: PathBuf,

    #[command(flatten)]
    probing: args::OfProbing,
}

impl Executable for Args {
    // The preparation for [run], that validates options before any I/O happens.
    fn setup(self) -> Result<Self> {
        if self.input == self.output {
            bail!("input and output must be different files, both are: {}", self.input.display())
        }

        // Fails early on a bad hostname or timeout.
        self.probing.prober()?;

        Ok(self)
    }

    // The "main" function for the "run" command.
    // Probes every candidate from the input and stores the fastest ones.
    async fn run(self, _: &args::Global) -> Result<()> {
        info!(
            host = %self.probing.host,
            timeout = %self.probing.timeout,
            input = %self.input.display(),
            "welcome to ipsift",
        );

        let runner = Runner::new(
            self.probing.prober()?,
            self.probing.workers,
            self.probing.total,
        )?;

        let now = Instant::now();
        let report = runner
            .run(&self.input, &Sink::new(&self.output))
            .await
            .with_context(|| "the run has failed")?;

        info!(
            elapsed = %DisplayedDuration::from(now.elapsed()),
            available = report.accepted(),
            written = report.shortlist().len(),
            "done",
        );

        Ok(())
    }
}
