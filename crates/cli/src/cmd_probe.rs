use {
    crate::{Executable, args},
    anyhow::Result,
    clap::Args as ClapArgs,
};

/// The list of options for the "probe" command.
#[derive(ClapArgs)]
pub struct Args {
    /// Candidates to probe, each an address or CIDR network
    #[arg(required = true, value_name = "CANDIDATE")]
    candidates: Vec<String>,

    #[command(flatten)]
    probing: args::OfProbing,
}

impl Executable for Args {
    fn setup(self) -> Result<Self> {
        self.probing.prober()?;
        Ok(self)
    }

    // The "main" function for the "probe" command.
    // Prints the would-be shortlist to stdout, one "address latency" per line.
    async fn run(self, _: &args::Global) -> Result<()> {
        let runner = sieve::Runner::new(
            self.probing.prober()?,
            self.probing.workers,
            self.probing.total,
        )?;

        runner
            .probe_lines(&self.candidates)
            .await
            .shortlist()
            .picks()
            .iter()
            .for_each(|pick| println!("{}\t{:.3}", pick.address(), pick.latency().as_secs_f64()));

        Ok(())
    }
}
