use {
    crate::{
        args::{self, LogFormat},
        build_info, cmd_probe, cmd_run,
    },
    anyhow::{Context, Result},
    clap::{Parser as ClapParser, Subcommand as ClapSubcommand},
    std::process::exit,
    time::{UtcOffset, macros::format_description},
    tracing::error,
    tracing_subscriber::fmt::time::OffsetTime,
};

// The application itself.
#[derive(ClapParser)]
#[command(version = build_info::version(), about, long_about = None)]
struct App {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    args: args::Global,
}

#[derive(ClapSubcommand)]
pub enum Command {
    /// Probes every candidate from the input file and stores the fastest ones
    Run(cmd_run::Args),
    /// Probes the given candidates and prints the fastest ones, storing nothing
    Probe(cmd_probe::Args),
}

// The interface must been implemented for the type to be treated as CLI command.
//
// It's implemented by the specific CLI command's options type,
// thus representing the CLI command abstraction themself.
pub trait Executable: Sized {
    fn setup(self) -> Result<Self>;
    async fn run(self, global: &args::Global) -> Result<()>;
}

// ========================================================================== //

impl App {
    fn setup(self) -> Self {
        self.setup_logging();
        self
    }

    // Must be called before the async runtime spawns its threads,
    // otherwise the local offset cannot be obtained and UTC is used.
    fn setup_logging(&self) {
        let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        let timer = OffsetTime::new(
            offset,
            format_description!(
                "[hour padding:none repr:12]:[minute padding:zero]:[second padding:zero] [period case:upper]"
            ),
        );

        let max_log_level = match self.args.verbose {
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        // The standard output is reserved for the results.
        let builder = tracing_subscriber::fmt()
            .with_timer(timer)
            .with_max_level(max_log_level)
            .with_writer(std::io::stderr);

        match self.args.log_format {
            LogFormat::Compact => builder.compact().with_ansi(true).init(),
            LogFormat::Full => builder.with_ansi(true).init(),
            LogFormat::Json => builder.json().init(),
        }
    }

    async fn exec_command(self) -> Result<()> {
        match self.command {
            Command::Run(cmd_args) => cmd_args.setup()?.run(&self.args).await,
            Command::Probe(cmd_args) => cmd_args.setup()?.run(&self.args).await,
        }
    }
}

// ========================================================================== //

// Parses CLI and ENV parameters, initializes logging,
// then executes the requested CLI command on the Tokio runtime.
// Exits the process with non-zero code if the command has failed.
pub fn exec() {
    let app = App::parse().setup();

    let result = tokio::runtime::Runtime::new()
        .with_context(|| "cannot start the async runtime")
        .and_then(|runtime| runtime.block_on(app.exec_command()));

    if let Err(err) = result {
        let err = format!("{}, because {}", err, err.root_cause());
        error!(err = %err, "critical error");
        exit(1);
    }
}
