use {
    crate::build_info::ENV_PREFIX,
    anyhow::{Error, Result, bail},
    clap::{
        Args as ClapArgs,
        builder::{PossibleValuesParser, RangedU64ValueParser, TypedValueParser},
    },
    const_format::concatcp,
    humantime::{Duration as DisplayedDuration, parse_duration},
    sieve::Prober,
    std::time::Duration as StdDuration,
    strum::{EnumString, VariantNames},
};

// Creds: https://github.com/clap-rs/clap/discussions/4264
macro_rules! clap_enum_variants {
    ($e: ty) => {{
        let parser = PossibleValuesParser::new(<$e as VariantNames>::VARIANTS);
        parser.map(|s| s.parse::<$e>().unwrap())
    }};
}

/// How log lines are rendered.
#[derive(Clone, Copy, Debug, Default, PartialEq, EnumString, VariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Json,
}

// The global application options.
#[derive(ClapArgs)]
pub struct Global {
    /// Enable verbose output (up to 3 levels)
    #[arg(global=true, short, long, action=clap::ArgAction::Count)]
    pub verbose: u8,

    /// How log lines are rendered
    #[arg(
        global = true,
        long,
        value_name("FORMAT"),
        value_parser = clap_enum_variants!(LogFormat),
        default_value = "compact",
        env(concatcp!(ENV_PREFIX, "LOG_FORMAT")),
        hide_env = true,
    )]
    pub log_format: LogFormat,
}

/// The options of how candidates are probed and ranked,
/// shared by every command that probes.
#[derive(Clone, ClapArgs)]
pub struct OfProbing {
    /// The hostname every candidate address is probed for
    #[arg(
        short = 'H',
        long,
        value_name("HOST"),
        env(concatcp!(ENV_PREFIX, "TARGET_HOST")),
        hide_env = true,
    )]
    pub host: String,

    /// Per-probe timeout (a bare number means seconds, e.g. "3" or "1500ms")
    #[arg(
        short,
        long,
        value_parser = parse_flag_timeout,
        default_value_t = DisplayedDuration::from(OfProbing::DEF_TIMEOUT),
        env(concatcp!(ENV_PREFIX, "TIMEOUT")),
        hide_env = true,
    )]
    pub timeout: DisplayedDuration,

    /// How many probes may be in flight at the same time
    #[arg(
        short,
        long,
        value_name("NUMBER"),
        value_parser = RangedU64ValueParser::<usize>::new().range(1..),
        default_value_t = OfProbing::DEF_WORKERS,
        env(concatcp!(ENV_PREFIX, "MAX_WORKERS")),
        hide_env = true,
    )]
    pub workers: usize,

    /// How many fastest addresses to keep at most
    #[arg(
        short = 'n',
        long,
        value_name("NUMBER"),
        value_parser = RangedU64ValueParser::<usize>::new().range(1..),
        default_value_t = OfProbing::DEF_TOTAL,
        env(concatcp!(ENV_PREFIX, "TOTAL")),
        hide_env = true,
    )]
    pub total: usize,
}

impl OfProbing {
    const DEF_TIMEOUT: StdDuration = StdDuration::from_secs(3);
    const DEF_WORKERS: usize = 32;
    const DEF_TOTAL: usize = 50;

    /// Creates the [Prober] these options describe.
    pub fn prober(&self) -> Result<Prober> {
        Prober::new(&self.host, *self.timeout)
    }
}

// Parser for "--timeout" flag.
// Accepts either a number of seconds (fractions allowed) or a humantime duration.
fn parse_flag_timeout(s: &str) -> Result<DisplayedDuration> {
    let timeout = match s.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => StdDuration::from_secs_f64(secs),
        Ok(_) => bail!("must be a non-negative number of seconds, get: {}", s),
        Err(_) => parse_duration(s).map_err(Error::msg)?,
    };

    if timeout.is_zero() {
        bail!("must be greater than zero")
    }

    Ok(timeout.into())
}
