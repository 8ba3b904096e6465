use {
    crate::{candidate::Address, prober::ProbeOutcome, scheduler::Probed},
    getset::{CopyGetters, Getters},
    itertools::Itertools,
    std::{fmt, time::Duration},
};

/// One accepted address that made it into the [Shortlist].
#[derive(Clone, Debug, PartialEq, Getters, CopyGetters)]
pub struct Pick {
    #[getset(get = "pub")]
    address: Address,

    #[getset(get_copy = "pub")]
    latency: Duration,
}

/// The accepted addresses, fastest first, capped in length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Shortlist {
    picks: Vec<Pick>,
}

impl fmt::Display for Pick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.3}s)", self.address, self.latency.as_secs_f64())
    }
}

impl Shortlist {
    pub fn picks(&self) -> &[Pick] {
        &self.picks
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.picks.iter().map(Pick::address)
    }

    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }
}

/// Builds the [Shortlist] out of the probed addresses.
///
/// Only accepted outcomes are kept, ordered by ascending latency,
/// then truncated to `total` entries. Equal latencies are ordered
/// by the address position in the input stream, so the result doesn't depend
/// on the order the probes have completed in.
pub fn select<'a, I>(probed: I, total: usize) -> Shortlist
where
    I: IntoIterator<Item = &'a Probed>,
{
    let picks = probed
        .into_iter()
        .filter_map(|probed| match probed.outcome() {
            ProbeOutcome::Accepted { address, latency } => {
                Some((*latency, probed.position(), address))
            }
            _ => None,
        })
        .sorted_by_key(|(latency, position, _)| (*latency, *position))
        .take(total)
        .map(|(latency, _, address)| Pick {
            address: address.clone(),
            latency,
        })
        .collect();

    Shortlist { picks }
}
