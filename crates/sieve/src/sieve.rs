//! Picks, out of a large set of candidate addresses, the ones that reach
//! a given hostname over HTTPS the fastest.
//!
//! Candidate lines (single addresses or CIDR networks) are expanded by
//! [candidate], probed concurrently by [Scheduler] using a [Prober],
//! ranked by [ranker::select] and stored by [Sink]. [Runner] glues it all together.

pub mod candidate;
pub mod prober;
pub mod ranker;
pub mod runner;
pub mod scheduler;
pub mod sink;

#[cfg(test)]
mod testing;

pub use crate::{
    candidate::Address,
    prober::{FailReason, Probe, ProbeOutcome, Prober},
    ranker::{Pick, Shortlist},
    runner::{Report, Runner},
    scheduler::{Probed, Scheduler},
    sink::Sink,
};
