use {
    crate::{
        candidate::Address,
        prober::{FailReason, Probe, ProbeOutcome},
    },
    reqwest::StatusCode,
    std::{
        collections::HashMap,
        future::Future,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    },
    tokio::time::sleep,
};

/// What a [ScriptedProber] answers for some address.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Reply {
    /// Accepted with the given latency, in seconds.
    Accept(f64),
    Reject(u16),
    Fail(FailReason),
    /// Panics right away, as a buggy prober would.
    Panic,
}

/// A [Probe] that answers from a script instead of the network,
/// tracking how many probes it has been running at once.
///
/// Unscripted addresses fail with a transport error after the default delay.
#[derive(Default)]
pub(crate) struct ScriptedProber {
    script: HashMap<String, (Duration, Reply)>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedProber {
    pub(crate) fn script(mut self, address: &str, delay: Duration, reply: Reply) -> Self {
        self.script.insert(address.to_owned(), (delay, reply));
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Probe for ScriptedProber {
    fn probe(&self, address: Address) -> impl Future<Output = ProbeOutcome> + Send {
        async move {
            let (delay, reply) = self
                .script
                .get(address.as_str())
                .copied()
                .unwrap_or((self.delay, Reply::Fail(FailReason::TransportError)));
            if let Reply::Panic = reply {
                panic!("scripted crash for {}", address);
            }

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match reply {
                Reply::Accept(secs) => ProbeOutcome::Accepted {
                    address,
                    latency: Duration::from_secs_f64(secs),
                },
                Reply::Reject(code) => ProbeOutcome::Rejected {
                    address,
                    status: StatusCode::from_u16(code).unwrap(),
                },
                Reply::Fail(reason) => ProbeOutcome::Failed { address, reason },
                Reply::Panic => unreachable!(),
            }
        }
    }
}
