use {
    crate::{
        candidate::Address,
        prober::{FailReason, Probe, ProbeOutcome},
    },
    anyhow::{Context, Result},
    getset::{CopyGetters, Getters},
    std::{collections::HashMap, num::NonZeroUsize, sync::Arc},
    tokio::task::{Id, JoinError, JoinSet},
    tracing::{debug, error},
};

/// A [ProbeOutcome] along with the position of its address in the input stream.
#[derive(Clone, Debug, PartialEq, Getters, CopyGetters)]
pub struct Probed {
    #[getset(get_copy = "pub")]
    position: usize,

    #[getset(get = "pub")]
    outcome: ProbeOutcome,
}

/// Runs probes over a stream of addresses, keeping at most
/// a fixed number of them in flight at any time.
pub struct Scheduler<P> {
    prober: Arc<P>,
    max_workers: NonZeroUsize,
}

impl Probed {
    pub fn new(position: usize, outcome: ProbeOutcome) -> Self {
        Self { position, outcome }
    }
}

impl<P: Probe> Scheduler<P> {
    /// Creates a [Scheduler] that runs up to `max_workers` probes at once.
    /// Returns an error if `max_workers` is zero.
    pub fn new(prober: P, max_workers: usize) -> Result<Self> {
        let max_workers = NonZeroUsize::new(max_workers)
            .with_context(|| "the number of workers must be positive")?;

        Ok(Self {
            prober: Arc::new(prober),
            max_workers,
        })
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers.get()
    }

    /// Probes every address the given stream yields and returns all the outcomes
    /// in the order they have completed.
    ///
    /// The next address is admitted only when some in-flight probe completes,
    /// so the stream is consumed lazily. A check that fails or times out
    /// has no effect on the others, and a panicked task still yields
    /// a transport error for its address. Each outcome is reported as soon as it's known.
    pub async fn run<I>(&self, addresses: I) -> Vec<Probed>
    where
        I: IntoIterator<Item = Address>,
    {
        let mut pending = addresses.into_iter().enumerate();
        let mut in_flight = InFlight::default();
        let mut completed = Vec::new();

        pending
            .by_ref()
            .take(self.max_workers.get())
            .for_each(|(position, address)| self.admit(&mut in_flight, position, address));

        while let Some(joined) = in_flight.tasks.join_next_with_id().await {
            let probed = match joined {
                Ok((id, probed)) => {
                    in_flight.admitted.remove(&id);
                    Some(probed)
                }
                // Only a panic inside the task may lead here.
                Err(err) => in_flight.crashed(err),
            };

            if let Some(probed) = probed {
                probed.outcome.report();
                completed.push(probed);
            }

            if let Some((position, address)) = pending.next() {
                self.admit(&mut in_flight, position, address);
            }
        }

        debug!(completed = completed.len(), "all probes are done");
        completed
    }

    fn admit(&self, in_flight: &mut InFlight, position: usize, address: Address) {
        let prober = Arc::clone(&self.prober);
        let task = address.clone();
        let id = in_flight
            .tasks
            .spawn(async move { Probed::new(position, prober.probe(task).await) })
            .id();
        in_flight.admitted.insert(id, (position, address));
    }
}

// Tasks being run, and what each of them has been admitted for.
#[derive(Default)]
struct InFlight {
    tasks: JoinSet<Probed>,
    admitted: HashMap<Id, (usize, Address)>,
}

impl InFlight {
    // Turns a crashed task into a transport error for the address it was admitted for.
    fn crashed(&mut self, err: JoinError) -> Option<Probed> {
        let Some((position, address)) = self.admitted.remove(&err.id()) else {
            error!(%err, "unknown task has crashed");
            return None;
        };

        error!(%address, %err, "task has crashed, counted as a transport error");
        let reason = FailReason::TransportError;
        Some(Probed::new(position, ProbeOutcome::Failed { address, reason }))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{Reply, ScriptedProber},
        std::{
            collections::HashSet,
            sync::atomic::{AtomicUsize, Ordering},
            time::Duration,
        },
        tokio::time::Instant,
    };

    fn addrs(n: usize) -> Vec<Address> {
        (1..=n).map(|i| Address::literal(format!("10.0.0.{i}"))).collect()
    }

    #[test]
    fn zero_workers_is_rejected() {
        assert!(Scheduler::new(ScriptedProber::default(), 0).is_err());
    }

    #[tokio::test]
    async fn every_address_gets_exactly_one_outcome() {
        let scheduler = Scheduler::new(ScriptedProber::default(), 4).unwrap();
        let probed = scheduler.run(addrs(25)).await;

        assert_eq!(probed.len(), 25);
        let positions: HashSet<_> = probed.iter().map(Probed::position).collect();
        assert_eq!(positions, (0..25).collect::<HashSet<_>>());
    }

    #[tokio::test]
    async fn keeps_exactly_max_workers_busy() {
        let delay = Duration::from_millis(20);
        let scheduler = Scheduler::new(ScriptedProber::default().with_delay(delay), 3).unwrap();

        let started = Instant::now();
        let probed = scheduler.run(addrs(20)).await;
        let elapsed = started.elapsed();

        assert_eq!(probed.len(), 20);
        assert_eq!(scheduler.prober.peak(), 3);
        // 7 rounds of 3 workers, while one at a time would take 20 rounds.
        assert!(elapsed < delay * 14, "elapsed: {:?}", elapsed);
    }

    #[tokio::test]
    async fn stream_is_pulled_once_per_address() {
        let pulled = AtomicUsize::new(0);
        let scheduler = Scheduler::new(ScriptedProber::default(), 4).unwrap();
        let stream = addrs(9).into_iter().inspect(|_| {
            pulled.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(scheduler.run(stream).await.len(), 9);
        assert_eq!(pulled.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn crashed_task_still_yields_a_transport_error() {
        let prober = ScriptedProber::default()
            .script("10.0.0.2", Duration::ZERO, Reply::Panic)
            .script("10.0.0.3", Duration::ZERO, Reply::Accept(0.1));
        let scheduler = Scheduler::new(prober, 2).unwrap();
        let probed = scheduler.run(addrs(4)).await;

        assert_eq!(probed.len(), 4);
        let crashed = probed.iter().find(|p| p.position() == 1).unwrap();
        assert_eq!(
            crashed.outcome(),
            &ProbeOutcome::Failed {
                address: Address::literal("10.0.0.2"),
                reason: FailReason::TransportError
            }
        );
        assert_eq!(probed.iter().filter(|p| p.outcome().is_accepted()).count(), 1);
    }

    #[tokio::test]
    async fn outcomes_come_in_completion_order() {
        let prober = ScriptedProber::default()
            .script("10.0.0.1", Duration::from_millis(300), Reply::Accept(0.3))
            .script("10.0.0.2", Duration::from_millis(10), Reply::Reject(200));
        let scheduler = Scheduler::new(prober, 2).unwrap();
        let probed = scheduler.run(addrs(2)).await;

        let order: Vec<_> = probed.iter().map(|p| p.outcome().address().to_string()).collect();
        assert_eq!(order, ["10.0.0.2", "10.0.0.1"]);
        assert_eq!(probed[0].position(), 1);
        assert_eq!(probed[1].position(), 0);
    }

    #[tokio::test]
    async fn slow_probe_does_not_hold_back_the_rest() {
        // One worker stays busy with the slow address,
        // the other one must drain everything else meanwhile.
        let prober = ScriptedProber::default()
            .script("10.0.0.1", Duration::from_millis(400), Reply::Fail(FailReason::Timeout));
        let scheduler = Scheduler::new(prober, 2).unwrap();
        let probed = scheduler.run(addrs(6)).await;

        assert_eq!(probed.len(), 6);
        let last = probed.last().unwrap().outcome();
        assert_eq!(last.address().as_str(), "10.0.0.1");
        assert!(last.is_failed());
    }

    #[tokio::test]
    async fn empty_stream_completes_immediately() {
        let scheduler = Scheduler::new(ScriptedProber::default(), 8).unwrap();
        assert!(scheduler.run(Vec::new()).await.is_empty());
    }
}
