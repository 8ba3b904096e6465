use {
    crate::candidate::Address,
    anyhow::{Context, Result, bail},
    derive_more::{Debug, Display},
    reqwest::{Client, StatusCode},
    std::{future::Future, net::SocketAddr, time::Duration},
    strum_macros::{EnumIs, IntoStaticStr},
    tokio::time::{Instant, timeout},
    tracing::{debug, info, warn},
};

/// Why a probe has not produced any HTTP status at all.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
#[derive(Display, Debug, EnumIs, IntoStaticStr)]
pub enum FailReason {
    #[display("timeout")]
    #[strum(serialize = "timeout")]
    Timeout,

    #[display("transport-error")]
    #[strum(serialize = "transport-error")]
    TransportError,
}

/// The classified result of probing one [Address].
#[derive(Clone, PartialEq, Debug, EnumIs)]
pub enum ProbeOutcome {
    /// The address terminates TLS for the target host and answered 404.
    Accepted { address: Address, latency: Duration },
    /// The request completed, but with any status other than 404.
    Rejected { address: Address, status: StatusCode },
    Failed { address: Address, reason: FailReason },
}

/// The seam between the scheduler and whatever actually probes an address.
pub trait Probe: Send + Sync + 'static {
    fn probe(&self, address: Address) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Probes the target host over HTTPS, pinning the connection to a candidate address.
///
/// A fresh client is built for every probe, so there is no connection reuse
/// between candidates and the address override is the only resolution that happens.
#[derive(Clone, Debug)]
pub struct Prober {
    host: String,
    timeout: Duration,
    scheme: &'static str,
    port: u16,
}

impl ProbeOutcome {
    pub fn address(&self) -> &Address {
        match self {
            Self::Accepted { address, .. }
            | Self::Rejected { address, .. }
            | Self::Failed { address, .. } => address,
        }
    }

    /// Returns the measured latency for accepted outcomes only.
    pub fn latency(&self) -> Option<Duration> {
        match self {
            Self::Accepted { latency, .. } => Some(*latency),
            _ => None,
        }
    }

    /// Logs the outcome. Called once per outcome, as soon as it's known.
    pub fn report(&self) {
        match self {
            Self::Accepted { address, latency } => {
                info!(%address, latency = %format!("{:.3}s", latency.as_secs_f64()), "accepted")
            }
            Self::Rejected { address, status } => {
                warn!(%address, status = status.as_u16(), "rejected, unexpected HTTP status")
            }
            Self::Failed { address, reason } => {
                let reason: &'static str = (*reason).into();
                warn!(%address, reason, "failed")
            }
        }
    }
}

impl Prober {
    /// Extra time given to a probe on top of its timeout
    /// before it is abandoned regardless of what the HTTP client does.
    pub const GRACE: Duration = Duration::from_secs(2);

    const HTTPS_SCHEME: &'static str = "https";
    const HTTPS_PORT: u16 = 443;

    /// Creates a [Prober] for the given hostname and per-probe timeout.
    pub fn new<S: AsRef<str>>(host: S, timeout: Duration) -> Result<Self> {
        // Resolution overrides are keyed by the hostname exactly as it appears
        // in the request URL, which is always lowercase.
        let host = host.as_ref().trim().to_ascii_lowercase();

        if host.is_empty() {
            bail!("target host must not be empty")
        }
        if host.contains('/') || host.contains(':') {
            bail!("target host must be a bare hostname, got: {}", host)
        }
        if timeout.is_zero() {
            bail!("probe timeout must be greater than zero")
        }

        Ok(Self {
            host,
            timeout,
            scheme: Self::HTTPS_SCHEME,
            port: Self::HTTPS_PORT,
        })
    }

    /// Overrides the scheme and port the target is reached on.
    #[cfg(test)]
    pub(crate) fn with_endpoint(mut self, scheme: &'static str, port: u16) -> Self {
        self.scheme = scheme;
        self.port = port;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self) -> String {
        format!("{}://{}:{}/", self.scheme, self.host, self.port)
    }

    fn client_for(&self, pinned: SocketAddr) -> Result<Client> {
        Client::builder()
            .no_proxy()
            .timeout(self.timeout)
            .resolve(&self.host, pinned)
            .build()
            .with_context(|| format!("cannot build HTTP client pinned to {}", pinned))
    }

    /// Performs one probe of the target host through the given address.
    ///
    /// The request is bounded by the timeout, the whole probe by the timeout
    /// plus [Self::GRACE]. Latency covers the entire request,
    /// including connect, TLS handshake and reading the body.
    pub async fn check(&self, address: Address) -> ProbeOutcome {
        let failed = |address, reason| ProbeOutcome::Failed { address, reason };

        let Some(ip) = address.ip() else {
            debug!(%address, "not an IP literal, connection cannot be pinned to it");
            return failed(address, FailReason::TransportError);
        };

        let client = match self.client_for(SocketAddr::new(ip, self.port)) {
            Ok(client) => client,
            Err(err) => {
                debug!(%address, ?err, "cannot prepare probe");
                return failed(address, FailReason::TransportError);
            }
        };

        let started = Instant::now();
        // Yields the latency if the answer was 404, the status otherwise.
        let request = async {
            let response = client.get(self.url()).send().await?;
            let status = response.status();
            if status != StatusCode::NOT_FOUND {
                return Ok(Err(status));
            }

            response.bytes().await?;
            Ok::<_, reqwest::Error>(Ok(started.elapsed()))
        };

        classify(address, self.timeout + Self::GRACE, request).await
    }
}

// Awaits the request for at most `ceiling` and classifies how it has ended.
// The request yields the latency on 404 and the status otherwise.
async fn classify<F>(address: Address, ceiling: Duration, request: F) -> ProbeOutcome
where
    F: Future<Output = reqwest::Result<Result<Duration, StatusCode>>>,
{
    let failed = |address, reason| ProbeOutcome::Failed { address, reason };

    match timeout(ceiling, request).await {
        Ok(Ok(Ok(latency))) => ProbeOutcome::Accepted { address, latency },
        Ok(Ok(Err(status))) => ProbeOutcome::Rejected { address, status },
        Ok(Err(err)) => {
            debug!(%address, %err, "probe request has failed");
            match err.is_timeout() {
                true => failed(address, FailReason::Timeout),
                false => failed(address, FailReason::TransportError),
            }
        }
        Err(_elapsed) => {
            debug!(%address, ?ceiling, "abandoned past the hard ceiling");
            failed(address, FailReason::Timeout)
        }
    }
}

impl Probe for Prober {
    fn probe(&self, address: Address) -> impl Future<Output = ProbeOutcome> + Send {
        self.check(address)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        std::net::{IpAddr, Ipv4Addr},
        tokio::{
            io::{AsyncReadExt, AsyncWriteExt},
            net::TcpListener,
            time::sleep,
        },
    };

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    // Spawns a plain HTTP/1.1 server on localhost that answers every request
    // with the given status line after the given delay. Returns its port.
    async fn serve(status_line: &'static str, delay: Duration) -> u16 {
        let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 2048];
                    let _ = stream.read(&mut buf).await;
                    sleep(delay).await;
                    let response = format!(
                        "HTTP/1.1 {}\r\ncontent-length: 9\r\nconnection: close\r\n\r\nnot found",
                        status_line
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        port
    }

    fn prober(port: u16, timeout: Duration) -> Prober {
        Prober::new("Edge.Example.Test", timeout)
            .unwrap()
            .with_endpoint("http", port)
    }

    fn localhost() -> Address {
        Address::from(LOCALHOST)
    }

    #[tokio::test]
    async fn not_found_is_accepted_with_latency() {
        let port = serve("404 Not Found", Duration::ZERO).await;
        let outcome = prober(port, Duration::from_secs(3)).check(localhost()).await;

        assert!(outcome.is_accepted(), "{:?}", outcome);
        assert_eq!(outcome.address(), &localhost());
        assert!(outcome.latency().unwrap() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn ok_status_is_rejected_regardless_of_latency() {
        let port = serve("200 OK", Duration::ZERO).await;
        let outcome = prober(port, Duration::from_secs(3)).check(localhost()).await;

        assert_eq!(
            outcome,
            ProbeOutcome::Rejected {
                address: localhost(),
                status: StatusCode::OK
            }
        );
        assert_eq!(outcome.latency(), None);
    }

    #[tokio::test]
    async fn slow_answer_is_a_timeout_never_accepted() {
        let port = serve("404 Not Found", Duration::from_secs(5)).await;
        let outcome = prober(port, Duration::from_millis(300))
            .check(localhost())
            .await;

        assert_eq!(
            outcome,
            ProbeOutcome::Failed {
                address: localhost(),
                reason: FailReason::Timeout
            }
        );
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let port = {
            let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let outcome = prober(port, Duration::from_secs(3)).check(localhost()).await;

        assert_eq!(
            outcome,
            ProbeOutcome::Failed {
                address: localhost(),
                reason: FailReason::TransportError
            }
        );
    }

    #[tokio::test]
    async fn non_ip_literal_is_a_transport_error() {
        let address = Address::literal("definitely-not-an-ip");
        let outcome = prober(1, Duration::from_secs(1)).check(address.clone()).await;

        assert_eq!(
            outcome,
            ProbeOutcome::Failed {
                address,
                reason: FailReason::TransportError
            }
        );
    }

    #[tokio::test]
    async fn stalled_request_is_cut_off_at_the_ceiling() {
        let stalled = std::future::pending::<reqwest::Result<Result<Duration, StatusCode>>>();
        let started = Instant::now();
        let outcome = classify(localhost(), Duration::from_millis(50), stalled).await;

        assert_eq!(
            outcome,
            ProbeOutcome::Failed {
                address: localhost(),
                reason: FailReason::Timeout
            }
        );
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn finished_request_is_classified_by_its_answer() {
        let answered = |answer: Result<Duration, StatusCode>| async move {
            Ok::<_, reqwest::Error>(answer)
        };
        let latency = Duration::from_millis(120);
        let ceiling = Duration::from_secs(1);

        let found = classify(localhost(), ceiling, answered(Ok(latency))).await;
        assert_eq!(found.latency(), Some(latency));

        let forbidden = answered(Err(StatusCode::FORBIDDEN));
        let forbidden = classify(localhost(), ceiling, forbidden).await;
        assert_eq!(
            forbidden,
            ProbeOutcome::Rejected {
                address: localhost(),
                status: StatusCode::FORBIDDEN
            }
        );
    }

    #[test]
    fn host_is_normalized_and_validated() {
        let prober = Prober::new("  Edge.Example.COM ", Duration::from_secs(1)).unwrap();
        assert_eq!(prober.host(), "edge.example.com");
        assert_eq!(prober.url(), "https://edge.example.com:443/");

        assert!(Prober::new("", Duration::from_secs(1)).is_err());
        assert!(Prober::new("https://example.com", Duration::from_secs(1)).is_err());
        assert!(Prober::new("example.com", Duration::ZERO).is_err());
    }

    #[test]
    fn fail_reasons_render_as_tags() {
        assert_eq!(FailReason::Timeout.to_string(), "timeout");
        assert_eq!(<&str>::from(FailReason::TransportError), "transport-error");
    }
}
