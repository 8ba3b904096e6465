use {
    derive_more::{Debug, Display},
    ipnet::{IpAddrRange, IpNet, Ipv6AddrRange},
    itertools::Either,
    std::{
        iter::{self, Map, Once},
        net::{IpAddr, Ipv6Addr},
    },
};

/// One concrete address to probe.
///
/// Usually it's an IP literal produced by expanding a network,
/// but a candidate line that is not a network is kept verbatim (trimmed),
/// so it is not guaranteed to be a valid IP. See [Address::ip].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Display, Debug)]
#[display("{_0}")]
#[debug("{_0}")]
pub struct Address(String);

/// The lazy sequence of addresses a single candidate line expands to.
/// It is finite and can be restarted by cloning it before consuming.
pub type Hosts = Either<Map<IpAddrRange, fn(IpAddr) -> Address>, Once<Address>>;

impl Address {
    /// Wraps the given literal as is. No validation is performed.
    pub fn literal<S: Into<String>>(literal: S) -> Self {
        Self(literal.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the IP this address stands for, if it is an IP literal at all.
    pub fn ip(&self) -> Option<IpAddr> {
        self.0.parse().ok()
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        Self(ip.to_string())
    }
}

// Parses the given line as a network, allowing host bits to be set
// (so "10.0.0.5/24" is 10.0.0.0/24). A bare IP is a network of one host.
fn parse_network(line: &str) -> Option<IpNet> {
    line.parse::<IpNet>()
        .ok()
        .or_else(|| line.parse::<IpAddr>().ok().map(IpNet::from))
}

// Usable hosts of the network. For IPv4 that is what `hosts()` gives,
// but for IPv6 it starts from the network address itself.
fn hosts(network: IpNet) -> IpAddrRange {
    match network {
        IpNet::V6(net) if net.prefix_len() < 127 => {
            let first = Ipv6Addr::from(u128::from(net.network()) + 1);
            IpAddrRange::V6(Ipv6AddrRange::new(first, net.broadcast()))
        }
        _ => network.hosts(),
    }
}

/// Expands a candidate line into the host addresses it covers.
///
/// Networks yield their usable hosts in ascending order. IPv4 networks exclude
/// the network and broadcast addresses unless they are /31 or /32,
/// IPv6 networks exclude only the network (subnet-router anycast) address
/// unless they are /127 or /128.
/// Anything that fails to parse as a network is yielded back trimmed.
pub fn expand(line: &str) -> Hosts {
    let line = line.trim();

    match parse_network(line) {
        Some(network) => {
            let to_address = <Address as From<IpAddr>>::from as fn(IpAddr) -> Address;
            Either::Left(hosts(network).map(to_address))
        }
        None => Either::Right(iter::once(Address::literal(line))),
    }
}

/// Splits the raw input into candidate lines.
/// Lines are trimmed, blank ones and "#" comments are dropped.
pub fn parse_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

/// Flattens candidate lines into one address stream, preserving the input order.
pub fn addresses<S>(lines: &[S]) -> impl Iterator<Item = Address> + Clone + '_
where
    S: AsRef<str>,
{
    lines.iter().flat_map(|line| expand(line.as_ref()))
}
