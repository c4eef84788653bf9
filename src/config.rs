//! Session configuration: the immutable description of one transfer,
//! ported from `SessionConfiguration.hpp`/`.cpp` and the argument
//! wiring of `Executable.cpp`.

use std::fmt;
use std::net::ToSocketAddrs;
use std::str::FromStr;
use std::time::Duration;

use structopt::StructOpt;

use crate::range::Range;
use crate::size::{Size, UnitSystem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl FromStr for Protocol {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            _ => Err("Unexpected protocol".into()),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Client,
    Server,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Client => "client",
            Mode::Server => "server",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Rx,
    Tx,
    Both,
}

impl Direction {
    pub fn sends(self) -> bool {
        matches!(self, Direction::Tx | Direction::Both)
    }

    pub fn receives(self) -> bool {
        matches!(self, Direction::Rx | Direction::Both)
    }
}

impl FromStr for Direction {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tx" => Ok(Direction::Tx),
            "rx" => Ok(Direction::Rx),
            "both" => Ok(Direction::Both),
            _ => Err("Unexpected mode option value".into()),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Rx => "rx",
            Direction::Tx => "tx",
            Direction::Both => "both",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verify {
    None,
    First,
    All,
}

impl FromStr for Verify {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Verify::None),
            "first" => Ok(Verify::First),
            "all" => Ok(Verify::All),
            _ => Err("Unexpected verification mode".into()),
        }
    }
}

impl fmt::Display for Verify {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verify::None => "none",
            Verify::First => "first",
            Verify::All => "all",
        })
    }
}

impl From<Verify> for crate::pattern::Verify {
    fn from(v: Verify) -> Self {
        match v {
            Verify::None => crate::pattern::Verify::None,
            Verify::First => crate::pattern::Verify::First,
            Verify::All => crate::pattern::Verify::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPolicy {
    WaitForPeer,
    SendComplete,
    ReceiveComplete,
}

impl FromStr for ShutdownPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wait_for_peer" => Ok(ShutdownPolicy::WaitForPeer),
            "send_complete" => Ok(ShutdownPolicy::SendComplete),
            "receive_complete" => Ok(ShutdownPolicy::ReceiveComplete),
            _ => Err("Unexpected shutdown policy".into()),
        }
    }
}

impl fmt::Display for ShutdownPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownPolicy::WaitForPeer => "wait_for_peer",
            ShutdownPolicy::SendComplete => "send_complete",
            ShutdownPolicy::ReceiveComplete => "receive_complete",
        })
    }
}

/// A resolved `[[local_host:]local_port:]remote_host:remote_port` endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub local_host: Option<String>,
    pub local_port: Option<u16>,
    pub remote_host: String,
    pub remote_port: u16,
}

impl Endpoint {
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        let host = self.local_host.as_deref().unwrap_or("0.0.0.0");
        let port = self.local_port.unwrap_or(0);
        resolve_one(host, port)
    }

    pub fn remote_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        resolve_one(&self.remote_host, self.remote_port)
    }
}

fn resolve_one(host: &str, port: u16) -> std::io::Result<std::net::SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved"))
}

impl FromStr for Endpoint {
    type Err = String;

    /// `( (LOCAL_HOST ":")? LOCAL_PORT ":" )? REMOTE_HOST ":" REMOTE_PORT`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.len() {
            2 => Ok(Endpoint {
                local_host: None,
                local_port: None,
                remote_host: parts[0].to_string(),
                remote_port: parts[1]
                    .parse()
                    .map_err(|_| format!("invalid endpoint '{}'", s))?,
            }),
            3 => Ok(Endpoint {
                local_host: None,
                local_port: Some(
                    parts[0]
                        .parse()
                        .map_err(|_| format!("invalid endpoint '{}'", s))?,
                ),
                remote_host: parts[1].to_string(),
                remote_port: parts[2]
                    .parse()
                    .map_err(|_| format!("invalid endpoint '{}'", s))?,
            }),
            4 => Ok(Endpoint {
                local_host: Some(parts[0].to_string()),
                local_port: Some(
                    parts[1]
                        .parse()
                        .map_err(|_| format!("invalid endpoint '{}'", s))?,
                ),
                remote_host: parts[2].to_string(),
                remote_port: parts[3]
                    .parse()
                    .map_err(|_| format!("invalid endpoint '{}'", s))?,
            }),
            _ => Err(format!("invalid endpoint '{}'", s)),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(host) = &self.local_host {
            write!(
                f,
                "{}:{}:{}:{}",
                host,
                self.local_port.unwrap_or(0),
                self.remote_host,
                self.remote_port
            )
        } else if let Some(port) = self.local_port {
            write!(f, "{}:{}:{}", port, self.remote_host, self.remote_port)
        } else {
            write!(f, "{}:{}", self.remote_host, self.remote_port)
        }
    }
}

/// The immutable description of one session (spec §3).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub protocol: Protocol,
    pub mode: Mode,
    pub direction: Direction,
    pub endpoint: Endpoint,
    pub size: u64,
    pub send_bandwidth: u64,
    pub receive_bandwidth: u64,
    pub bandwidth_sampling_frequency: u64,
    pub verify: Verify,
    pub windows: u64,
    pub packet_size: Range<u64>,
    pub duration_margin: Option<Duration>,
    pub shutdown_policy: ShutdownPolicy,
}

impl SessionConfig {
    /// Validate the combinations the original configuration layer
    /// rejects at parse time (`Executable.cpp`, plus the live-lock
    /// guard called out in spec §9).
    pub fn validate(&self) -> Result<(), String> {
        if self.bandwidth_sampling_frequency == 0 {
            return Err("invalid bandwidth-sampling-frequency".into());
        }
        if self.size == 0 {
            return Err("size is required and must be non-zero".into());
        }
        if self.direction == Direction::Tx
            && self.shutdown_policy == ShutdownPolicy::ReceiveComplete
        {
            return Err(
                "TX mode isn't compatible with shutdown policy receive_complete".into(),
            );
        }
        if self.direction == Direction::Rx && self.shutdown_policy == ShutdownPolicy::SendComplete
        {
            return Err("RX mode isn't compatible with shutdown policy send_complete".into());
        }
        if self.protocol == Protocol::Udp && self.mode == Mode::Server {
            return Err("Udp supports client mode only".into());
        }
        if self.direction.sends() && self.send_bandwidth < self.bandwidth_sampling_frequency {
            return Err(
                "tx-bandwidth lower than bandwidth-sampling-frequency would starve every slice"
                    .into(),
            );
        }
        if self.direction.receives()
            && self.receive_bandwidth < self.bandwidth_sampling_frequency
        {
            return Err(
                "rx-bandwidth lower than bandwidth-sampling-frequency would starve every slice"
                    .into(),
            );
        }
        Ok(())
    }

    /// `estimate + margin`, the computed test-duration timeout (spec §4.3).
    pub fn test_duration_budget(&self) -> Duration {
        let bandwidth = self.send_bandwidth.min(self.receive_bandwidth).max(1);
        let estimate = Duration::from_secs(self.size / bandwidth + 1);
        let margin = self.duration_margin.unwrap_or(estimate / 10);
        estimate + margin
    }
}

impl fmt::Display for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "protocol: {}", self.protocol)?;
        writeln!(f, "mode: {}", self.mode)?;
        writeln!(f, "direction: {}", self.direction)?;
        writeln!(f, "endpoint: {}", self.endpoint)?;
        writeln!(
            f,
            "send_bandwidth: {}/s",
            Size::from_bytes(self.send_bandwidth, UnitSystem::Si)
        )?;
        writeln!(
            f,
            "receive_bandwidth: {}/s",
            Size::from_bytes(self.receive_bandwidth, UnitSystem::Si)
        )?;
        writeln!(
            f,
            "bandwidth_sampling_frequency: {}Hz",
            self.bandwidth_sampling_frequency
        )?;
        writeln!(f, "verify: {}", self.verify)?;
        if self.windows != 0 {
            writeln!(f, "windows: {}", Size::from_bytes(self.windows, UnitSystem::Iec))?;
        } else {
            writeln!(f, "windows: default system value")?;
        }
        writeln!(f, "size: {}", Size::from_bytes(self.size, UnitSystem::Iec))?;
        match self.duration_margin {
            Some(d) => writeln!(f, "duration_margin: {}", humantime::format_duration(d))?,
            None => writeln!(f, "duration_margin: default")?,
        }
        writeln!(f, "shutdown_policy: {}", self.shutdown_policy)?;
        Ok(())
    }
}

/// One line of the session configuration file, parsed with `structopt`
/// the way `Executable.cpp::fill_configuration` uses
/// `boost::program_options` — one session per line, connect/listen are
/// mutually exclusive and one of them is required.
#[derive(Debug, StructOpt)]
#[structopt(name = "net-tester-session")]
pub struct SessionArgs {
    #[structopt(long = "connect", short = "c", conflicts_with = "listen")]
    pub connect: Option<String>,

    #[structopt(long = "listen", short = "l", conflicts_with = "connect")]
    pub listen: Option<String>,

    #[structopt(long = "size", short = "s")]
    pub size: Size,

    #[structopt(long = "protocol", short = "p", default_value = "tcp")]
    pub protocol: Protocol,

    #[structopt(long = "tx-bandwidth", short = "t", default_value = "128MB")]
    pub tx_bandwidth: Size,

    #[structopt(long = "rx-bandwidth", short = "r", default_value = "128MB")]
    pub rx_bandwidth: Size,

    #[structopt(long = "bandwidth-sampling-frequency", short = "f", default_value = "1000")]
    pub bandwidth_sampling_frequency: u64,

    #[structopt(long = "verify", short = "v", default_value = "none")]
    pub verify: Verify,

    #[structopt(long = "mode", short = "m", default_value = "both")]
    pub direction: Direction,

    #[structopt(long = "windows", short = "w", default_value = "0B")]
    pub windows: Size,

    #[structopt(long = "duration-margin", short = "d")]
    pub duration_margin: Option<humantime::Duration>,

    #[structopt(long = "max-datagram-size", short = "D", default_value = "65471B")]
    pub packet_size: Range<Size>,

    #[structopt(long = "shutdown-policy", short = "S", default_value = "send_complete")]
    pub shutdown_policy: ShutdownPolicy,
}

impl SessionArgs {
    pub fn into_config(self) -> Result<SessionConfig, String> {
        let (mode, endpoint_str) = match (self.connect, self.listen) {
            (Some(_), Some(_)) => {
                return Err("--connect and --listen are mutually exclusive".into())
            }
            (Some(e), None) => (Mode::Client, e),
            (None, Some(e)) => (Mode::Server, e),
            (None, None) => return Err("--connect or --listen are required".into()),
        };

        let endpoint = Endpoint::from_str(&endpoint_str)?;

        let config = SessionConfig {
            protocol: self.protocol,
            mode,
            direction: self.direction,
            endpoint,
            size: self.size.get(),
            send_bandwidth: self.tx_bandwidth.get(),
            receive_bandwidth: self.rx_bandwidth.get(),
            bandwidth_sampling_frequency: self.bandwidth_sampling_frequency,
            verify: self.verify,
            windows: self.windows.get(),
            packet_size: Range::new(self.packet_size.low().get(), self.packet_size.high().get()),
            duration_margin: self.duration_margin.map(Into::into),
            shutdown_policy: self.shutdown_policy,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Parse one line of a configuration file (one session, `argv`-style
/// whitespace-split tokens) into a `SessionConfig`.
pub fn parse_session_line(line: &str) -> Result<SessionConfig, String> {
    let mut argv = vec!["net-tester-session".to_string()];
    argv.extend(line.split_whitespace().map(str::to_string));
    let args = SessionArgs::from_iter_safe(argv).map_err(|e| e.to_string())?;
    args.into_config()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_remote_only_endpoint() {
        let e = Endpoint::from_str("localhost:9000").unwrap();
        assert!(e.local_host.is_none());
        assert!(e.local_port.is_none());
        assert_eq!(e.remote_host, "localhost");
        assert_eq!(e.remote_port, 9000);
    }

    #[test]
    fn parses_local_port_and_remote() {
        let e = Endpoint::from_str("8000:localhost:9000").unwrap();
        assert_eq!(e.local_port, Some(8000));
        assert_eq!(e.remote_port, 9000);
    }

    #[test]
    fn parses_full_endpoint() {
        let e = Endpoint::from_str("127.0.0.1:8000:localhost:9000").unwrap();
        assert_eq!(e.local_host.as_deref(), Some("127.0.0.1"));
        assert_eq!(e.local_port, Some(8000));
    }

    #[test]
    fn rejects_malformed_endpoint() {
        assert!(Endpoint::from_str("garbage").is_err());
    }

    #[test]
    fn rejects_tx_with_receive_complete() {
        let line = "--connect 127.0.0.1:9000 --size 1MiB --mode tx --shutdown-policy receive_complete";
        assert!(parse_session_line(line).is_err());
    }

    #[test]
    fn rejects_rx_with_send_complete() {
        let line = "--connect 127.0.0.1:9000 --size 1MiB --mode rx --shutdown-policy send_complete";
        assert!(parse_session_line(line).is_err());
    }

    #[test]
    fn rejects_starving_bandwidth() {
        let line =
            "--connect 127.0.0.1:9000 --size 1MiB --tx-bandwidth 10B --bandwidth-sampling-frequency 1000";
        assert!(parse_session_line(line).is_err());
    }

    #[test]
    fn accepts_a_well_formed_line() {
        let line = "--connect 127.0.0.1:9000 --size 1MiB --verify all";
        let config = parse_session_line(line).unwrap();
        assert_eq!(config.size, 1024 * 1024);
        assert_eq!(config.verify, Verify::All);
        assert_eq!(config.mode, Mode::Client);
    }

    #[test]
    fn udp_server_is_rejected() {
        let line = "--listen 127.0.0.1:9000 --size 1MiB --protocol udp";
        assert!(parse_session_line(line).is_err());
    }
}
