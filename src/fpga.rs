//! Register access to a CASPER style FPGA board.

use std::{
    io::{BufRead, BufReader, Cursor, Write},
    net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use binrw::BinRead;
use log::{debug, info};

use crate::{
    Error, Result,
    config::KatcpConfig,
    katcp::{Kind, Message},
};

/// Free running counter clocked by the FPGA user clock.
pub const CLOCK_COUNTER: &str = "sys_clkcounter";

/// Seconds between the two clock counter samples.
const CLOCK_SAMPLE_SECS: f64 = 2.0;

/// Named register and memory access on a running FPGA design.
pub trait Fpga {
    /// Where the board lives, for error messages.
    fn endpoint(&self) -> String {
        "fpga".to_string()
    }

    /// Whether the board is reachable and a design is programmed and running.
    fn is_running(&mut self) -> bool;

    /// Reads `len` bytes from the start of a named register or memory.
    fn read_bytes(&mut self, name: &str, len: usize) -> Result<Vec<u8>>;

    /// Writes a 32-bit register.
    fn write_uint(&mut self, name: &str, value: u32) -> Result<()>;

    /// Reads a 32-bit register.
    fn read_uint(&mut self, name: &str) -> Result<u32> {
        let raw = self.read_bytes(name, 4)?;
        Ok(u32::read_be(&mut Cursor::new(raw))?)
    }

    /// Estimates the FPGA user clock in MHz.
    fn estimate_clock_mhz(&mut self) -> Result<f64> {
        let first = self.read_uint(CLOCK_COUNTER)?;
        std::thread::sleep(Duration::from_secs_f64(CLOCK_SAMPLE_SECS));
        let second = self.read_uint(CLOCK_COUNTER)?;
        Ok(clock_mhz_from_counts(first, second, CLOCK_SAMPLE_SECS))
    }
}

/// Clock rate from two counter samples taken `secs` apart. A single 32-bit wrap is undone.
pub fn clock_mhz_from_counts(first: u32, second: u32, secs: f64) -> f64 {
    second.wrapping_sub(first) as f64 / secs / 1e6
}

/// Socket addresses for `host`, which is a name or IP literal with an optional port.
///
/// IPv6 literals take a port only in brackets (`[::1]:7147`); a bare `::1` uses `port`.
pub fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    if let Ok(addr) = host.parse::<SocketAddr>() {
        return Ok(vec![addr]);
    }
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, port)]);
    }
    let addrs = match host.rsplit_once(':') {
        Some((name, p)) => {
            let p = p
                .parse::<u16>()
                .map_err(|_| Error::InvalidArgument(format!("invalid port in {host:?}")))?;
            (name, p).to_socket_addrs()?
        }
        None => (host, port).to_socket_addrs()?,
    };
    Ok(addrs.collect())
}

/// FPGA reached through a KATCP server over TCP.
pub struct KatcpFpga {
    host: String,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl KatcpFpga {
    /// Connects to `host`, which may carry an explicit `:port`.
    pub fn connect(host: &str, cfg: &KatcpConfig) -> Result<KatcpFpga> {
        let target = host.to_string();
        let timeout = Duration::from_secs_f64(cfg.timeout_secs);

        let mut last_err = None;
        for addr in resolve(host, cfg.port)? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    stream.set_nodelay(true)?;
                    info!("connected to {addr}");
                    let writer = stream.try_clone()?;
                    return Ok(KatcpFpga {
                        host: target,
                        reader: BufReader::new(stream),
                        writer,
                    });
                }
                Err(e) => {
                    debug!("connect to {addr} failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(match last_err {
            Some(e) => Error::Io(e),
            None => Error::InvalidArgument(format!("{target} did not resolve to any address")),
        })
    }

    /// Sends a request and waits for its reply, skipping interleaved informs.
    pub fn request<A: AsRef<[u8]>>(&mut self, name: &str, args: &[A]) -> Result<Message> {
        self.writer.write_all(&Message::request(name, args).encode())?;

        let mut line = Vec::new();
        loop {
            line.clear();
            if self.reader.read_until(b'\n', &mut line)? == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("{} closed the connection", self.host),
                )));
            }
            if line.iter().all(|c| c.is_ascii_whitespace()) {
                continue;
            }
            let msg = Message::parse(&line)?;
            match msg.kind {
                Kind::Inform => debug!("#{} {}", msg.name, msg.reason()),
                Kind::Reply if msg.name == name => {
                    if msg.is_ok() {
                        return Ok(msg);
                    }
                    return Err(Error::Katcp {
                        request: name.to_string(),
                        reason: msg.reason(),
                    });
                }
                _ => {
                    return Err(Error::Protocol(format!(
                        "unexpected {:?} {} while waiting for {name}",
                        msg.kind, msg.name
                    )));
                }
            }
        }
    }
}

impl Fpga for KatcpFpga {
    fn endpoint(&self) -> String {
        self.host.clone()
    }

    fn is_running(&mut self) -> bool {
        match self.request::<&str>("fpgastatus", &[]) {
            Ok(_) => true,
            Err(e) => {
                debug!("fpgastatus: {e}");
                false
            }
        }
    }

    fn read_bytes(&mut self, name: &str, len: usize) -> Result<Vec<u8>> {
        let len_arg = len.to_string();
        let reply = self.request("read", &[name, "0", len_arg.as_str()])?;
        let mut data = reply.args.into_iter().nth(1).unwrap_or_default();
        if data.len() < len {
            return Err(Error::ShortRead {
                name: name.to_string(),
                expected: len,
                actual: data.len(),
            });
        }
        data.truncate(len);
        Ok(data)
    }

    fn write_uint(&mut self, name: &str, value: u32) -> Result<()> {
        let bytes = value.to_be_bytes();
        self.request("write", &[name.as_bytes(), b"0".as_slice(), bytes.as_slice()])?;
        let read = self.read_uint(name)?;
        if read != value {
            return Err(Error::WriteVerify {
                name: name.to_string(),
                written: value,
                read,
            });
        }
        Ok(())
    }
}
