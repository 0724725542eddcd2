/// Errors raised by the front-end and correlator tools.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O error occurred.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    /// The instrument did not report itself as running.
    #[error("connection to {0} not ready")]
    NotReady(String),
    /// The instrument rejected a request.
    #[error("request {request} failed: {reason}")]
    Katcp {
        /// Name of the request.
        request: String,
        /// Status and message returned by the instrument.
        reason: String,
    },
    /// Reply could not be understood.
    #[error("protocol: {0}")]
    Protocol(String),
    /// Fewer bytes came back than were asked for.
    #[error("short read of {name}: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Register or memory name.
        name: String,
        /// Bytes requested.
        expected: usize,
        /// Bytes received.
        actual: usize,
    },
    /// Register contents could not be decoded.
    #[error("decode: {0}")]
    Decode(#[from] binrw::Error),
    /// Read-back after a register write differs from the written value.
    #[error("write to {name} not verified: wrote {written:#x}, read back {read:#x}")]
    WriteVerify {
        /// Register name.
        name: String,
        /// Value written.
        written: u32,
        /// Value read back.
        read: u32,
    },
    /// Accumulation counter did not advance within the allowed number of polls.
    #[error("accumulation counter did not advance after {polls} polls")]
    PollTimeout {
        /// Number of polls performed.
        polls: usize,
    },
    /// I2C transaction failed.
    #[error("i2c device {addr:#04x}: {msg}")]
    I2c {
        /// 7-bit device address.
        addr: u8,
        /// Bus error description.
        msg: String,
    },
    /// A value lies outside the range a conversion accepts.
    #[error("{0}")]
    OutOfRange(String),
    /// Invalid argument provided.
    #[error("{0}")]
    InvalidArgument(String),
    /// Configuration could not be loaded.
    #[error("config: {0}")]
    Config(String),
    /// Rendering failed.
    #[error("plot: {0}")]
    Plot(String),
}

/// Result type for operations that may return an `Error`.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn i2c<E: std::fmt::Debug>(addr: u8) -> impl FnOnce(E) -> Error {
        move |e| Error::I2c {
            addr,
            msg: format!("{e:?}"),
        }
    }
}
