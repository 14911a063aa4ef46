use std::fmt;

/// Failure categories surfaced by the public API.
///
/// Every public operation that can fail returns `Result<_, Error>` instead of
/// panicking — the engine is data-driven end to end, matching the "no
/// exception-like propagation past the public boundary" contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The configured field widths or capacities are not usable (e.g. a
    /// zero-sized receive buffer, or a width outside {1, 2, 4}).
    InvalidConfig,
    /// A send was attempted whose body length does not fit in the
    /// configured LEN field width (caught locally instead of writing a
    /// frame the peer could never parse correctly).
    PayloadTooLarge,
    /// The ID, type, or generic listener table has no free slot.
    TableFull,
    /// The send lock (host-provided or the internal fallback guard) could
    /// not be claimed.
    LockContention,
    /// `multipart_payload`/`multipart_close` was called without a prior
    /// `send_multipart`/`query_multipart`/`respond_multipart`, or in the
    /// wrong order.
    NoTransmitInProgress,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::InvalidConfig => "invalid instance configuration",
            Error::PayloadTooLarge => "payload exceeds receive buffer capacity",
            Error::TableFull => "listener table is full",
            Error::LockContention => "send lock could not be claimed",
            Error::NoTransmitInProgress => "no multipart transmit is in progress",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Error {}
