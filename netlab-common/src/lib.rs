//! Shared substrate for the netlab dataplane binaries: the `NetIo` façade,
//! wire-format codecs, a `Clock` abstraction tests can drive deterministically,
//! config-file parsing, and logging setup.

pub mod clock;
pub mod config;
pub mod logging;
pub mod netio;
pub mod packet;
