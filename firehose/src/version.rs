/// Version of the Firehose line protocol emitted by this instrumentation, printed in the
/// `INIT` line so consumers can pick the right reader.
pub const PROTOCOL_VERSION: &str = "2.2";

/// Chain variant reported in the `INIT` line when the host does not provide one.
pub const DEFAULT_CHAIN_VARIANT: &str = "geth";

/// Version of this instrumentation crate
pub const INSTRUMENTATION_VERSION: &str = env!("CARGO_PKG_VERSION");
