//! Firehose execution trace instrumentation for EVM nodes.
//!
//! The host node drives a [`Context`] through the block, transaction and call lifecycle and
//! the context emits one `FIRE ...` line per event. Transactions are recorded into a
//! speculative context first and flushed into the canonical context once complete.

pub mod call_stack;
pub mod config;
pub mod context;
mod context_checks;
pub mod flags;
pub mod format;
pub mod genesis;
pub mod logging;
pub mod printer;
pub mod reason;
pub mod types;
mod version;

pub use call_stack::{CallStack, CallStackError};
pub use config::{Buffers, ConfigError, Firehose, GenesisProvenance, Settings};
pub use context::Context;
pub use flags::FirehoseArgs;
pub use genesis::{report_header_comparison, report_header_comparison_to_stderr};
pub use logging::HexView;
pub use printer::{BufferPrinter, Printer, ReusableBuffer, WriterPrinter};
pub use reason::{BalanceChangeReason, GasChangeReason};
pub use types::{AccessListItem, BlockData, CallType, HeaderData, LogData, ReceiptData, TransactionData};
pub use version::{DEFAULT_CHAIN_VARIANT, INSTRUMENTATION_VERSION, PROTOCOL_VERSION};

#[doc(hidden)]
pub use tracing as __tracing;
