use eyre::WrapErr;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use crate::context::Context;
use crate::printer::{BufferPrinter, ReusableBuffer, WriterPrinter};
use crate::version::{DEFAULT_CHAIN_VARIANT, INSTRUMENTATION_VERSION, PROTOCOL_VERSION};

/// Capacity of the block scoped buffer, 50 MiB
pub const BLOCK_BUFFER_CAPACITY: usize = 50 * 1024 * 1024;

/// Capacity of the transaction scoped buffer, 5 MiB
pub const TRANSACTION_BUFFER_CAPACITY: usize = 5 * 1024 * 1024;

pub const MISSING_GENESIS_MESSAGE: &str = "Firehose requires to have the genesis config to properly emit genesis block for this chain \
but it appears it was not set properly. Ensure you are using either chain's specific flag like \
'--mainnet' or if using a custom network, you can use '--firehose-genesis-file' flag to provide. Firehose \
is going to validate it against what your node database contains, so can be sure that it's going to \
match what the database have.";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{}", MISSING_GENESIS_MESSAGE)]
    MissingGenesis,
}

/// Settings holds the Firehose process configuration as supplied by the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master switch of the instrumentation
    pub enabled: bool,

    /// Prints the trace of blocks received through syncing, turned off on miner nodes used
    /// only for speculative execution
    pub sync_instrumentation_enabled: bool,

    /// Keeps mining code enabled while Firehose is active, local development only
    pub mining_enabled: bool,

    /// Prints the `FINALIZE_BLOCK` line even when the instrumentation is disabled
    pub block_progress_enabled: bool,

    /// JSON genesis used when the node has no built-in genesis for the chain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genesis_file: Option<PathBuf>,

    /// Trace output destination, stdout when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    /// Version of the host node reported in the `INIT` line
    pub node_version: String,

    pub chain_variant: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: false,
            sync_instrumentation_enabled: true,
            mining_enabled: false,
            block_progress_enabled: false,
            genesis_file: None,
            output_path: None,
            node_version: String::new(),
            chain_variant: DEFAULT_CHAIN_VARIANT.to_string(),
        }
    }
}

impl Settings {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_sync_instrumentation(mut self, enabled: bool) -> Self {
        self.sync_instrumentation_enabled = enabled;
        self
    }

    pub fn with_mining(mut self, enabled: bool) -> Self {
        self.mining_enabled = enabled;
        self
    }

    pub fn with_block_progress(mut self, enabled: bool) -> Self {
        self.block_progress_enabled = enabled;
        self
    }

    pub fn with_genesis_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.genesis_file = Some(path.into());
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn with_node_version(mut self, version: impl Into<String>) -> Self {
        self.node_version = version.into();
        self
    }

    pub fn with_chain_variant(mut self, variant: impl Into<String>) -> Self {
        self.chain_variant = variant.into();
        self
    }

    /// Create the trace sink, a file when `output_path` is set, stdout otherwise
    pub fn create_writer(&self) -> eyre::Result<Box<dyn io::Write + Send>> {
        match &self.output_path {
            Some(path) => {
                let file = fs::File::create(path)
                    .wrap_err_with(|| format!("creating Firehose output file {}", path.display()))?;
                Ok(Box::new(file))
            }
            None => Ok(Box::new(io::stdout())),
        }
    }

    /// Load settings from JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .wrap_err_with(|| format!("reading Firehose settings file {}", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Load settings from JSON string, absent keys take their default value
    pub fn from_json_str(json: &str) -> eyre::Result<Self> {
        serde_json::from_str(json).wrap_err("decoding Firehose settings")
    }

    /// Load settings from file if provided, otherwise use default
    pub fn load_or_default<P: AsRef<Path>>(settings_file: Option<P>) -> eyre::Result<Self> {
        match settings_file {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// Where the genesis held by [`Firehose`] came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenesisProvenance {
    /// Resolved by the node itself from its chain selection flag
    ChainFlag,
    /// Decoded from the operator supplied genesis file
    File(PathBuf),
    Unset,
}

impl fmt::Display for GenesisProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChainFlag => f.write_str("Geth Specific Flag (--<chain>)"),
            Self::File(_) => f.write_str("Firehose Specific Flag (--firehose-genesis-file <file>)"),
            Self::Unset => f.write_str("unset"),
        }
    }
}

/// Pre-allocated buffers, one per scope, handed to a single owner through
/// [`Firehose::take_buffers`]
#[derive(Debug)]
pub struct Buffers {
    pub block: ReusableBuffer,
    pub transaction: ReusableBuffer,
}

impl Buffers {
    fn allocate() -> Self {
        Self {
            block: ReusableBuffer::with_capacity(BLOCK_BUFFER_CAPACITY),
            transaction: ReusableBuffer::with_capacity(TRANSACTION_BUFFER_CAPACITY),
        }
    }
}

/// Firehose process configuration, initialized once at startup and shared read-only with
/// every component needing it.
///
/// The genesis is opaque to the instrumentation, `G` is whatever type the host decodes its
/// genesis into.
#[derive(Debug)]
pub struct Firehose<G = alloy_genesis::Genesis> {
    settings: Settings,
    genesis: Option<G>,
    genesis_provenance: GenesisProvenance,
    buffers: Mutex<Option<Buffers>>,
    syncing_behind_finalized: AtomicBool,
    init_printed: AtomicBool,
}

impl<G: DeserializeOwned> Firehose<G> {
    /// Initializes the process configuration.
    ///
    /// A `genesis` resolved by the host takes precedence over `settings.genesis_file`, which is
    /// only read when no genesis was given. Buffers are allocated right away when the
    /// instrumentation is enabled.
    pub fn init(settings: Settings, genesis: Option<G>) -> eyre::Result<Self> {
        debug!(target: "firehose", "initializing Firehose");

        let (genesis, genesis_provenance) = match (genesis, &settings.genesis_file) {
            (Some(genesis), _) => (Some(genesis), GenesisProvenance::ChainFlag),
            (None, Some(path)) => (Some(read_genesis_file(path)?), GenesisProvenance::File(path.clone())),
            (None, None) => (None, GenesisProvenance::Unset),
        };

        let buffers = settings.enabled.then(Buffers::allocate);

        if settings.enabled
            || settings.sync_instrumentation_enabled
            || settings.mining_enabled
            || settings.block_progress_enabled
        {
            info!(
                target: "firehose",
                enabled = settings.enabled,
                sync_instrumentation_enabled = settings.sync_instrumentation_enabled,
                mining_enabled = settings.mining_enabled,
                block_progress_enabled = settings.block_progress_enabled,
                genesis_configured = genesis.is_some(),
                genesis_provenance = %genesis_provenance,
                firehose_version = INSTRUMENTATION_VERSION,
                protocol_version = PROTOCOL_VERSION,
                node_version = %settings.node_version,
                chain_variant = %settings.chain_variant,
                "Firehose initialized"
            );
        }

        Ok(Self {
            settings,
            genesis,
            genesis_provenance,
            buffers: Mutex::new(buffers),
            syncing_behind_finalized: AtomicBool::new(false),
            init_printed: AtomicBool::new(false),
        })
    }
}

fn read_genesis_file<G: DeserializeOwned>(path: &Path) -> eyre::Result<G> {
    let file = fs::File::open(path)
        .wrap_err_with(|| format!("firehose open genesis file {}", path.display()))?;

    serde_json::from_reader(io::BufReader::new(file))
        .wrap_err_with(|| format!("decode genesis file {:?}", path.display().to_string()))
}

impl<G> Firehose<G> {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn sync_instrumentation_enabled(&self) -> bool {
        self.settings.sync_instrumentation_enabled
    }

    pub fn mining_enabled(&self) -> bool {
        self.settings.mining_enabled
    }

    pub fn block_progress_enabled(&self) -> bool {
        self.settings.block_progress_enabled
    }

    pub fn genesis(&self) -> Option<&G> {
        self.genesis.as_ref()
    }

    pub fn genesis_provenance(&self) -> &GenesisProvenance {
        &self.genesis_provenance
    }

    /// Genesis required to emit the genesis block, fails with the operator remediation
    /// message when none was configured
    pub fn require_genesis(&self) -> Result<&G, ConfigError> {
        self.genesis.as_ref().ok_or(ConfigError::MissingGenesis)
    }

    /// Moves the pre-allocated buffers out, `None` when disabled or already taken
    pub fn take_buffers(&self) -> Option<Buffers> {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn syncing_behind_finalized(&self) -> bool {
        self.syncing_behind_finalized.load(Ordering::Relaxed)
    }

    pub fn set_syncing_behind_finalized(&self, behind: bool) {
        self.syncing_behind_finalized.store(behind, Ordering::Relaxed);
    }

    /// Builds the canonical context printing to `writer`.
    ///
    /// The context records only when both the instrumentation and the sync instrumentation are
    /// enabled. Otherwise it stays silent except for `FINALIZE_BLOCK` when block progress is
    /// enabled.
    ///
    /// The `INIT` line opens the trace stream once per process: the first recording context
    /// built prints it, later ones (a context rebuilt over a reopened sink) do not.
    pub fn sync_context<W: io::Write>(&self, writer: W) -> Context<WriterPrinter<W>> {
        let printer = WriterPrinter::new(writer);

        if !(self.settings.enabled && self.settings.sync_instrumentation_enabled) {
            return Context::disabled(printer).with_block_progress(self.settings.block_progress_enabled);
        }

        let mut ctx = Context::new(printer).with_block_progress(self.settings.block_progress_enabled);
        if !self.init_printed.swap(true, Ordering::AcqRel) {
            ctx.init_version(&self.settings.node_version, PROTOCOL_VERSION, &self.settings.chain_variant);
        }
        ctx
    }

    /// Builds a transaction scoped context over `buffer`, enabled with the instrumentation
    pub fn speculative_context(&self, buffer: ReusableBuffer) -> Context<BufferPrinter> {
        if self.settings.enabled {
            Context::speculative(buffer)
        } else {
            Context::disabled(BufferPrinter::new(buffer))
        }
    }
}
