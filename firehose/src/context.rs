use alloy_primitives::{Address, B256, U256};
use serde::Serialize;
use std::fmt::Display;

use crate::call_stack::CallStack;
use crate::format::{Addr, BigInt, Bool, Hash, HashList, Hex, MaybeAddr, Uint, json};
use crate::logging::HexView;
use crate::printer::{BufferPrinter, Printer, ReusableBuffer};
use crate::reason::{BalanceChangeReason, GasChangeReason};
use crate::types::{BlockData, CallType, HeaderData, LogData, ReceiptData, TransactionData, encode_access_list};
use crate::{firehose_debug, firehose_info, firehose_trace, firehose_trace_full};

/// Context records the execution of blocks, transactions and calls as Firehose lines.
///
/// The canonical context writes straight to the trace sink. A speculative context (see
/// [`Context::speculative`]) records a single transaction into a private buffer that the
/// canonical context flushes atomically once the transaction completed, so the canonical
/// stream never holds a partial transaction.
///
/// A speculative transaction borrows the block scope of the canonical context through
/// [`Context::start_speculative_transaction`]: it sees the block number and continues the
/// block's log numbering. The scope is handed back by [`Context::flush_transaction`], which
/// commits the logs to the block, or by [`Context::abandon_transaction`], which drops them.
///
/// A context must be driven by one thread at a time, the host guarantees that block and
/// transaction processing is sequential.
pub struct Context<P: Printer> {
    pub(crate) printer: P,
    pub(crate) enabled: bool,
    pub(crate) block_progress: bool,

    // Block state
    pub(crate) in_block: bool,
    pub(crate) block_number: Option<u64>,
    log_index_in_block: u64,

    // Transaction state
    pub(crate) in_transaction: bool,

    // Call stack tracking
    pub(crate) call_stack: CallStack,
}

#[derive(Serialize)]
struct EndBlockPayload<'a> {
    header: &'a HeaderData,
    uncles: &'a [HeaderData],
    #[serde(rename = "totalDifficulty")]
    total_difficulty: Option<&'a U256>,
}

impl<P: Printer> Context<P> {
    /// Creates an enabled context printing through `printer`
    pub fn new(printer: P) -> Self {
        Self {
            printer,
            enabled: true,
            block_progress: false,
            in_block: false,
            block_number: None,
            log_index_in_block: 0,
            in_transaction: false,
            call_stack: CallStack::new(),
        }
    }

    /// Creates a context that records nothing, only [`Context::finalize_block`] can still
    /// print when block progress is turned on
    pub fn disabled(printer: P) -> Self {
        Self {
            enabled: false,
            ..Self::new(printer)
        }
    }

    /// Keeps printing `FINALIZE_BLOCK` lines even when the context is disabled
    pub fn with_block_progress(mut self, block_progress: bool) -> Self {
        self.block_progress = block_progress;
        self
    }

    /// Hosts must check this before computing arguments for any recording method
    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_in_block(&self) -> bool {
        self.in_block
    }

    pub fn is_in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Number of calls currently open
    pub fn call_depth(&self) -> usize {
        self.call_stack.depth()
    }

    pub fn printer(&self) -> &P {
        &self.printer
    }

    pub fn into_printer(self) -> P {
        self.printer
    }

    #[inline]
    fn print(&mut self, fields: &[&dyn Display]) {
        self.printer.print(fields);
    }

    pub fn init_version(&mut self, node_version: &str, protocol_version: &str, chain_variant: &str) {
        if !self.enabled {
            return;
        }

        self.print(&[&"INIT", &protocol_version, &chain_variant, &node_version]);
    }

    // Block methods

    pub fn start_block(&mut self, block: &BlockData) {
        if !self.enabled {
            return;
        }

        self.ensure_not_in_block();
        self.ensure_no_open_call("starting a block");

        firehose_info!("start block (number={} hash={})", block.number(), HexView(block.hash()));

        self.in_block = true;
        self.block_number = Some(block.number());
        self.log_index_in_block = 0;

        self.print(&[&"BEGIN_BLOCK", &Uint(block.number())]);
    }

    /// Prints the block finalization line, the only line still printed when the context is
    /// disabled but block progress is on.
    pub fn finalize_block(&mut self, block: &BlockData) {
        if !self.enabled && !self.block_progress {
            return;
        }

        if self.enabled {
            self.ensure_in_block();
            self.ensure_no_open_call("finalizing a block");
        }

        self.print(&[&"FINALIZE_BLOCK", &Uint(block.number())]);
    }

    pub fn end_block(&mut self, block: &BlockData, total_difficulty: Option<&U256>) {
        if !self.enabled {
            return;
        }

        self.ensure_in_block();
        self.ensure_not_in_transaction();
        self.ensure_no_open_call("ending a block");

        firehose_info!("end block (number={} size={})", block.number(), block.size);

        let payload = json(&EndBlockPayload {
            header: &block.header,
            uncles: &block.uncles,
            total_difficulty,
        });
        self.print(&[&"END_BLOCK", &Uint(block.number()), &Uint(block.size), &payload]);

        self.reset_block();
    }

    /// Aborts the current block, whatever transaction or call was in flight is forgotten
    pub fn cancel_block(&mut self, block: &BlockData, err: &dyn Display) {
        if !self.enabled {
            return;
        }

        self.ensure_in_block();

        firehose_info!("cancel block (number={} err={})", block.number(), err);

        self.print(&[&"CANCEL_BLOCK", &Uint(block.number()), err]);

        self.reset_transaction();
        self.reset_block();
    }

    fn reset_block(&mut self) {
        self.in_block = false;
        self.block_number = None;
        self.log_index_in_block = 0;
    }

    // Transaction methods

    /// Opens the transaction scope, the context must be in a block (its own or one borrowed
    /// through [`Context::start_speculative_transaction`])
    pub fn start_transaction(&mut self, tx: &TransactionData, index: u64, base_fee: Option<U256>) {
        if !self.enabled {
            return;
        }

        self.ensure_in_block();
        self.ensure_not_in_transaction();
        self.ensure_no_open_call("starting a transaction");

        firehose_debug!("start transaction (index={} hash={})", index, HexView(tx.hash));

        self.in_transaction = true;
        self.call_stack.reset();

        let gas_price = tx.effective_gas_price(base_fee);
        let access_list = encode_access_list(&tx.access_list);

        self.print(&[
            &"BEGIN_APPLY_TRX",
            &Hash(&tx.hash),
            &MaybeAddr(tx.to.as_ref()),
            &BigInt::some(&tx.value),
            &Hex(&tx.v),
            &Hex(&tx.r),
            &Hex(&tx.s),
            &Uint(tx.gas_limit),
            &BigInt::some(&gas_price),
            &Uint(tx.nonce),
            &Hex(&tx.input),
            &Hex(&access_list),
            &BigInt(tx.max_fee_per_gas.as_ref()),
            &BigInt(tx.max_priority_fee_per_gas.as_ref()),
            &Uint(u64::from(tx.tx_type)),
            &Uint(index),
        ]);
    }

    pub fn record_trx_from(&mut self, from: &Address) {
        if !self.enabled {
            return;
        }

        self.ensure_in_transaction();
        self.print(&[&"TRX_FROM", &Addr(from)]);
    }

    /// Closes the transaction scope on a transaction that could not be applied
    pub fn record_failed_transaction(&mut self, err: &dyn Display) {
        if !self.enabled {
            return;
        }

        self.ensure_in_transaction();

        firehose_debug!("failed transaction (err={})", err);

        self.print(&[&"FAILED_APPLY_TRX", err]);
        self.reset_transaction();
    }

    pub fn end_transaction(&mut self, receipt: &ReceiptData) {
        if !self.enabled {
            return;
        }

        self.ensure_in_transaction();
        self.ensure_no_open_call("ending a transaction");

        let logs = json(&receipt.logs);
        self.print(&[
            &"END_APPLY_TRX",
            &Uint(receipt.gas_used),
            &Hex(&receipt.post_state),
            &Uint(receipt.cumulative_gas_used),
            &Hex(receipt.bloom.as_slice()),
            &logs,
        ]);

        self.reset_transaction();
        firehose_debug!("transaction ended (gas_used={})", receipt.gas_used);
    }

    /// Resets the transaction state and the call state in one shot
    fn reset_transaction(&mut self) {
        self.in_transaction = false;
        self.call_stack.reset();
    }

    /// Starts `tx` in the speculative `tx_ctx`, inside this context's current block.
    ///
    /// `tx_ctx` numbers its logs from where this block is at. When this context records
    /// nothing (miner only nodes), the transaction gets a block scope of its own.
    pub fn start_speculative_transaction(
        &self,
        tx_ctx: &mut Context<BufferPrinter>,
        tx: &TransactionData,
        index: u64,
        base_fee: Option<U256>,
    ) {
        if self.enabled {
            self.ensure_in_block();
        }

        if tx_ctx.enabled {
            tx_ctx.enter_block_scope(self.block_number, self.log_index_in_block);
        }
        tx_ctx.start_transaction(tx, index, base_fee);
    }

    /// Appends everything `tx_ctx` buffered to this context's sink as one write, then resets
    /// `tx_ctx`'s buffer so it can record the next transaction.
    ///
    /// The logs `tx_ctx` recorded now count in this block's log numbering.
    pub fn flush_transaction(&mut self, tx_ctx: &mut Context<BufferPrinter>) {
        if !self.enabled {
            tx_ctx.reset_block();
            return;
        }

        self.ensure_in_block();
        if tx_ctx.in_transaction {
            tx_ctx.panic_invalid_state("flushing a transaction that has not ended, this is a bug");
        }
        if tx_ctx.in_block && tx_ctx.block_number != self.block_number {
            tx_ctx.panic_invalid_state("flushing a transaction recorded for another block, this is a bug");
        }

        firehose_debug!("flushing transaction ({} bytes)", tx_ctx.printer.buffer().len());

        self.printer.write(tx_ctx.printer.buffer().as_bytes());
        if tx_ctx.in_block {
            self.log_index_in_block = tx_ctx.log_index_in_block;
        }

        tx_ctx.printer.reset();
        tx_ctx.reset_block();
    }

    /// Appends a block recorded by a buffered `block_ctx` to this context's sink as one write.
    /// The block must have ended (or been canceled) in `block_ctx`.
    pub fn flush_block(&mut self, block_ctx: &mut Context<BufferPrinter>) {
        if !self.enabled {
            return;
        }

        if block_ctx.in_block {
            block_ctx.panic_invalid_state("flushing a block that has not ended, this is a bug");
        }

        firehose_debug!("flushing block ({} bytes)", block_ctx.printer.buffer().len());

        self.printer.write(block_ctx.printer.buffer().as_bytes());
        block_ctx.printer.reset();
    }

    // Call methods

    /// Opens a new call frame and returns its index, exactly one of [`Context::end_call`] or
    /// [`Context::end_failed_call`] must follow, on every code path.
    pub fn start_call(&mut self, call_type: CallType) -> u64 {
        if !self.enabled {
            return 0;
        }

        let index = self.call_stack.open();
        firehose_debug!("start call (type={} index={} depth={})", call_type, index, self.call_stack.depth());

        self.print(&[&"EVM_RUN_CALL", &call_type, &Uint(index)]);
        index
    }

    /// Must directly follow [`Context::start_call`]
    pub fn record_call_params(
        &mut self,
        call_type: CallType,
        from: &Address,
        to: &Address,
        value: Option<&U256>,
        gas_limit: u64,
        input: &[u8],
    ) {
        if !self.enabled {
            return;
        }

        self.ensure_open_call("call params");

        let index = self.call_stack.active_index();
        self.print(&[
            &"EVM_PARAM",
            &call_type,
            &Uint(index),
            &Addr(from),
            &Addr(to),
            &BigInt(value),
            &Uint(gas_limit),
            &Hex(input),
        ]);
    }

    pub fn record_call_without_code(&mut self) {
        if !self.enabled {
            return;
        }

        self.ensure_open_call("a call without code");

        let index = self.call_stack.active_index();
        self.print(&[&"ACCOUNT_WITHOUT_CODE", &Uint(index)]);
    }

    pub fn record_call_failed(&mut self, gas_left: u64, reason: &str) {
        if !self.enabled {
            return;
        }

        self.ensure_open_call("a call failure");

        let index = self.call_stack.active_index();
        self.print(&[&"EVM_CALL_FAILED", &Uint(index), &Uint(gas_left), &reason]);
    }

    pub fn record_call_reverted(&mut self) {
        if !self.enabled {
            return;
        }

        self.ensure_open_call("a call revert");

        let index = self.call_stack.active_index();
        self.print(&[&"EVM_REVERTED", &Uint(index)]);
    }

    /// Closes the active call frame successfully
    pub fn end_call(&mut self, gas_left: u64, return_value: &[u8]) {
        if !self.enabled {
            return;
        }

        let index = self.close_call();
        firehose_debug!("end call (index={} gas_left={})", index, gas_left);

        self.print(&[&"EVM_END_CALL", &Uint(index), &Uint(gas_left), &Hex(return_value)]);
    }

    /// Closes the active call frame as failed.
    ///
    /// A revert hands `gas_left` back to the caller. Any other failure is an assertion-style
    /// failure burning all of `gas_left`, the frame then ends with no gas left. Consumers rely
    /// on this difference for gas accounting.
    pub fn end_failed_call(&mut self, gas_left: u64, is_revert: bool, reason: &str) {
        if !self.enabled {
            return;
        }

        self.record_call_failed(gas_left, reason);

        if is_revert {
            self.record_call_reverted();
            self.end_call(gas_left, &[]);
        } else {
            self.record_gas_consume(gas_left, gas_left, GasChangeReason::FailedExecution);
            self.end_call(0, &[]);
        }
    }

    fn close_call(&mut self) -> u64 {
        match self.call_stack.close() {
            Ok(index) => index,
            Err(err) => self.panic_invalid_state(&format!("ending call failed: {err}")),
        }
    }

    // State change methods

    pub fn record_gas_consume(&mut self, gas_old: u64, gas_consumed: u64, reason: GasChangeReason) {
        if !self.enabled || reason.is_ignored() || gas_consumed == 0 {
            return;
        }

        let Some(gas_new) = gas_old.checked_sub(gas_consumed) else {
            self.panic_invalid_state(&format!(
                "consuming {gas_consumed} gas out of {gas_old} available ({reason})"
            ));
        };

        firehose_trace!("gas consume (old={} new={} reason={})", gas_old, gas_new, reason);

        let index = self.call_stack.active_index();
        self.print(&[&"GAS_CHANGE", &Uint(index), &Uint(gas_old), &Uint(gas_new), &reason]);
    }

    pub fn record_gas_refund(&mut self, gas_old: u64, gas_refund: u64) {
        if !self.enabled || gas_refund == 0 {
            return;
        }

        let index = self.call_stack.active_index();
        self.print(&[
            &"GAS_CHANGE",
            &Uint(index),
            &Uint(gas_old),
            &Uint(gas_old.saturating_add(gas_refund)),
            &GasChangeReason::RefundAfterExecution,
        ]);
    }

    pub fn record_balance_change(
        &mut self,
        address: &Address,
        old_balance: &U256,
        new_balance: &U256,
        reason: BalanceChangeReason,
    ) {
        if !self.enabled || reason.is_ignored() {
            return;
        }

        firehose_trace!(
            "balance change (address={} old={} new={} reason={})",
            HexView(address),
            old_balance,
            new_balance,
            reason
        );

        let index = self.call_stack.active_index();
        self.print(&[
            &"BALANCE_CHANGE",
            &Uint(index),
            &Addr(address),
            &BigInt::some(old_balance),
            &BigInt::some(new_balance),
            &reason,
        ]);
    }

    pub fn record_nonce_change(&mut self, address: &Address, old_nonce: u64, new_nonce: u64) {
        if !self.enabled {
            return;
        }

        let index = self.call_stack.active_index();
        self.print(&[
            &"NONCE_CHANGE",
            &Uint(index),
            &Addr(address),
            &Uint(old_nonce),
            &Uint(new_nonce),
        ]);
    }

    /// `old_code_hash` is absent for accounts that never had code
    pub fn record_code_change(
        &mut self,
        address: &Address,
        old_code_hash: Option<&B256>,
        old_code: &[u8],
        new_code_hash: &B256,
        new_code: &[u8],
    ) {
        if !self.enabled {
            return;
        }

        let old_code_hash = old_code_hash.map(|hash| hash.as_slice()).unwrap_or_default();
        let index = self.call_stack.active_index();
        self.print(&[
            &"CODE_CHANGE",
            &Uint(index),
            &Addr(address),
            &Hex(old_code_hash),
            &Hex(old_code),
            &Hash(new_code_hash),
            &Hex(new_code),
        ]);
    }

    pub fn record_storage_change(&mut self, address: &Address, key: &B256, old_value: &B256, new_value: &B256) {
        if !self.enabled {
            return;
        }

        let index = self.call_stack.active_index();
        self.print(&[
            &"STORAGE_CHANGE",
            &Uint(index),
            &Addr(address),
            &Hash(key),
            &Hash(old_value),
            &Hash(new_value),
        ]);
    }

    pub fn record_new_account(&mut self, address: &Address) {
        if !self.enabled {
            return;
        }

        let index = self.call_stack.active_index();
        self.print(&[&"CREATED_ACCOUNT", &Uint(index), &Addr(address)]);
    }

    pub fn record_suicide(&mut self, address: &Address, suicided: bool, balance_before: &U256) {
        if !self.enabled {
            return;
        }

        let index = self.call_stack.active_index();
        self.print(&[
            &"SUICIDE_CHANGE",
            &Uint(index),
            &Addr(address),
            &Bool(suicided),
            &BigInt::some(balance_before),
        ]);
    }

    pub fn record_keccak(&mut self, hash: &B256, preimage: &[u8]) {
        if !self.enabled {
            return;
        }

        firehose_trace_full!("keccak (hash={} preimage_len={})", HexView(hash), preimage.len());

        let index = self.call_stack.active_index();
        self.print(&[&"EVM_KECCAK", &Uint(index), &Hash(hash), &Hex(preimage)]);
    }

    /// Records a log, logs are numbered across the whole block
    pub fn record_log(&mut self, log: &LogData) {
        if !self.enabled {
            return;
        }

        let index = self.call_stack.active_index();
        let log_index = self.log_index_in_block;
        self.log_index_in_block += 1;

        self.print(&[
            &"ADD_LOG",
            &Uint(index),
            &Uint(log_index),
            &Addr(&log.address),
            &HashList(&log.topics),
            &Hex(&log.data),
        ]);
    }
}

impl Context<BufferPrinter> {
    /// Creates a transaction scoped context recording into `buffer`, reset first.
    ///
    /// Reuse the same context for every transaction of a block: the canonical context's
    /// [`Context::flush_transaction`] empties it after each completed transaction.
    pub fn speculative(buffer: ReusableBuffer) -> Self {
        Self::new(BufferPrinter::new(buffer))
    }

    /// Drops the transaction being recorded, none of its bytes ever reach the canonical sink
    /// and its logs are not counted in the block
    pub fn abandon_transaction(&mut self) {
        firehose_debug!("abandoning transaction ({} bytes discarded)", self.printer.buffer().len());

        self.reset_transaction();
        self.reset_block();
        self.printer.reset();
    }

    fn enter_block_scope(&mut self, block_number: Option<u64>, log_index_in_block: u64) {
        if self.in_block {
            self.panic_invalid_state(
                "starting a speculative transaction before the previous one was flushed or abandoned, this is a bug",
            );
        }

        self.in_block = true;
        self.block_number = block_number;
        self.log_index_in_block = log_index_in_block;
    }

    /// Gives back the buffer for reuse by the next block
    pub fn into_buffer(self) -> ReusableBuffer {
        self.printer.into_buffer()
    }
}
