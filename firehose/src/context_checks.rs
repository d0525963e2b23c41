use super::{Context, printer::Printer};

/// Lifecycle state assertions.
///
/// A violated assertion means the host called the instrumentation out of order and the
/// emitted trace can no longer be a valid nesting, so all of them abort.
impl<P: Printer> Context<P> {
    /// Ensure that we are currently in a block processing state
    #[inline]
    pub(super) fn ensure_in_block(&self) {
        if !self.in_block {
            self.panic_invalid_state(
                "caller expected to be in block state but we were not, this is a bug",
            );
        }
    }

    /// Ensure that we are NOT currently in a block processing state
    #[inline]
    pub(super) fn ensure_not_in_block(&self) {
        if self.in_block {
            self.panic_invalid_state(
                "caller expected to not be in block state but we were, this is a bug",
            );
        }
    }

    /// Ensure that we are currently in a transaction processing state
    #[inline]
    pub(super) fn ensure_in_transaction(&self) {
        if !self.in_transaction {
            self.panic_invalid_state(
                "caller expected to be in transaction state but we were not, this is a bug",
            );
        }
    }

    /// Ensure that we are NOT currently in a transaction processing state
    #[inline]
    pub(super) fn ensure_not_in_transaction(&self) {
        if self.in_transaction {
            self.panic_invalid_state(
                "caller expected to not be in transaction state but we were, this is a bug",
            );
        }
    }

    /// Ensure no call is left open at a block or transaction boundary
    #[inline]
    pub(super) fn ensure_no_open_call(&self, boundary: &str) {
        if !self.call_stack.is_empty() {
            self.panic_invalid_state(&format!(
                "{} call(s) still open when {boundary}, every started call must be ended first",
                self.call_stack.depth()
            ));
        }
    }

    /// Ensure a call is open for an event annotating the active call
    #[inline]
    pub(super) fn ensure_open_call(&self, event: &str) {
        if self.call_stack.is_empty() {
            self.panic_invalid_state(&format!(
                "no call open when recording {event}, the call must be started first"
            ));
        }
    }

    /// Panic with invalid state message, enriched with the current block and state flags
    pub(super) fn panic_invalid_state(&self, msg: &str) -> ! {
        let mut enhanced_msg = msg.to_string();

        if let Some(number) = self.block_number {
            enhanced_msg.push_str(&format!(" at block #{number}"));
        }

        enhanced_msg.push_str(&format!(
            " (enabled={}, in_block={}, in_transaction={}, call_depth={})",
            self.enabled,
            self.in_block,
            self.in_transaction,
            self.call_stack.depth()
        ));

        panic!("Firehose invalid state: {}", enhanced_msg);
    }
}
