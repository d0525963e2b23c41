//! Change reasons explaining why a balance or gas mutation happened.
//!
//! Each reason has a stable wire string. Offline tooling extracts the reasons from this table
//! and cross-references them, so every extractable reason must be made only of lowercase
//! ASCII alphanumerics and underscores. `Ignored` reasons mark bookkeeping mutations that carry
//! no meaning, they are never printed and are deliberately left out of the extractable tables.

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} change reason {value:?}")]
pub struct UnknownReason {
    kind: &'static str,
    value: String,
}

/// Returns true when `value` follows the extractable reason lexical convention
pub fn is_extractable_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

macro_rules! change_reason {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
            /// Bookkeeping mutation that must not be recorded
            Ignored,
        }

        impl $name {
            /// Every reason that downstream tooling may extract, `Ignored` excluded
            pub const EXTRACTABLE: &'static [Self] = &[$(Self::$variant,)+];

            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::Ignored => "ignored",
                }
            }

            pub const fn is_ignored(&self) -> bool {
                matches!(self, Self::Ignored)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownReason;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    "ignored" => Ok(Self::Ignored),
                    _ => Err(UnknownReason {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

change_reason! {
    /// Reason why gas was consumed or given back during execution
    GasChangeReason, "gas" {
        Call => "call",
        CallCode => "call_code",
        CallDataCopy => "call_data_copy",
        CodeCopy => "code_copy",
        CodeStorage => "code_storage",
        ContractCreation => "contract_creation",
        ContractCreation2 => "contract_creation2",
        DelegateCall => "delegate_call",
        EventLog => "event_log",
        ExtCodeCopy => "ext_code_copy",
        /// Remaining gas burned when a call fails without reverting
        FailedExecution => "failed_execution",
        IntrinsicGas => "intrinsic_gas",
        PrecompiledContract => "precompiled_contract",
        /// Gas refunded to the caller once execution completed
        RefundAfterExecution => "refund_after_execution",
        Return => "return",
        ReturnDataCopy => "return_data_copy",
        Revert => "revert",
        SelfDestruct => "self_destruct",
        StaticCall => "static_call",
        StateColdAccess => "state_cold_access",
    }
}

change_reason! {
    /// Reason why an account balance changed
    BalanceChangeReason, "balance" {
        RewardMineUncle => "reward_mine_uncle",
        RewardMineBlock => "reward_mine_block",
        DaoRefundContract => "dao_refund_contract",
        DaoAdjustBalance => "dao_adjust_balance",
        Transfer => "transfer",
        GenesisBalance => "genesis_balance",
        GasBuy => "gas_buy",
        RewardTransactionFee => "reward_transaction_fee",
        GasRefund => "gas_refund",
        TouchAccount => "touch_account",
        SuicideRefund => "suicide_refund",
        SuicideWithdraw => "suicide_withdraw",
        Burn => "burn",
        Withdrawal => "withdrawal",
    }
}
