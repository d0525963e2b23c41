//! Genesis validation report.
//!
//! When the genesis block recomputed from the Firehose genesis config does not match the one
//! stored by the node, the operator gets a field by field comparison to find the culprit.

use alloy_primitives::B256;
use std::fmt::Display;
use std::io::{self, Write};
use tracing::warn;

use crate::types::HeaderData;

const INTRODUCTION: &[&str] = &[
    "There is a mismatch between Firehose genesis block and actual chain's stored genesis block, the actual genesis",
    "block's hash field extracted from the node's database does not fit with hash of genesis block generated",
    "from Firehose determined genesis config, you might need to provide the correct 'genesis.json' file",
    "via --firehose-genesis-file",
    "",
    "Comparison of the actual Firehose recomputed genesis block <> expected node genesis block",
];

/// Writes the comparison of `actual` against `expected` to `out`, one line per header field.
///
/// Never fails, the report is informational and a broken diagnostic stream is only logged.
pub fn report_header_comparison<W: Write>(actual: &HeaderData, expected: &HeaderData, out: &mut W) {
    if let Err(err) = write_report(actual, expected, out) {
        warn!(target: "firehose", "writing genesis comparison report failed: {err}");
    }
}

/// [`report_header_comparison`] to stderr
pub fn report_header_comparison_to_stderr(actual: &HeaderData, expected: &HeaderData) {
    report_header_comparison(actual, expected, &mut io::stderr().lock());
}

fn write_report<W: Write>(actual: &HeaderData, expected: &HeaderData, out: &mut W) -> io::Result<()> {
    for line in INTRODUCTION {
        writeln!(out, "{line}")?;
    }

    compare(out, "Hash", prefixed(&actual.hash), prefixed(&expected.hash))?;
    compare(out, "Number", actual.number, expected.number)?;
    compare(out, "ParentHash", prefixed(&actual.parent_hash), prefixed(&expected.parent_hash))?;
    compare(out, "UncleHash", prefixed(&actual.uncle_hash), prefixed(&expected.uncle_hash))?;
    compare(out, "Coinbase", actual.coinbase.to_checksum(None), expected.coinbase.to_checksum(None))?;
    compare(out, "Root", prefixed(&actual.root), prefixed(&expected.root))?;
    compare(out, "TxHash", prefixed(&actual.tx_hash), prefixed(&expected.tx_hash))?;
    compare(out, "ReceiptHash", prefixed(&actual.receipt_hash), prefixed(&expected.receipt_hash))?;
    compare(out, "Bloom", hex::encode(actual.bloom.as_slice()), hex::encode(expected.bloom.as_slice()))?;
    compare(out, "Difficulty", actual.difficulty, expected.difficulty)?;
    compare(out, "GasLimit", actual.gas_limit, expected.gas_limit)?;
    compare(out, "GasUsed", actual.gas_used, expected.gas_used)?;
    compare(out, "Time", actual.time, expected.time)?;
    compare(out, "Extra", hex::encode(&actual.extra), hex::encode(&expected.extra))?;
    compare(out, "MixDigest", prefixed(&actual.mix_digest), prefixed(&expected.mix_digest))?;
    compare(out, "Nonce", actual.nonce, expected.nonce)?;

    writeln!(out)?;
    out.flush()
}

fn prefixed(hash: &B256) -> String {
    format!("0x{}", hex::encode(hash.as_slice()))
}

/// Fields are compared on their rendered form
fn compare<W: Write, T: Display>(out: &mut W, field: &str, actual: T, expected: T) -> io::Result<()> {
    let actual = actual.to_string();
    let expected = expected.to_string();
    let sign = if actual == expected { "==" } else { "!=" };

    writeln!(out, "{field} [(actual) {actual} {sign} {expected} (expected)]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};

    fn report(actual: &HeaderData, expected: &HeaderData) -> Vec<String> {
        let mut out = Vec::new();
        report_header_comparison(actual, expected, &mut out);
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn field_lines(lines: &[String]) -> Vec<&String> {
        lines.iter().filter(|line| line.contains(" [(actual) ")).collect()
    }

    fn genesis() -> HeaderData {
        HeaderData {
            hash: B256::repeat_byte(0xd4),
            gas_limit: 5000,
            difficulty: U256::from(17_179_869_184u64),
            nonce: 66,
            coinbase: Address::repeat_byte(0x12),
            ..Default::default()
        }
    }

    #[test]
    fn test_identical_headers() {
        let lines = report(&genesis(), &genesis());
        let fields = field_lines(&lines);

        assert_eq!(fields.len(), 16);
        assert!(fields.iter().all(|line| line.contains(" == ")));
        assert_eq!(lines.last().map(String::as_str), Some(""));
    }

    #[test]
    fn test_gas_used_mismatch_is_the_only_one() {
        let actual = genesis();
        let expected = HeaderData {
            gas_used: 21000,
            ..genesis()
        };

        let lines = report(&actual, &expected);
        let mismatches: Vec<_> = field_lines(&lines)
            .into_iter()
            .filter(|line| line.contains(" != "))
            .collect();

        assert_eq!(mismatches, vec!["GasUsed [(actual) 0 != 21000 (expected)]"]);
    }

    #[test]
    fn test_field_order_and_rendering() {
        let lines = report(&genesis(), &genesis());
        let names: Vec<&str> = field_lines(&lines)
            .into_iter()
            .filter_map(|line| line.split(' ').next())
            .collect();

        assert_eq!(
            names,
            vec![
                "Hash",
                "Number",
                "ParentHash",
                "UncleHash",
                "Coinbase",
                "Root",
                "TxHash",
                "ReceiptHash",
                "Bloom",
                "Difficulty",
                "GasLimit",
                "GasUsed",
                "Time",
                "Extra",
                "MixDigest",
                "Nonce",
            ]
        );

        let hash_line = format!("Hash [(actual) 0x{0} == 0x{0} (expected)]", "d4".repeat(32));
        assert!(lines.contains(&hash_line));
        assert!(lines.contains(&"Difficulty [(actual) 17179869184 == 17179869184 (expected)]".to_string()));
        assert!(lines.contains(&"Extra [(actual)  ==  (expected)]".to_string()));
    }

    #[test]
    fn test_broken_stream_does_not_fail() {
        struct Broken;

        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("closed"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        report_header_comparison(&genesis(), &genesis(), &mut Broken);
    }
}
