// bcli/src/parse.rs

//! Turning raw `bitcoin-cli` stdout into typed results.
//!
//! Every function here operates on output that already exited zero -
//! a non-zero exit is exclusively how "no such block/output/etc"
//! is communicated, and is handled by the driver before any of this
//! runs. A mandatory field missing from an otherwise well-formed
//! response is always a bug or a version skew, never a "not found"
//! signal, and is reported as [`BcliError::Protocol`].

use wire::BlockId;

use crate::error::BcliError;

/// The result of `gettxout`: the value and scriptPubKey of a still-unspent output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub value_sat: u64,
    pub script_pubkey: Vec<u8>,
}

/// The result of `sendrawtransaction`: Core's exit status together with
/// whatever it printed, merged the same way every invocation's output is
/// captured. A non-zero exit here is not an error and is not retried -
/// it is the normal way a relay rejection reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRawTxOutcome {
    pub exit_code: i32,
    pub output: String,
}

/// Which fee-estimation regime `estimatesmartfee`'s second argument
/// selects. `Unset` lets Core pick its own default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateMode {
    Unset,
    Economical,
    Conservative,
}

impl EstimateMode {
    pub(crate) fn as_arg(&self) -> &'static str {
        match self {
            EstimateMode::Unset => "UNSET",
            EstimateMode::Economical => "ECONOMICAL",
            EstimateMode::Conservative => "CONSERVATIVE",
        }
    }
}

fn protocol(command: &str, detail: impl Into<String>) -> BcliError {
    BcliError::Protocol {
        command: command.to_string(),
        detail: detail.into(),
    }
}

fn parse_json(command: &str, output: &str) -> Result<serde_json::Value, BcliError> {
    serde_json::from_str(output.trim())
        .map_err(|e| protocol(command, format!("invalid JSON: {e}")))
}

/// `estimatesmartfee`: feerate (BTC/kvB) to sat/kw, rounding to the
/// nearest integer. A response with no `feerate` field (all Core
/// returns when it has no estimate) yields `0`, logged rather than
/// treated as an error.
pub fn process_estimatefee(command: &str, output: &str) -> Result<u64, BcliError> {
    let json = parse_json(command, output)?;
    match json.get("feerate").and_then(|v| v.as_f64()) {
        Some(feerate) => Ok((feerate * 1e8 / 4.0).round() as u64),
        None => {
            tracing::debug!(%command, "no fee estimate available, reporting 0 sat/kw");
            Ok(0)
        }
    }
}

/// `gettxout`: value (BTC) to satoshis and scriptPubKey hex to bytes.
/// Bitcoin Core prints literal `null` for a spent or missing output -
/// callers are expected to have already excluded that case via the
/// exit code/empty-output convention before reaching this parser, so
/// a `null` here is itself a protocol error.
pub fn process_gettxout(command: &str, output: &str) -> Result<TxOut, BcliError> {
    let json = parse_json(command, output)?;
    if json.is_null() {
        return Err(protocol(command, "output is null"));
    }
    let value = json
        .get("value")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| protocol(command, "missing `value` field"))?;
    let script_hex = json
        .get("scriptPubKey")
        .and_then(|v| v.get("hex"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| protocol(command, "missing `scriptPubKey.hex` field"))?;
    let script_pubkey =
        hex::decode(script_hex).map_err(|e| protocol(command, format!("bad scriptPubKey hex: {e}")))?;

    Ok(TxOut {
        value_sat: (value * 1e8).round() as u64,
        script_pubkey,
    })
}

/// `getblock <hash> 1`: the raw hex of the transaction at `index` in
/// the block's `tx` array. An out-of-range index means the block has
/// fewer transactions than asked for, and is not an error - it yields
/// `Ok(None)`. An in-range entry that isn't a well-formed hex string is
/// a protocol error.
pub fn process_getblock_tx(
    command: &str,
    output: &str,
    index: usize,
) -> Result<Option<String>, BcliError> {
    let json = parse_json(command, output)?;
    let txs = json
        .get("tx")
        .and_then(|v| v.as_array())
        .ok_or_else(|| protocol(command, "missing `tx` array"))?;

    let Some(entry) = txs.get(index) else {
        return Ok(None);
    };
    let txid = entry
        .as_str()
        .ok_or_else(|| protocol(command, format!("`tx[{index}]` is not a string")))?;
    Ok(Some(txid.to_string()))
}

/// `getblockhash <height>`: the trimmed hex string Core prints.
/// Displayed block hashes are byte-reversed relative to the digest's
/// internal order, the same convention `bitcoin::BlockHash`'s `Display`
/// follows, so the bytes are reversed back before storing.
pub fn process_getblockhash(command: &str, output: &str) -> Result<BlockId, BcliError> {
    let trimmed = output.trim();
    let mut bytes = hex::decode(trimmed).map_err(|e| protocol(command, format!("bad hash hex: {e}")))?;
    if bytes.len() != 32 {
        return Err(protocol(
            command,
            format!("hash is {} bytes, expected 32", bytes.len()),
        ));
    }
    bytes.reverse();
    let array: [u8; 32] = bytes.try_into().expect("checked length above");
    Ok(BlockId::from_bytes(array))
}

/// `getblockcount`: the trimmed decimal height Core prints.
pub fn process_getblockcount(command: &str, output: &str) -> Result<u32, BcliError> {
    output
        .trim()
        .parse::<u32>()
        .map_err(|e| protocol(command, format!("not a valid height: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimatefee_converts_btc_per_kvb_to_sat_per_kw() {
        let out = process_estimatefee("estimatesmartfee", r#"{"feerate": 0.00001000, "blocks": 6}"#).unwrap();
        assert_eq!(out, 250);
    }

    #[test]
    fn estimatefee_with_no_estimate_is_zero() {
        let out = process_estimatefee("estimatesmartfee", r#"{"errors": ["insufficient data"]}"#).unwrap();
        assert_eq!(out, 0);
    }

    #[test]
    fn gettxout_converts_value_and_decodes_script() {
        let out = process_gettxout(
            "gettxout",
            r#"{"value": 0.00001234, "scriptPubKey": {"hex": "76a914"}}"#,
        )
        .unwrap();
        assert_eq!(out.value_sat, 1234);
        assert_eq!(out.script_pubkey, vec![0x76, 0xa9, 0x14]);
    }

    #[test]
    fn gettxout_null_is_protocol_error() {
        let err = process_gettxout("gettxout", "null").unwrap_err();
        assert!(matches!(err, BcliError::Protocol { .. }));
    }

    #[test]
    fn getblock_tx_out_of_range_index_is_none() {
        let out = process_getblock_tx("getblock", r#"{"tx": ["aa", "bb"]}"#, 5).unwrap();
        assert_eq!(out, None);
    }

    #[test]
    fn getblock_tx_in_range_index_is_some() {
        let out = process_getblock_tx("getblock", r#"{"tx": ["aa", "bb"]}"#, 1).unwrap();
        assert_eq!(out, Some("bb".to_string()));
    }

    #[test]
    fn getblockhash_round_trips_reversed_bytes() {
        let hex_str = "00".repeat(31) + "01";
        let id = process_getblockhash("getblockhash", &hex_str).unwrap();
        assert_eq!(id.as_bytes()[0], 0x01);
    }

    #[test]
    fn getblockcount_parses_trimmed_height() {
        let count = process_getblockcount("getblockcount", "814213\n").unwrap();
        assert_eq!(count, 814213);
    }
}
