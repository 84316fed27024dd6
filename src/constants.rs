/// Indexing-wide constants.
///
/// Magic numbers that recur across the script classifier, money
/// conversion, and reorg controller live here instead of being repeated
/// at each call site.

use rust_decimal::Decimal;

/// Genesis block height (the first block in the chain).
pub const HEIGHT_GENESIS: i32 = 0;

/// `nValue` is integer satoshis; an amount is `nValue / SATOSHIS_PER_COIN`
/// with exact decimal precision (spec §3, §9 "exact decimal money").
pub const SATOSHIS_PER_COIN: i64 = 100_000_000;

/// Converts integer satoshis (the RPC's `nValue`) into the exact decimal
/// coin amount (spec §3, §9 "exact decimal money"). The scale is derived
/// from `SATOSHIS_PER_COIN` rather than a bare `8` at each call site.
pub fn satoshis_to_decimal(satoshis: i64) -> Decimal {
    Decimal::new(satoshis, SATOSHIS_PER_COIN.ilog10())
}

/// Default reorg lookback horizon in blocks (spec §4.7, §9 Open Questions —
/// hard-coded in the source, exposed as `reorg_horizon` in config here).
pub const DEFAULT_REORG_HORIZON: i32 = 150;

/// Element-sequence length of a standard p2pkh scriptPubKey
/// (`OP_DUP OP_HASH160 <20B> OP_EQUALVERIFY OP_CHECKSIG`).
pub const P2PKH_SCRIPT_ELEMENTS: usize = 5;

/// Element-sequence length of a standard p2sh scriptPubKey
/// (`OP_HASH160 <20B> OP_EQUAL`).
pub const P2SH_SCRIPT_ELEMENTS: usize = 3;

/// Element-sequence length of a standard p2pk scriptPubKey
/// (`<pubkey> OP_CHECKSIG`).
pub const P2PK_SCRIPT_ELEMENTS: usize = 2;

/// HASH160 (SHA256 then RIPEMD160) output width in bytes.
pub const HASH160_LEN: usize = 20;

/// Moving-average window for the supervisor's per-block ETA estimator
/// (spec §4.9: "a moving window (1,000 samples)").
pub const BLOCK_TIME_WINDOW: usize = 1_000;

/// Bounded queue capacity for the fetch pipeline (spec §4.6: "e.g. 500-1000").
pub const FETCH_QUEUE_CAPACITY: usize = 750;

#[inline]
pub fn is_genesis_height(height: i32) -> bool {
    height == HEIGHT_GENESIS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_genesis() {
        assert_eq!(HEIGHT_GENESIS, 0);
        assert!(is_genesis_height(0));
        assert!(!is_genesis_height(1));
    }

    #[test]
    fn test_satoshis_per_coin() {
        assert_eq!(SATOSHIS_PER_COIN, 100_000_000);
    }

    #[test]
    fn satoshis_to_decimal_divides_by_one_coin() {
        assert_eq!(satoshis_to_decimal(SATOSHIS_PER_COIN), Decimal::new(1, 0));
        assert_eq!(satoshis_to_decimal(150_000_000), Decimal::new(15, 1));
    }

    #[test]
    fn test_script_element_lengths_are_distinct() {
        let lens = [
            P2PKH_SCRIPT_ELEMENTS,
            P2SH_SCRIPT_ELEMENTS,
            P2PK_SCRIPT_ELEMENTS,
        ];
        for (i, a) in lens.iter().enumerate() {
            for (j, b) in lens.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }
}
