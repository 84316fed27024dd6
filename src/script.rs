//! Script classifier (spec §4.2) — pure, total, never fails.
//!
//! Grounded on `address.rs`'s `scriptpubkey_to_*` pattern matches, but
//! rewritten against an element sequence (opcode vs. push-data) instead of
//! raw script bytes, per `original_source/lincoln/utils.py::parse_output_sript`
//! iterating a `CScript`.

use crate::address_codec::hash160;
use crate::constants::{HASH160_LEN, P2PKH_SCRIPT_ELEMENTS, P2PK_SCRIPT_ELEMENTS, P2SH_SCRIPT_ELEMENTS};
use crate::types::{ScriptElement, ScriptType};

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUAL: u8 = 0x87;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;

pub struct Classified {
    pub script_type: ScriptType,
    /// Raw address payload (pre-version, pre-checksum). `None` iff
    /// `script_type == NonStandard`.
    pub address_payload: Option<Vec<u8>>,
}

/// Classify a decoded scriptPubKey (spec §4.2 table). Truncated or
/// otherwise malformed push-data has already collapsed to `ScriptElement`s
/// by the RPC decode step; whatever shape arrives here either matches one
/// of the three standard patterns or falls through to non-standard.
pub fn classify(elements: &[ScriptElement]) -> Classified {
    if let Some(payload) = match_p2pkh(elements) {
        return Classified { script_type: ScriptType::P2pkh, address_payload: Some(payload) };
    }
    if let Some(payload) = match_p2sh(elements) {
        return Classified { script_type: ScriptType::P2sh, address_payload: Some(payload) };
    }
    if let Some(payload) = match_p2pk(elements) {
        return Classified { script_type: ScriptType::P2pk, address_payload: Some(payload) };
    }
    Classified { script_type: ScriptType::NonStandard, address_payload: None }
}

fn match_p2pkh(elements: &[ScriptElement]) -> Option<Vec<u8>> {
    if elements.len() != P2PKH_SCRIPT_ELEMENTS {
        return None;
    }
    match (&elements[0], &elements[1], &elements[2], &elements[3], &elements[4]) {
        (
            ScriptElement::Op(OP_DUP),
            ScriptElement::Op(OP_HASH160),
            ScriptElement::Data(hash),
            ScriptElement::Op(OP_EQUALVERIFY),
            ScriptElement::Op(OP_CHECKSIG),
        ) if hash.len() == HASH160_LEN => Some(hash.clone()),
        _ => None,
    }
}

fn match_p2sh(elements: &[ScriptElement]) -> Option<Vec<u8>> {
    if elements.len() != P2SH_SCRIPT_ELEMENTS {
        return None;
    }
    match (&elements[0], &elements[1], &elements[2]) {
        (ScriptElement::Op(OP_HASH160), ScriptElement::Data(hash), ScriptElement::Op(OP_EQUAL))
            if hash.len() == HASH160_LEN =>
        {
            Some(hash.clone())
        }
        _ => None,
    }
}

fn match_p2pk(elements: &[ScriptElement]) -> Option<Vec<u8>> {
    if elements.len() != P2PK_SCRIPT_ELEMENTS {
        return None;
    }
    match (&elements[0], &elements[1]) {
        (ScriptElement::Data(pubkey), ScriptElement::Op(OP_CHECKSIG)) => Some(hash160(pubkey)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p2pkh_script(hash: Vec<u8>) -> Vec<ScriptElement> {
        vec![
            ScriptElement::Op(OP_DUP),
            ScriptElement::Op(OP_HASH160),
            ScriptElement::Data(hash),
            ScriptElement::Op(OP_EQUALVERIFY),
            ScriptElement::Op(OP_CHECKSIG),
        ]
    }

    #[test]
    fn classifies_p2pkh() {
        let c = classify(&p2pkh_script(vec![0x01; 20]));
        assert_eq!(c.script_type, ScriptType::P2pkh);
        assert_eq!(c.address_payload, Some(vec![0x01; 20]));
    }

    #[test]
    fn classifies_p2sh() {
        let elements = vec![
            ScriptElement::Op(OP_HASH160),
            ScriptElement::Data(vec![0x02; 20]),
            ScriptElement::Op(OP_EQUAL),
        ];
        let c = classify(&elements);
        assert_eq!(c.script_type, ScriptType::P2sh);
        assert_eq!(c.address_payload, Some(vec![0x02; 20]));
    }

    #[test]
    fn classifies_p2pk_by_hashing_the_pubkey() {
        let pubkey = vec![0x03; 33];
        let elements = vec![ScriptElement::Data(pubkey.clone()), ScriptElement::Op(OP_CHECKSIG)];
        let c = classify(&elements);
        assert_eq!(c.script_type, ScriptType::P2pk);
        assert_eq!(c.address_payload, Some(hash160(&pubkey)));
    }

    #[test]
    fn empty_script_is_non_standard() {
        let c = classify(&[]);
        assert_eq!(c.script_type, ScriptType::NonStandard);
        assert!(c.address_payload.is_none());
    }

    #[test]
    fn wrong_length_hash_falls_through_to_non_standard() {
        // p2pkh shape but a truncated push (P7: never throws, always lands in {0,1,2,3}).
        let c = classify(&p2pkh_script(vec![0x01; 19]));
        assert_eq!(c.script_type, ScriptType::NonStandard);
    }

    #[test]
    fn op_return_style_script_is_non_standard() {
        let c = classify(&[ScriptElement::Op(0x6a), ScriptElement::Data(vec![1, 2, 3])]);
        assert_eq!(c.script_type, ScriptType::NonStandard);
    }
}
