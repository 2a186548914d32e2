//! Classic addresses: base58check over the ledger's own alphabet.

use super::AccountId;
use bs58::Alphabet;
use sha2::{Digest, Sha256};

const ACCOUNT_ID_PREFIX: u8 = 0x00;

fn checksum(payload: &[u8]) -> [u8; 4] {
    let once = Sha256::digest(payload);
    let twice = Sha256::digest(once);
    [twice[0], twice[1], twice[2], twice[3]]
}

/// `r...` address for a 20-byte account id.
pub fn encode_account_id(id: &AccountId) -> String {
    let mut payload = Vec::with_capacity(25);
    payload.push(ACCOUNT_ID_PREFIX);
    payload.extend_from_slice(id);
    let check = checksum(&payload);
    payload.extend_from_slice(&check);
    bs58::encode(payload)
        .with_alphabet(Alphabet::RIPPLE)
        .into_string()
}

/// Parse an `r...` address. `None` on a bad character, wrong length, wrong
/// type prefix or checksum mismatch.
pub fn decode_account_id(text: &str) -> Option<AccountId> {
    let raw = bs58::decode(text)
        .with_alphabet(Alphabet::RIPPLE)
        .into_vec()
        .ok()?;
    if raw.len() != 25 || raw[0] != ACCOUNT_ID_PREFIX {
        return None;
    }
    let (payload, check) = raw.split_at(21);
    if checksum(payload) != check {
        return None;
    }
    payload[1..].try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_account_is_well_known() {
        assert_eq!(encode_account_id(&[0; 20]), "rrrrrrrrrrrrrrrrrrrrrhoLvTp");
    }

    #[test]
    fn test_genesis_address_decodes() {
        let id = decode_account_id("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh").unwrap();
        assert_eq!(hex::encode_upper(id), "B5F762798A53D543A014CAF8B297CFF8F2F937E8");
        assert_eq!(encode_account_id(&id), "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh");
    }

    #[test]
    fn test_bad_checksum_rejected() {
        assert_eq!(decode_account_id("rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTj"), None);
        assert_eq!(decode_account_id("0OIl"), None);
        assert_eq!(decode_account_id(""), None);
    }

    #[test]
    fn test_leading_zero_bytes_keep_their_digits() {
        let mut one = [0u8; 20];
        one[19] = 1;
        let address = encode_account_id(&one);
        assert_eq!(address, "rrrrrrrrrrrrrrrrrrrrBZbvji");
        assert_eq!(decode_account_id(&address), Some(one));
        assert_eq!(decode_account_id("rrrrrrrrrrrrrrrrrrrrrhoLvTp"), Some([0; 20]));
    }

    #[test]
    fn test_wrong_version_byte_rejected() {
        let mut payload = vec![0x01];
        payload.extend_from_slice(&[0x42; 20]);
        let check = checksum(&payload);
        payload.extend_from_slice(&check);
        let text = bs58::encode(payload)
            .with_alphabet(Alphabet::RIPPLE)
            .into_string();
        assert_eq!(decode_account_id(&text), None);
    }
}
