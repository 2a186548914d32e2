//! Serialized type codes and field identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Serialized type codes of the ledger's binary format.
pub mod sti {
    pub const UINT16: u16 = 1;
    pub const UINT32: u16 = 2;
    pub const UINT64: u16 = 3;
    pub const UINT128: u16 = 4;
    pub const UINT256: u16 = 5;
    pub const AMOUNT: u16 = 6;
    pub const VL: u16 = 7;
    pub const ACCOUNT: u16 = 8;
    pub const OBJECT: u16 = 14;
    pub const ARRAY: u16 = 15;
    pub const UINT8: u16 = 16;
    pub const UINT160: u16 = 17;
    pub const PATHSET: u16 = 18;
    pub const VECTOR256: u16 = 19;
}

pub const OBJECT_END: u8 = 0xE1;
pub const ARRAY_END: u8 = 0xF1;

/// A (type, field) pair. Ordering follows the canonical field order of the
/// binary format, which is also the ordering of [`FieldCode::id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldCode {
    pub type_code: u16,
    pub field: u16,
}

impl FieldCode {
    pub const fn new(type_code: u16, field: u16) -> Self {
        Self { type_code, field }
    }

    /// The guest ABI encoding: `type << 16 | field`.
    pub const fn id(self) -> u32 {
        ((self.type_code as u32) << 16) | self.field as u32
    }

    pub const fn from_id(id: u32) -> Self {
        Self {
            type_code: (id >> 16) as u16,
            field: (id & 0xFFFF) as u16,
        }
    }

    /// Append the nibble-packed header for this field.
    pub fn write_header(self, out: &mut Vec<u8>) {
        let (t, f) = (self.type_code, self.field);
        match (t < 16, f < 16) {
            (true, true) => out.push(((t as u8) << 4) | f as u8),
            (true, false) => {
                out.push((t as u8) << 4);
                out.push(f as u8);
            }
            (false, true) => {
                out.push(f as u8);
                out.push(t as u8);
            }
            (false, false) => {
                out.push(0);
                out.push(t as u8);
                out.push(f as u8);
            }
        }
    }

    pub fn header(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(3);
        self.write_header(&mut out);
        out
    }

    pub fn is_known(self) -> bool {
        KNOWN_FIELDS.iter().any(|(_, code)| *code == self)
    }

    pub fn name(self) -> Option<&'static str> {
        KNOWN_FIELDS
            .iter()
            .find(|(_, code)| *code == self)
            .map(|(name, _)| *name)
    }

    pub fn by_name(name: &str) -> Option<FieldCode> {
        KNOWN_FIELDS
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, code)| *code)
    }
}

impl fmt::Display for FieldCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "({}, {})", self.type_code, self.field),
        }
    }
}

/// Named fields used by the engine itself.
pub mod sf {
    use super::{sti, FieldCode};

    pub const LEDGER_ENTRY_TYPE: FieldCode = FieldCode::new(sti::UINT16, 1);
    pub const TRANSACTION_TYPE: FieldCode = FieldCode::new(sti::UINT16, 2);
    pub const FLAGS: FieldCode = FieldCode::new(sti::UINT32, 2);
    pub const SEQUENCE: FieldCode = FieldCode::new(sti::UINT32, 4);
    pub const OWNER_COUNT: FieldCode = FieldCode::new(sti::UINT32, 13);
    pub const FIRST_LEDGER_SEQUENCE: FieldCode = FieldCode::new(sti::UINT32, 26);
    pub const LAST_LEDGER_SEQUENCE: FieldCode = FieldCode::new(sti::UINT32, 27);
    pub const TICKET_SEQUENCE: FieldCode = FieldCode::new(sti::UINT32, 41);
    pub const HOOK_STATE_COUNT: FieldCode = FieldCode::new(sti::UINT32, 45);
    pub const EMIT_GENERATION: FieldCode = FieldCode::new(sti::UINT32, 46);
    pub const EMIT_BURDEN: FieldCode = FieldCode::new(sti::UINT64, 13);
    pub const TRANSACTION_HASH: FieldCode = FieldCode::new(sti::UINT256, 3);
    pub const ACCOUNT_TXN_ID: FieldCode = FieldCode::new(sti::UINT256, 9);
    pub const EMIT_PARENT_TXN_ID: FieldCode = FieldCode::new(sti::UINT256, 11);
    pub const EMIT_NONCE: FieldCode = FieldCode::new(sti::UINT256, 12);
    pub const EMIT_HOOK_HASH: FieldCode = FieldCode::new(sti::UINT256, 13);
    pub const HOOK_HASH: FieldCode = FieldCode::new(sti::UINT256, 31);
    pub const HOOK_NAMESPACE: FieldCode = FieldCode::new(sti::UINT256, 32);
    pub const AMOUNT: FieldCode = FieldCode::new(sti::AMOUNT, 1);
    pub const BALANCE: FieldCode = FieldCode::new(sti::AMOUNT, 2);
    pub const FEE: FieldCode = FieldCode::new(sti::AMOUNT, 8);
    pub const SIGNING_PUB_KEY: FieldCode = FieldCode::new(sti::VL, 3);
    pub const TXN_SIGNATURE: FieldCode = FieldCode::new(sti::VL, 4);
    pub const HOOK_PARAMETER_NAME: FieldCode = FieldCode::new(sti::VL, 24);
    pub const HOOK_PARAMETER_VALUE: FieldCode = FieldCode::new(sti::VL, 25);
    pub const ACCOUNT: FieldCode = FieldCode::new(sti::ACCOUNT, 1);
    pub const DESTINATION: FieldCode = FieldCode::new(sti::ACCOUNT, 3);
    pub const AUTHORIZE: FieldCode = FieldCode::new(sti::ACCOUNT, 5);
    pub const EMIT_CALLBACK: FieldCode = FieldCode::new(sti::ACCOUNT, 10);
    pub const MEMO: FieldCode = FieldCode::new(sti::OBJECT, 10);
    pub const EMIT_DETAILS: FieldCode = FieldCode::new(sti::OBJECT, 13);
    pub const HOOK: FieldCode = FieldCode::new(sti::OBJECT, 14);
    pub const HOOK_PARAMETER: FieldCode = FieldCode::new(sti::OBJECT, 23);
    pub const HOOK_GRANT: FieldCode = FieldCode::new(sti::OBJECT, 24);
    pub const SIGNERS: FieldCode = FieldCode::new(sti::ARRAY, 3);
    pub const MEMOS: FieldCode = FieldCode::new(sti::ARRAY, 9);
    pub const HOOKS: FieldCode = FieldCode::new(sti::ARRAY, 11);
    pub const HOOK_PARAMETERS: FieldCode = FieldCode::new(sti::ARRAY, 19);
    pub const HOOK_GRANTS: FieldCode = FieldCode::new(sti::ARRAY, 20);
    pub const HOOK_EXECUTIONS: FieldCode = FieldCode::new(sti::ARRAY, 18);

    pub const HOOK_STATE_CHANGE_COUNT: FieldCode = FieldCode::new(sti::UINT16, 17);
    pub const HOOK_EMIT_COUNT: FieldCode = FieldCode::new(sti::UINT16, 18);
    pub const HOOK_EXECUTION_INDEX: FieldCode = FieldCode::new(sti::UINT16, 19);
    pub const OWNER_NODE: FieldCode = FieldCode::new(sti::UINT64, 4);
    pub const HOOK_INSTRUCTION_COUNT: FieldCode = FieldCode::new(sti::UINT64, 17);
    pub const HOOK_RETURN_CODE: FieldCode = FieldCode::new(sti::UINT64, 18);
    pub const HOOK_STATE_KEY: FieldCode = FieldCode::new(sti::UINT256, 30);
    pub const CREATE_CODE: FieldCode = FieldCode::new(sti::VL, 11);
    pub const HOOK_STATE_DATA: FieldCode = FieldCode::new(sti::VL, 22);
    pub const HOOK_RETURN_STRING: FieldCode = FieldCode::new(sti::VL, 23);
    pub const HOOK_ACCOUNT: FieldCode = FieldCode::new(sti::ACCOUNT, 16);
    pub const EMITTED_TXN: FieldCode = FieldCode::new(sti::OBJECT, 20);
    pub const HOOK_EXECUTION: FieldCode = FieldCode::new(sti::OBJECT, 21);
    pub const HOOK_RESULT: FieldCode = FieldCode::new(sti::UINT8, 18);
    pub const HOOK_NAMESPACES: FieldCode = FieldCode::new(sti::VECTOR256, 5);
}

/// Fields the engine recognises by name. `slot_subfield` rejects anything
/// outside this table with `INVALID_FIELD`.
pub static KNOWN_FIELDS: &[(&str, FieldCode)] = &[
    // UINT16
    ("LedgerEntryType", FieldCode::new(sti::UINT16, 1)),
    ("TransactionType", FieldCode::new(sti::UINT16, 2)),
    ("SignerWeight", FieldCode::new(sti::UINT16, 3)),
    ("TransferFee", FieldCode::new(sti::UINT16, 4)),
    ("Version", FieldCode::new(sti::UINT16, 16)),
    ("HookStateChangeCount", FieldCode::new(sti::UINT16, 17)),
    ("HookEmitCount", FieldCode::new(sti::UINT16, 18)),
    ("HookExecutionIndex", FieldCode::new(sti::UINT16, 19)),
    ("HookApiVersion", FieldCode::new(sti::UINT16, 20)),
    // UINT32
    ("NetworkID", FieldCode::new(sti::UINT32, 1)),
    ("Flags", FieldCode::new(sti::UINT32, 2)),
    ("SourceTag", FieldCode::new(sti::UINT32, 3)),
    ("Sequence", FieldCode::new(sti::UINT32, 4)),
    ("PreviousTxnLgrSeq", FieldCode::new(sti::UINT32, 5)),
    ("LedgerSequence", FieldCode::new(sti::UINT32, 6)),
    ("CloseTime", FieldCode::new(sti::UINT32, 7)),
    ("ParentCloseTime", FieldCode::new(sti::UINT32, 8)),
    ("SigningTime", FieldCode::new(sti::UINT32, 9)),
    ("Expiration", FieldCode::new(sti::UINT32, 10)),
    ("TransferRate", FieldCode::new(sti::UINT32, 11)),
    ("OwnerCount", FieldCode::new(sti::UINT32, 13)),
    ("DestinationTag", FieldCode::new(sti::UINT32, 14)),
    ("OfferSequence", FieldCode::new(sti::UINT32, 25)),
    ("FirstLedgerSequence", FieldCode::new(sti::UINT32, 26)),
    ("LastLedgerSequence", FieldCode::new(sti::UINT32, 27)),
    ("TransactionIndex", FieldCode::new(sti::UINT32, 28)),
    ("SetFlag", FieldCode::new(sti::UINT32, 33)),
    ("ClearFlag", FieldCode::new(sti::UINT32, 34)),
    ("SignerQuorum", FieldCode::new(sti::UINT32, 35)),
    ("CancelAfter", FieldCode::new(sti::UINT32, 36)),
    ("FinishAfter", FieldCode::new(sti::UINT32, 37)),
    ("TicketSequence", FieldCode::new(sti::UINT32, 41)),
    ("HookStateCount", FieldCode::new(sti::UINT32, 45)),
    ("EmitGeneration", FieldCode::new(sti::UINT32, 46)),
    // UINT64
    ("IndexNext", FieldCode::new(sti::UINT64, 1)),
    ("IndexPrevious", FieldCode::new(sti::UINT64, 2)),
    ("OwnerNode", FieldCode::new(sti::UINT64, 4)),
    ("BaseFee", FieldCode::new(sti::UINT64, 5)),
    ("EmitBurden", FieldCode::new(sti::UINT64, 13)),
    ("HookOn", FieldCode::new(sti::UINT64, 16)),
    ("HookInstructionCount", FieldCode::new(sti::UINT64, 17)),
    ("HookReturnCode", FieldCode::new(sti::UINT64, 18)),
    ("ReferenceCount", FieldCode::new(sti::UINT64, 19)),
    // UINT128
    ("EmailHash", FieldCode::new(sti::UINT128, 1)),
    // UINT256
    ("LedgerHash", FieldCode::new(sti::UINT256, 1)),
    ("ParentHash", FieldCode::new(sti::UINT256, 2)),
    ("TransactionHash", FieldCode::new(sti::UINT256, 3)),
    ("AccountHash", FieldCode::new(sti::UINT256, 4)),
    ("PreviousTxnID", FieldCode::new(sti::UINT256, 5)),
    ("LedgerIndex", FieldCode::new(sti::UINT256, 6)),
    ("RootIndex", FieldCode::new(sti::UINT256, 8)),
    ("AccountTxnID", FieldCode::new(sti::UINT256, 9)),
    ("EmitParentTxnID", FieldCode::new(sti::UINT256, 11)),
    ("EmitNonce", FieldCode::new(sti::UINT256, 12)),
    ("EmitHookHash", FieldCode::new(sti::UINT256, 13)),
    ("BookDirectory", FieldCode::new(sti::UINT256, 16)),
    ("InvoiceID", FieldCode::new(sti::UINT256, 17)),
    ("Amendment", FieldCode::new(sti::UINT256, 19)),
    ("Digest", FieldCode::new(sti::UINT256, 21)),
    ("Channel", FieldCode::new(sti::UINT256, 22)),
    ("CheckID", FieldCode::new(sti::UINT256, 24)),
    ("HookStateKey", FieldCode::new(sti::UINT256, 30)),
    ("HookHash", FieldCode::new(sti::UINT256, 31)),
    ("HookNamespace", FieldCode::new(sti::UINT256, 32)),
    ("HookSetTxnID", FieldCode::new(sti::UINT256, 33)),
    // AMOUNT
    ("Amount", FieldCode::new(sti::AMOUNT, 1)),
    ("Balance", FieldCode::new(sti::AMOUNT, 2)),
    ("LimitAmount", FieldCode::new(sti::AMOUNT, 3)),
    ("TakerPays", FieldCode::new(sti::AMOUNT, 4)),
    ("TakerGets", FieldCode::new(sti::AMOUNT, 5)),
    ("LowLimit", FieldCode::new(sti::AMOUNT, 6)),
    ("HighLimit", FieldCode::new(sti::AMOUNT, 7)),
    ("Fee", FieldCode::new(sti::AMOUNT, 8)),
    ("SendMax", FieldCode::new(sti::AMOUNT, 9)),
    ("DeliverMin", FieldCode::new(sti::AMOUNT, 10)),
    ("DeliveredAmount", FieldCode::new(sti::AMOUNT, 18)),
    // VL
    ("PublicKey", FieldCode::new(sti::VL, 1)),
    ("MessageKey", FieldCode::new(sti::VL, 2)),
    ("SigningPubKey", FieldCode::new(sti::VL, 3)),
    ("TxnSignature", FieldCode::new(sti::VL, 4)),
    ("URI", FieldCode::new(sti::VL, 5)),
    ("Signature", FieldCode::new(sti::VL, 6)),
    ("Domain", FieldCode::new(sti::VL, 7)),
    ("CreateCode", FieldCode::new(sti::VL, 11)),
    ("MemoType", FieldCode::new(sti::VL, 12)),
    ("MemoData", FieldCode::new(sti::VL, 13)),
    ("MemoFormat", FieldCode::new(sti::VL, 14)),
    ("Fulfillment", FieldCode::new(sti::VL, 16)),
    ("Condition", FieldCode::new(sti::VL, 17)),
    ("HookStateData", FieldCode::new(sti::VL, 22)),
    ("HookReturnString", FieldCode::new(sti::VL, 23)),
    ("HookParameterName", FieldCode::new(sti::VL, 24)),
    ("HookParameterValue", FieldCode::new(sti::VL, 25)),
    ("Blob", FieldCode::new(sti::VL, 26)),
    // ACCOUNT
    ("Account", FieldCode::new(sti::ACCOUNT, 1)),
    ("Owner", FieldCode::new(sti::ACCOUNT, 2)),
    ("Destination", FieldCode::new(sti::ACCOUNT, 3)),
    ("Issuer", FieldCode::new(sti::ACCOUNT, 4)),
    ("Authorize", FieldCode::new(sti::ACCOUNT, 5)),
    ("Unauthorize", FieldCode::new(sti::ACCOUNT, 6)),
    ("RegularKey", FieldCode::new(sti::ACCOUNT, 8)),
    ("EmitCallback", FieldCode::new(sti::ACCOUNT, 10)),
    ("HookAccount", FieldCode::new(sti::ACCOUNT, 16)),
    // OBJECT
    ("TransactionMetaData", FieldCode::new(sti::OBJECT, 2)),
    ("CreatedNode", FieldCode::new(sti::OBJECT, 3)),
    ("DeletedNode", FieldCode::new(sti::OBJECT, 4)),
    ("ModifiedNode", FieldCode::new(sti::OBJECT, 5)),
    ("PreviousFields", FieldCode::new(sti::OBJECT, 6)),
    ("FinalFields", FieldCode::new(sti::OBJECT, 7)),
    ("NewFields", FieldCode::new(sti::OBJECT, 8)),
    ("Memo", FieldCode::new(sti::OBJECT, 10)),
    ("SignerEntry", FieldCode::new(sti::OBJECT, 11)),
    ("EmitDetails", FieldCode::new(sti::OBJECT, 13)),
    ("Hook", FieldCode::new(sti::OBJECT, 14)),
    ("Signer", FieldCode::new(sti::OBJECT, 16)),
    ("EmittedTxn", FieldCode::new(sti::OBJECT, 20)),
    ("HookExecution", FieldCode::new(sti::OBJECT, 21)),
    ("HookDefinition", FieldCode::new(sti::OBJECT, 22)),
    ("HookParameter", FieldCode::new(sti::OBJECT, 23)),
    ("HookGrant", FieldCode::new(sti::OBJECT, 24)),
    // ARRAY
    ("Signers", FieldCode::new(sti::ARRAY, 3)),
    ("SignerEntries", FieldCode::new(sti::ARRAY, 4)),
    ("AffectedNodes", FieldCode::new(sti::ARRAY, 8)),
    ("Memos", FieldCode::new(sti::ARRAY, 9)),
    ("Hooks", FieldCode::new(sti::ARRAY, 11)),
    ("HookExecutions", FieldCode::new(sti::ARRAY, 18)),
    ("HookParameters", FieldCode::new(sti::ARRAY, 19)),
    ("HookGrants", FieldCode::new(sti::ARRAY, 20)),
    // UINT8
    ("CloseResolution", FieldCode::new(sti::UINT8, 1)),
    ("Method", FieldCode::new(sti::UINT8, 2)),
    ("TransactionResult", FieldCode::new(sti::UINT8, 3)),
    ("TickSize", FieldCode::new(sti::UINT8, 16)),
    ("HookResult", FieldCode::new(sti::UINT8, 18)),
    // UINT160
    ("TakerPaysCurrency", FieldCode::new(sti::UINT160, 1)),
    ("TakerPaysIssuer", FieldCode::new(sti::UINT160, 2)),
    ("TakerGetsCurrency", FieldCode::new(sti::UINT160, 3)),
    ("TakerGetsIssuer", FieldCode::new(sti::UINT160, 4)),
    // PATHSET
    ("Paths", FieldCode::new(sti::PATHSET, 1)),
    // VECTOR256
    ("Indexes", FieldCode::new(sti::VECTOR256, 1)),
    ("Hashes", FieldCode::new(sti::VECTOR256, 2)),
    ("Amendments", FieldCode::new(sti::VECTOR256, 3)),
    ("HookNamespaces", FieldCode::new(sti::VECTOR256, 5)),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_forms() {
        assert_eq!(sf::ACCOUNT.header(), vec![0x81]);
        assert_eq!(sf::LAST_LEDGER_SEQUENCE.header(), vec![0x20, 0x1B]);
        assert_eq!(FieldCode::new(sti::UINT8, 3).header(), vec![0x03, 0x10]);
        assert_eq!(FieldCode::new(sti::UINT8, 18).header(), vec![0x00, 0x10, 0x12]);
    }

    #[test]
    fn test_id_round_trip() {
        let id = sf::EMIT_DETAILS.id();
        assert_eq!(id, 0x000E_000D);
        assert_eq!(FieldCode::from_id(id), sf::EMIT_DETAILS);
    }

    #[test]
    fn test_ordering_matches_id() {
        assert!(sf::TRANSACTION_TYPE < sf::FLAGS);
        assert!(sf::FEE < sf::SIGNING_PUB_KEY);
        assert!(sf::ACCOUNT.id() < sf::EMIT_DETAILS.id());
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(FieldCode::by_name("emitnonce"), Some(sf::EMIT_NONCE));
        assert_eq!(sf::HOOK_GRANTS.to_string(), "HookGrants");
        assert!(!FieldCode::new(2, 999).is_known());
    }
}
