use crate::{
    error::Result,
    transaction::{
        SignatureData,
        TransactionFields,
        rlp_list,
    },
};

/// A transaction submitted through `eth_sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicTransaction {
    pub fields: TransactionFields,
}

impl PublicTransaction {
    pub fn new(fields: TransactionFields) -> Self {
        Self { fields }
    }

    pub fn rlp_encode(&self, signature: Option<&SignatureData>) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        self.fields.encode_standard(signature, &mut payload)?;
        Ok(rlp_list(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::tests::fields;
    use alloy_primitives::{
        U256,
        hex,
    };

    #[test]
    fn eip155_signing_payload() {
        // Signing payload of the EIP-155 reference transaction.
        let tx = PublicTransaction::new(fields(Some(9)));
        let encoded = tx
            .rlp_encode(Some(&SignatureData::replay_protection(1)))
            .unwrap();
        assert_eq!(
            hex::encode(encoded),
            "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
        );
    }

    #[test]
    fn unsigned_payload_has_six_fields() {
        let tx = PublicTransaction::new(fields(Some(9)));
        let encoded = tx.rlp_encode(None).unwrap();
        assert_eq!(
            hex::encode(encoded),
            "e9098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080"
        );
    }

    #[test]
    fn contract_creation_encodes_empty_recipient() {
        let mut fields = fields(Some(0));
        fields.recipient = None;
        fields.value = U256::ZERO;
        fields.data = hex::decode("6060").unwrap().into();
        let encoded = PublicTransaction::new(fields).rlp_encode(None).unwrap();
        // nonce 0, gas price, gas, empty `to`, zero value, data
        assert_eq!(hex::encode(encoded), "cf808504a817c8008252088080826060");
    }
}
