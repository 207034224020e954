use std::{
    fmt,
    str::FromStr,
};

use alloy_primitives::Bytes;
use alloy_rlp::Encodable;
use base64::{
    Engine as _,
    engine::general_purpose::STANDARD,
};

use crate::{
    error::Result,
    transaction::{
        SignatureData,
        TransactionFields,
        privacy,
        rlp_list,
    },
};

/// Who may see a private transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivacyTarget {
    /// Explicit recipients (`privateFor`).
    Participants(Vec<Bytes>),
    /// A pre-existing privacy group (`privacyGroupId`).
    Group(Bytes),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Restriction {
    #[default]
    Restricted,
    Unrestricted,
}

impl Restriction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Restriction::Restricted => "restricted",
            Restriction::Unrestricted => "unrestricted",
        }
    }
}

impl fmt::Display for Restriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Restriction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "restricted" => Ok(Restriction::Restricted),
            "unrestricted" => Ok(Restriction::Unrestricted),
            other => Err(format!("unknown restriction {other:?}")),
        }
    }
}

/// A privacy-group transaction submitted through `eea_sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateTransaction {
    pub fields: TransactionFields,
    pub private_from: Bytes,
    pub target: PrivacyTarget,
    pub restriction: Restriction,
}

impl PrivateTransaction {
    pub fn new(
        fields: TransactionFields,
        private_from: Bytes,
        target: PrivacyTarget,
        restriction: Restriction,
    ) -> Self {
        Self {
            fields,
            private_from,
            target,
            restriction,
        }
    }

    /// Standard fields (and signature), then `privateFrom`, `privateFor` or the
    /// group id, and `restriction`.
    pub fn rlp_encode(&self, signature: Option<&SignatureData>) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        self.fields.encode_standard(signature, &mut payload)?;

        self.private_from.encode(&mut payload);
        match &self.target {
            PrivacyTarget::Participants(participants) => participants.encode(&mut payload),
            PrivacyTarget::Group(group_id) => group_id.encode(&mut payload),
        }
        self.restriction.as_str().encode(&mut payload);

        Ok(rlp_list(payload))
    }

    /// Base64 id of the group this transaction is private to.
    pub fn privacy_group_id(&self) -> String {
        match &self.target {
            PrivacyTarget::Participants(participants) => {
                privacy::privacy_group_id(&self.private_from, participants)
            }
            PrivacyTarget::Group(group_id) => STANDARD.encode(group_id),
        }
    }
}
