//! Privacy group id derivation for `privateFor` transactions.
//!
//! The id a node assigns to an implicit group is the base64 of
//! `keccak256(rlp([member, ...]))`. Members are the sender's enclave key plus
//! every recipient, deduplicated and ordered by their Java array hash so the
//! id is independent of the order recipients were listed in.

use alloy_primitives::{
    Bytes,
    keccak256,
};
use alloy_rlp::Encodable;
use base64::{
    Engine as _,
    engine::general_purpose::STANDARD,
};

/// Base64 privacy group id for `private_from` plus `private_for`.
pub fn privacy_group_id(private_from: &[u8], private_for: &[Bytes]) -> String {
    let mut members: Vec<Bytes> = Vec::with_capacity(private_for.len() + 1);
    for key in std::iter::once(private_from).chain(private_for.iter().map(|key| &key[..])) {
        if !members.iter().any(|member| &member[..] == key) {
            members.push(Bytes::copy_from_slice(key));
        }
    }
    // Stable, so equal hashes keep insertion order.
    members.sort_by_key(|member| java_array_hash(member));

    let mut encoded: Vec<u8> = Vec::new();
    members.encode(&mut encoded);
    STANDARD.encode(keccak256(&encoded))
}

/// `java.util.Arrays.hashCode(byte[])`: signed bytes, wrapping `i32` arithmetic.
fn java_array_hash(bytes: &[u8]) -> i32 {
    bytes.iter().fold(1i32, |hash, &byte| {
        hash.wrapping_mul(31).wrapping_add(i32::from(byte as i8))
    })
}
