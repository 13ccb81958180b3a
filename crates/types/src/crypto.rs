// Path: crates/types/src/crypto.rs

//! Digest newtypes, signing keys, signatures and addresses.
//!
//! The engine treats serialization and signature primitives as fixed external
//! contracts: canonical SCALE bytes feed `sha256`/`sha512`/`ripemd160`, block
//! and transaction signing uses Ed25519. The short (160-bit) digest used for
//! block, transaction and balance ids is `ripemd160(sha512(bytes))`.

use crate::constants::ADDRESS_PREFIX;
use ed25519_dalek::{Signer, Verifier};
use parity_scale_codec::{Decode, Encode};
use ripemd::Ripemd160;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256, Sha512};

/// A 160-bit digest. Used for block ids, transaction ids, balance ids,
/// delegate secret commitments and the chain-wide random seed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode)]
pub struct Digest160(pub [u8; 20]);

/// A 256-bit digest. Used for the chain id and the shuffle seed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode)]
pub struct Digest256(pub [u8; 32]);

impl std::fmt::Debug for Digest160 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest160({})", hex::encode(self.0))
    }
}

impl std::fmt::Display for Digest160 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Digest256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Digest256({})", hex::encode(self.0))
    }
}

impl std::fmt::Display for Digest256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// The id of a block: the 160-bit digest of its canonical signed header.
pub type BlockId = Digest160;
/// The id of a transaction: the 160-bit digest of its canonical encoding.
pub type TransactionId = Digest160;
/// The id of a balance: the 160-bit digest of its withdraw condition.
pub type BalanceId = Digest160;
/// A delegate's secret preimage or its committed hash.
pub type SecretHash = Digest160;
/// The chain id: the `sha256` of the canonical genesis configuration.
pub type ChainId = Digest256;

/// Computes the `sha256` digest of raw bytes.
pub fn sha256(bytes: &[u8]) -> Digest256 {
    Digest256(Sha256::digest(bytes).into())
}

/// Computes the `sha512` digest of raw bytes.
pub fn sha512(bytes: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(&Sha512::digest(bytes));
    out
}

/// Computes the `ripemd160` digest of raw bytes.
pub fn ripemd160(bytes: &[u8]) -> Digest160 {
    Digest160(Ripemd160::digest(bytes).into())
}

/// The short digest used for all 160-bit ids: `ripemd160(sha512(bytes))`.
pub fn digest160(bytes: &[u8]) -> Digest160 {
    ripemd160(&sha512(bytes))
}

/// Computes the 160-bit id digest of a value's canonical encoding.
pub fn digest160_encoded<T: Encode>(value: &T) -> Digest160 {
    digest160(&value.encode())
}

/// Computes the `sha256` digest of a value's canonical encoding.
pub fn sha256_encoded<T: Encode>(value: &T) -> Digest256 {
    sha256(&value.encode())
}

/// An Ed25519 public key, stored in its 32-byte compressed form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode)]
pub struct PublicKey(pub [u8; 32]);

/// A detached Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct Signature(pub [u8; 64]);

impl Default for Signature {
    fn default() -> Self {
        Signature([0u8; 64])
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

impl PublicKey {
    /// Verifies a detached signature over `message`.
    ///
    /// Returns `false` for malformed keys as well as for bad signatures: a key
    /// that cannot be decoded can never have authorized anything.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = ed25519_dalek::VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        key.verify(message, &sig).is_ok()
    }

    /// Derives the on-chain address of this key.
    pub fn address(&self) -> Address {
        Address(digest160(&self.0).0)
    }
}

/// Signs `message` with a raw 32-byte Ed25519 secret.
pub fn sign(secret: &[u8; 32], message: &[u8]) -> Signature {
    let key = ed25519_dalek::SigningKey::from_bytes(secret);
    Signature(key.sign(message).to_bytes())
}

/// Returns the public key corresponding to a raw 32-byte Ed25519 secret.
pub fn public_key_of(secret: &[u8; 32]) -> PublicKey {
    let key = ed25519_dalek::SigningKey::from_bytes(secret);
    PublicKey(key.verifying_key().to_bytes())
}

/// A 160-bit account address derived from a public key.
///
/// Rendered as the chain prefix followed by the base58 encoding of the raw
/// digest, e.g. `MRD3abc...`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Encode, Decode)]
pub struct Address(pub [u8; 20]);

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", ADDRESS_PREFIX, bs58::encode(self.0).into_string())
    }
}

impl std::fmt::Debug for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl std::str::FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or_else(|| format!("address must start with {}", ADDRESS_PREFIX))?;
        let bytes = bs58::decode(body)
            .into_vec()
            .map_err(|e| format!("invalid base58 in address: {}", e))?;
        let raw: [u8; 20] = bytes
            .try_into()
            .map_err(|_| "address payload must be 20 bytes".to_string())?;
        Ok(Address(raw))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(D::Error::custom)?;
        let raw: [u8; 32] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("public key must be 32 bytes"))?;
        Ok(PublicKey(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let secret = [7u8; 32];
        let key = public_key_of(&secret);
        let sig = sign(&secret, b"hello");
        assert!(key.verify(b"hello", &sig));
        assert!(!key.verify(b"goodbye", &sig));
    }

    #[test]
    fn short_digest_is_ripemd_of_sha512() {
        let d = digest160(b"abc");
        assert_eq!(d, ripemd160(&sha512(b"abc")));
        assert_ne!(d, Digest160::default());
    }

    #[test]
    fn address_roundtrips_through_display() {
        let addr = public_key_of(&[3u8; 32]).address();
        let rendered = addr.to_string();
        assert!(rendered.starts_with(ADDRESS_PREFIX));
        let parsed: Address = rendered.parse().unwrap();
        assert_eq!(parsed, addr);
    }
}
