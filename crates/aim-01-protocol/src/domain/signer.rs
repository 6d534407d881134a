//! # Personal-Message Signer (secp256k1)
//!
//! Wallet-compatible `personal_sign`: the message is wrapped with the
//! `"\x19Ethereum Signed Message:\n" + len` prefix, hashed with Keccak-256 and
//! signed recoverably. Verification recovers the signer address.
//!
//! ## Security Notes
//!
//! - **Malleability Prevention (EIP-2)**: S must not exceed n/2
//! - **Scalar Range Validation**: R and S must be in [1, n-1]
//! - Range checks run in constant time via `subtle`

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};
use subtle::{Choice, ConstantTimeEq};
use tracing::trace;

use super::entities::{Address, WalletSignature};
use super::errors::ProtocolError;

const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

/// secp256k1 curve order n
const SECP256K1_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// floor(n/2), upper bound (inclusive) for S.
const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// Keccak-256.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&Keccak256::digest(data));
    hash
}

/// Hash a message the way wallets do for `personal_sign`.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_MESSAGE_PREFIX);
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&hasher.finalize());
    hash
}

/// Parse a hex private key (with or without `0x`).
pub fn parse_signing_key(hex_key: &str) -> Result<SigningKey, ProtocolError> {
    let trimmed = hex_key.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let mut bytes = hex::decode(digits).map_err(|_| ProtocolError::InvalidPrivateKey)?;
    let key = SigningKey::from_slice(&bytes).map_err(|_| ProtocolError::InvalidPrivateKey);
    zeroize::Zeroize::zeroize(&mut bytes);
    key
}

/// Address controlled by a signing key.
pub fn address_of(key: &SigningKey) -> Address {
    address_from_verifying_key(key.verifying_key())
}

/// Derive the address from a public key.
pub fn address_from_verifying_key(public_key: &VerifyingKey) -> Address {
    let encoded = public_key.to_encoded_point(false);
    // Skip the 0x04 SEC1 tag.
    let hash = keccak256(&encoded.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    Address(address)
}

/// Sign `message` as a personal message.
pub fn sign_message(message: &[u8], key: &SigningKey) -> Result<WalletSignature, ProtocolError> {
    let digest = personal_message_hash(message);
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(&digest)
        .map_err(|_| ProtocolError::SigningFailed)?;

    // k256 already emits low-S; normalise anyway and keep the parity consistent.
    let (signature, recovery_id) = match signature.normalize_s() {
        Some(low) => (
            low,
            RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced()),
        ),
        None => (signature, recovery_id),
    };

    let bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);

    Ok(WalletSignature {
        r,
        s,
        v: recovery_id.to_byte() + 27,
    })
}

/// Recover the address that signed `message`.
pub fn recover_address(
    message: &[u8],
    signature: &WalletSignature,
) -> Result<Address, ProtocolError> {
    if !is_valid_scalar(&signature.r) || !is_valid_scalar(&signature.s) {
        return Err(ProtocolError::InvalidFormat);
    }
    if !is_low_s(&signature.s) {
        return Err(ProtocolError::MalleableSignature);
    }

    let recovery_id = parse_recovery_id(signature.v)?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(&signature.r);
    sig_bytes[32..].copy_from_slice(&signature.s);
    let sig = Signature::from_slice(&sig_bytes).map_err(|_| ProtocolError::InvalidFormat)?;

    let digest = personal_message_hash(message);
    let recovered = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|_| ProtocolError::RecoveryFailed)?;

    let address = address_from_verifying_key(&recovered);
    trace!(%address, "Recovered signer");
    Ok(address)
}

/// [`recover_address`] for a hex-encoded signature header value.
pub fn recover_address_hex(message: &[u8], signature_hex: &str) -> Result<Address, ProtocolError> {
    let signature = WalletSignature::from_hex(signature_hex)?;
    recover_address(message, &signature)
}

fn parse_recovery_id(v: u8) -> Result<RecoveryId, ProtocolError> {
    let id = match v {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => return Err(ProtocolError::InvalidRecoveryId(v)),
    };
    RecoveryId::from_byte(id).ok_or(ProtocolError::InvalidRecoveryId(v))
}

/// Constant-time big-endian `a < b`.
fn ct_less_than(a: &[u8; 32], b: &[u8; 32]) -> Choice {
    let mut less = Choice::from(0u8);
    let mut greater = Choice::from(0u8);
    for (x, y) in a.iter().zip(b.iter()) {
        let undecided = !(less | greater);
        less |= undecided & Choice::from(u8::from(x < y));
        greater |= undecided & Choice::from(u8::from(x > y));
    }
    less
}

/// `s <= n/2`
fn is_low_s(s: &[u8; 32]) -> bool {
    (!ct_less_than(&SECP256K1_HALF_ORDER, s)).into()
}

fn is_valid_scalar(scalar: &[u8; 32]) -> bool {
    let mut is_zero = Choice::from(1u8);
    for byte in scalar {
        is_zero &= byte.ct_eq(&0u8);
    }
    (!is_zero & ct_less_than(scalar, &SECP256K1_ORDER)).into()
}

/// n - s, used to build a malleable twin in tests.
#[cfg(test)]
fn invert_s(s: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow = 0i32;
    for i in (0..32).rev() {
        let diff = i32::from(SECP256K1_ORDER[i]) - i32::from(s[i]) - borrow;
        if diff < 0 {
            result[i] = (diff + 256) as u8;
            borrow = 1;
        } else {
            result[i] = diff as u8;
            borrow = 0;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    // Widely published wallet test vector.
    const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const TEST_ADDRESS: &str = "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23";
    const TEST_SIGNATURE: &str = "0xb91467e570a6466aa9e9876cbcd013baba02900b8979d43fe208a4a4f339f5fd6007e74cd82e037b800186422fc2da167c747ef045e5d18a5f5d4300f8e1a0291c";

    fn random_key() -> SigningKey {
        SigningKey::random(&mut rand::thread_rng())
    }

    #[test]
    fn test_personal_message_hash_vector() {
        assert_eq!(
            hex::encode(personal_message_hash(b"Some data")),
            "1da44b586eb0729ff70a73c326926f6ed5a25f5b056e7f47fbc6e58d86871655"
        );
    }

    #[test]
    fn test_known_key_address() {
        let key = parse_signing_key(TEST_KEY).unwrap();
        assert_eq!(address_of(&key).to_string(), TEST_ADDRESS);
    }

    #[test]
    fn test_recover_known_signature() {
        let recovered = recover_address_hex(b"Some data", TEST_SIGNATURE).unwrap();
        assert_eq!(recovered.to_string(), TEST_ADDRESS);
    }

    #[test]
    fn test_sign_then_recover() {
        let key = random_key();
        let message = b"AIM ProtocolV2 Signature:\nGET\n/queue\ntx-nonce: 1\n";
        let sig = sign_message(message, &key).unwrap();
        assert!(sig.v == 27 || sig.v == 28);
        assert!(is_low_s(&sig.s));
        assert_eq!(recover_address(message, &sig).unwrap(), address_of(&key));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let key = parse_signing_key(TEST_KEY).unwrap();
        let a = sign_message(b"hello", &key).unwrap();
        let b = sign_message(b"hello", &key).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_recover_from_other_message_gives_other_address() {
        let key = random_key();
        let sig = sign_message(b"original", &key).unwrap();
        let recovered = recover_address(b"tampered", &sig);
        assert_ne!(recovered.ok(), Some(address_of(&key)));
    }

    #[test]
    fn test_raw_recovery_ids_accepted() {
        let key = random_key();
        let mut sig = sign_message(b"msg", &key).unwrap();
        sig.v -= 27;
        assert_eq!(recover_address(b"msg", &sig).unwrap(), address_of(&key));
    }

    #[test]
    fn test_invalid_recovery_id() {
        let key = random_key();
        let mut sig = sign_message(b"msg", &key).unwrap();
        sig.v = 35;
        assert_eq!(
            recover_address(b"msg", &sig),
            Err(ProtocolError::InvalidRecoveryId(35))
        );
    }

    #[test]
    fn test_high_s_rejected() {
        let key = random_key();
        let mut sig = sign_message(b"msg", &key).unwrap();
        sig.s = invert_s(&sig.s);
        assert_eq!(
            recover_address(b"msg", &sig),
            Err(ProtocolError::MalleableSignature)
        );
    }

    #[test]
    fn test_zero_scalars_rejected() {
        let sig = WalletSignature {
            r: [0u8; 32],
            s: [1u8; 32],
            v: 27,
        };
        assert_eq!(recover_address(b"msg", &sig), Err(ProtocolError::InvalidFormat));
    }

    #[test]
    fn test_invalid_private_key() {
        assert_eq!(
            parse_signing_key("0x00").unwrap_err(),
            ProtocolError::InvalidPrivateKey
        );
        assert_eq!(
            parse_signing_key(&"00".repeat(32)).unwrap_err(),
            ProtocolError::InvalidPrivateKey
        );
        assert!(parse_signing_key("xyz").is_err());
    }

    #[test]
    fn test_constant_time_ordering() {
        let mut small = [0u8; 32];
        small[31] = 1;
        assert!(bool::from(ct_less_than(&small, &SECP256K1_HALF_ORDER)));
        assert!(!bool::from(ct_less_than(&SECP256K1_HALF_ORDER, &SECP256K1_HALF_ORDER)));
        assert!(!is_valid_scalar(&SECP256K1_ORDER));
    }

    #[test]
    fn test_low_s_boundary_is_inclusive() {
        assert!(is_low_s(&SECP256K1_HALF_ORDER));

        let mut above = SECP256K1_HALF_ORDER;
        above[31] += 1;
        assert!(!is_low_s(&above));

        let mut below = SECP256K1_HALF_ORDER;
        below[31] -= 1;
        assert!(is_low_s(&below));
    }
}
