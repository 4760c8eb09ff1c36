//! Encrypted Wallet Store Format
//!
//! Seals the master key with:
//! - Argon2id to stretch the password (64 bytes: cipher key + check key)
//! - HMAC-SHA256 key check, compared in constant time, to tell a wrong
//!   password apart from a damaged file
//! - AES-256-GCM over the serialized master key, with the header as AAD
//! - An unkeyed SHA-256 checksum over the whole document so integrity can be
//!   checked without the password

#![allow(deprecated)] // GenericArray::from_slice deprecated in generic-array 1.x

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};
use crate::wallet::MasterKey;

/// Magic tag in every store file
pub const STORE_FORMAT: &str = "mw-wallet-store";

/// Layout version of the store file
pub const FORMAT_VERSION: u32 = 1;

/// Wallet protocol version recorded in new stores
pub const PROTOCOL_VERSION: u32 = 1;

const KDF_ALGORITHM: &str = "argon2id";
const SALT_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const KEY_CHECK_LABEL: &[u8] = b"mw-wallet-store/key-check/v1";

type HmacSha256 = Hmac<Sha256>;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_cost: u32,
    /// Time cost (iterations)
    pub time_cost: u32,
    /// Parallelism
    pub parallelism: u32,
}

/// Argon2 accepts up to 2^24 - 1 lanes; anything above 16 is a typo here
pub const MAX_PARALLELISM: u32 = 16;

/// 4 GiB in KiB
pub const MAX_MEMORY_COST: u32 = 4 * 1024 * 1024;

pub const MAX_TIME_COST: u32 = 64;

impl KdfParams {
    /// Check the costs against the engine's limits
    pub fn check_bounds(&self) -> Result<(), String> {
        if self.parallelism == 0 || self.parallelism > MAX_PARALLELISM {
            return Err(format!("kdf.parallelism must be between 1 and {}", MAX_PARALLELISM));
        }
        if self.time_cost == 0 || self.time_cost > MAX_TIME_COST {
            return Err(format!("kdf.time_cost must be between 1 and {}", MAX_TIME_COST));
        }
        if self.memory_cost < 8 * self.parallelism || self.memory_cost > MAX_MEMORY_COST {
            return Err(format!(
                "kdf.memory_cost must be between {} and {} KiB",
                8 * self.parallelism,
                MAX_MEMORY_COST
            ));
        }
        Ok(())
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            // 64 MiB memory, 3 iterations, 4 parallel lanes
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Plaintext header. Readable without the password, authenticated by the
/// cipher as associated data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreHeader {
    pub id: String,
    pub protocol_version: u32,
    pub app_version: String,
    pub node_addr: String,
    pub fingerprint: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfSection {
    pub algorithm: String,
    #[serde(flatten)]
    pub params: KdfParams,
    /// base64, 32 bytes
    pub salt: String,
}

impl KdfSection {
    /// Stored costs are untrusted; out-of-range values mean a damaged file
    fn check_params(&self) -> WalletResult<()> {
        self.params.check_bounds().map_err(|e| {
            WalletError::corrupted(format!("Wallet store KDF parameters out of range: {}", e))
        })
    }
}

/// Everything covered by the checksum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreBody {
    pub format: String,
    pub format_version: u32,
    pub header: StoreHeader,
    pub kdf: KdfSection,
    /// base64 HMAC-SHA256
    pub key_check: String,
    /// base64, 12 bytes
    pub nonce: String,
    /// base64 ciphertext with GCM tag
    pub ciphertext: String,
}

/// On-disk document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreFile {
    #[serde(flatten)]
    pub body: StoreBody,
    /// hex SHA-256 of the JSON body
    pub checksum: String,
}

impl StoreFile {
    /// Parse a document and verify its checksum. No password needed.
    pub fn from_slice(bytes: &[u8]) -> WalletResult<Self> {
        let file: StoreFile = serde_json::from_slice(bytes)
            .map_err(|_| WalletError::corrupted("Wallet store is not a valid document"))?;

        if file.body.format != STORE_FORMAT {
            return Err(WalletError::corrupted("Not a wallet store"));
        }
        if file.body.format_version != FORMAT_VERSION {
            return Err(WalletError::corrupted(format!(
                "Unsupported wallet store version {}",
                file.body.format_version
            )));
        }

        let expected = body_checksum(&file.body)?;
        let matches: bool = expected.as_bytes().ct_eq(file.checksum.as_bytes()).into();
        if !matches {
            return Err(WalletError::corrupted("Wallet store checksum mismatch"));
        }
        file.body.kdf.check_params()?;

        Ok(file)
    }

    pub fn to_vec(&self) -> WalletResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Recompute the checksum after editing the body
    pub fn reseal_checksum(&mut self) -> WalletResult<()> {
        self.checksum = body_checksum(&self.body)?;
        Ok(())
    }
}

fn body_checksum(body: &StoreBody) -> WalletResult<String> {
    let json = serde_json::to_vec(body)?;
    Ok(hex::encode(Sha256::digest(&json)))
}

struct DerivedKeys {
    cipher: Zeroizing<[u8; 32]>,
    check: Zeroizing<[u8; 32]>,
}

fn derive_keys(password: &str, salt: &[u8], params: &KdfParams) -> WalletResult<DerivedKeys> {
    use argon2::{Algorithm, Argon2, Params, Version};

    let argon2_params = Params::new(params.memory_cost, params.time_cost, params.parallelism, Some(64))
        .map_err(|e| WalletError::corrupted(format!("Invalid KDF parameters: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut okm = Zeroizing::new([0u8; 64]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut okm[..])
        .map_err(|e| WalletError::internal(format!("Key derivation failed: {}", e)))?;

    let mut cipher = Zeroizing::new([0u8; 32]);
    let mut check = Zeroizing::new([0u8; 32]);
    cipher.copy_from_slice(&okm[..32]);
    check.copy_from_slice(&okm[32..]);
    Ok(DerivedKeys { cipher, check })
}

fn key_check(check_key: &[u8; 32]) -> WalletResult<[u8; 32]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(check_key)
        .map_err(|e| WalletError::internal(format!("HMAC init failed: {}", e)))?;
    mac.update(KEY_CHECK_LABEL);
    Ok(mac.finalize().into_bytes().into())
}

/// Encrypt `master` under `password`
pub fn seal(
    master: &MasterKey,
    password: &str,
    header: StoreHeader,
    params: &KdfParams,
) -> WalletResult<StoreFile> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| WalletError::entropy_unavailable(format!("Secure random source failed: {}", e)))?;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce_bytes)
        .map_err(|e| WalletError::entropy_unavailable(format!("Secure random source failed: {}", e)))?;

    let keys = derive_keys(password, &salt, params)?;
    let check = key_check(&keys.check)?;

    let cipher = Aes256Gcm::new_from_slice(&keys.cipher[..])
        .map_err(|e| WalletError::internal(format!("Failed to create cipher: {}", e)))?;
    let aad = serde_json::to_vec(&header)?;
    let plaintext = master.to_bytes();
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: &plaintext[..],
                aad: &aad,
            },
        )
        .map_err(|_| WalletError::internal("Encryption failed"))?;

    let body = StoreBody {
        format: STORE_FORMAT.to_string(),
        format_version: FORMAT_VERSION,
        header,
        kdf: KdfSection {
            algorithm: KDF_ALGORITHM.to_string(),
            params: *params,
            salt: base64_encode(&salt),
        },
        key_check: base64_encode(&check),
        nonce: base64_encode(&nonce_bytes),
        ciphertext: base64_encode(&ciphertext),
    };
    let checksum = body_checksum(&body)?;
    Ok(StoreFile { body, checksum })
}

/// Decrypt the master key. `BadPassword` only when the key check fails;
/// anything wrong past that point is `Corrupted`.
pub fn unseal(file: &StoreFile, password: &str) -> WalletResult<MasterKey> {
    let body = &file.body;
    if body.kdf.algorithm != KDF_ALGORITHM {
        return Err(WalletError::corrupted(format!(
            "Unsupported key derivation '{}'",
            body.kdf.algorithm
        )));
    }

    let salt = base64_decode(&body.kdf.salt)?;
    let nonce_bytes = base64_decode(&body.nonce)?;
    let stored_check = base64_decode(&body.key_check)?;
    let ciphertext = base64_decode(&body.ciphertext)?;

    if salt.len() != SALT_LEN || nonce_bytes.len() != NONCE_LEN || stored_check.len() != 32 {
        return Err(WalletError::corrupted("Wallet store field has the wrong length"));
    }
    body.kdf.check_params()?;

    let keys = derive_keys(password, &salt, &body.kdf.params)?;
    let check = key_check(&keys.check)?;
    let password_ok: bool = check[..].ct_eq(&stored_check[..]).into();
    if !password_ok {
        return Err(WalletError::bad_password());
    }

    let cipher = Aes256Gcm::new_from_slice(&keys.cipher[..])
        .map_err(|e| WalletError::internal(format!("Failed to create cipher: {}", e)))?;
    let aad = serde_json::to_vec(&body.header)?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| WalletError::corrupted("Wallet store failed authentication"))?,
    );

    let master = MasterKey::from_bytes(&plaintext)?;
    if master.fingerprint() != body.header.fingerprint {
        return Err(WalletError::corrupted("Wallet store fingerprint mismatch"));
    }
    Ok(master)
}

fn base64_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn base64_decode(s: &str) -> WalletResult<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|_| WalletError::corrupted("Wallet store field is not valid base64"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::wallet::{derive_master_key, derive_seed, parse_mnemonic};

    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn fast_kdf() -> KdfParams {
        KdfParams {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    fn master() -> MasterKey {
        derive_master_key(&derive_seed(&parse_mnemonic(PHRASE).unwrap(), "")).unwrap()
    }

    fn header(master: &MasterKey) -> StoreHeader {
        StoreHeader {
            id: "test-wallet".to_string(),
            protocol_version: PROTOCOL_VERSION,
            app_version: "1.0.0".to_string(),
            node_addr: "127.0.0.1:10000".to_string(),
            fingerprint: master.fingerprint(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn sealed() -> (MasterKey, StoreFile) {
        let key = master();
        let file = seal(&key, "correct horse", header(&key), &fast_kdf()).unwrap();
        (key, file)
    }

    #[test]
    fn test_seal_unseal_roundtrip() {
        let (key, file) = sealed();
        let bytes = file.to_vec().unwrap();
        let parsed = StoreFile::from_slice(&bytes).unwrap();
        assert_eq!(unseal(&parsed, "correct horse").unwrap(), key);
    }

    #[test]
    fn test_out_of_range_kdf_is_corrupted() {
        let oversized = [
            KdfParams { time_cost: u32::MAX, ..fast_kdf() },
            KdfParams { memory_cost: u32::MAX, ..fast_kdf() },
            KdfParams { parallelism: MAX_PARALLELISM + 1, ..fast_kdf() },
            KdfParams { time_cost: 0, ..fast_kdf() },
        ];
        for params in oversized {
            let (_, mut file) = sealed();
            file.body.kdf.params = params;
            file.reseal_checksum().unwrap();

            let err = StoreFile::from_slice(&file.to_vec().unwrap()).unwrap_err();
            assert_eq!(err.code, ErrorCode::Corrupted, "{:?}", params);
            let err = unseal(&file, "correct horse").unwrap_err();
            assert_eq!(err.code, ErrorCode::Corrupted, "{:?}", params);
        }
    }

    #[test]
    fn test_wrong_password() {
        let (_, file) = sealed();
        let err = unseal(&file, "battery staple").unwrap_err();
        assert_eq!(err.code, ErrorCode::BadPassword);
        assert!(!err.message.contains("battery"));
    }

    #[test]
    fn test_fresh_salt_and_nonce() {
        let key = master();
        let a = seal(&key, "pw", header(&key), &fast_kdf()).unwrap();
        let b = seal(&key, "pw", header(&key), &fast_kdf()).unwrap();
        assert_ne!(a.body.kdf.salt, b.body.kdf.salt);
        assert_ne!(a.body.nonce, b.body.nonce);
        assert_ne!(a.body.ciphertext, b.body.ciphertext);
    }

    #[test]
    fn test_checksum_detects_edit() {
        let (_, mut file) = sealed();
        file.body.header.app_version = "9.9.9".to_string();
        let err = StoreFile::from_slice(&file.to_vec().unwrap()).unwrap_err();
        assert_eq!(err.code, ErrorCode::Corrupted);
    }

    #[test]
    fn test_header_tamper_with_fresh_checksum_is_corrupted() {
        let (_, mut file) = sealed();
        file.body.header.node_addr = "203.0.113.9:10000".to_string();
        file.reseal_checksum().unwrap();

        let parsed = StoreFile::from_slice(&file.to_vec().unwrap()).unwrap();
        let err = unseal(&parsed, "correct horse").unwrap_err();
        assert_eq!(err.code, ErrorCode::Corrupted);
    }

    #[test]
    fn test_ciphertext_flip_is_corrupted() {
        let (_, mut file) = sealed();
        let mut raw = base64_decode(&file.body.ciphertext).unwrap();
        raw[0] ^= 0x01;
        file.body.ciphertext = base64_encode(&raw);
        file.reseal_checksum().unwrap();

        let err = unseal(&file, "correct horse").unwrap_err();
        assert_eq!(err.code, ErrorCode::Corrupted);
    }

    #[test]
    fn test_garbage_is_corrupted() {
        for bytes in [&b""[..], b"{}", b"not json", br#"{"format":"other"}"#] {
            let err = StoreFile::from_slice(bytes).unwrap_err();
            assert_eq!(err.code, ErrorCode::Corrupted);
        }
    }

    #[test]
    fn test_document_never_contains_key_material() {
        let (key, file) = sealed();
        let text = String::from_utf8(file.to_vec().unwrap()).unwrap();
        assert!(!text.contains(&hex::encode(&key.to_bytes()[..])));
        assert!(!text.contains("abandon"));
        assert!(text.contains(STORE_FORMAT));
    }
}
