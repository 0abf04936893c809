use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("ciphertext is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("initialization vector must be 16 bytes")]
    BadIvLength,
    #[error("failed to decrypt API key")]
    Decrypt,
    #[error("decrypted key is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Stored text form of an encrypted API key. Records written since IV-per-save
/// support carry `ivHex:cipherHex`; records from the earlier scheme are bare
/// hex with no separator and are migrated on first read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CipherText {
    Current { iv_hex: String, cipher_hex: String },
    Legacy(String),
}

impl CipherText {
    pub fn parse(stored: &str) -> Self {
        match stored.split_once(':') {
            Some((iv_hex, cipher_hex)) => CipherText::Current {
                iv_hex: iv_hex.to_string(),
                cipher_hex: cipher_hex.to_string(),
            },
            None => CipherText::Legacy(stored.to_string()),
        }
    }

    pub fn encode(&self) -> String {
        match self {
            CipherText::Current { iv_hex, cipher_hex } => format!("{iv_hex}:{cipher_hex}"),
            CipherText::Legacy(cipher_hex) => cipher_hex.clone(),
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, CipherText::Legacy(_))
    }
}

/// Derive the 32-byte cipher key from the configured secret: a 64-hex-char
/// secret decodes directly to raw bytes, anything else is hashed. Pure and
/// deterministic for a given secret.
pub fn derive_key(secret: &str) -> [u8; 32] {
    if secret.len() == 64 {
        if let Ok(raw) = hex::decode(secret) {
            let mut key = [0u8; 32];
            key.copy_from_slice(&raw);
            return key;
        }
    }
    Sha256::digest(secret.as_bytes()).into()
}

// The pre-IV scheme used the secret as key material without hashing.
fn legacy_key(secret: &str) -> [u8; 32] {
    if secret.len() == 64 {
        if let Ok(raw) = hex::decode(secret) {
            let mut key = [0u8; 32];
            key.copy_from_slice(&raw);
            return key;
        }
    }
    let mut key = [0u8; 32];
    let bytes = secret.as_bytes();
    let len = bytes.len().min(32);
    key[..len].copy_from_slice(&bytes[..len]);
    key
}

/// Encrypt a raw key with AES-256-CBC and a fresh random 16-byte IV. The IV is
/// never reused across saves, so encrypting the same plaintext twice yields
/// different blobs.
pub fn encrypt(secret: &str, plaintext: &str) -> CipherText {
    let key = derive_key(secret);
    let mut iv = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    let ciphertext =
        Aes256CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    CipherText::Current {
        iv_hex: hex::encode(iv),
        cipher_hex: hex::encode(ciphertext),
    }
}

/// Decrypt a stored blob back to the original plaintext key. Corruption or a
/// rotated secret surfaces as an error, never as a garbled string.
pub fn decrypt(secret: &str, ciphertext: &CipherText) -> Result<String, CipherError> {
    match ciphertext {
        CipherText::Current { iv_hex, cipher_hex } => {
            let iv_bytes = hex::decode(iv_hex)?;
            let iv: [u8; 16] = iv_bytes.try_into().map_err(|_| CipherError::BadIvLength)?;
            let data = hex::decode(cipher_hex)?;
            let key = derive_key(secret);
            let plaintext = Aes256CbcDec::new(&key.into(), &iv.into())
                .decrypt_padded_vec_mut::<Pkcs7>(&data)
                .map_err(|_| CipherError::Decrypt)?;
            Ok(String::from_utf8(plaintext)?)
        }
        CipherText::Legacy(cipher_hex) => {
            let data = hex::decode(cipher_hex)?;
            let key = legacy_key(secret);
            let iv = [0u8; 16];
            let plaintext = Aes256CbcDec::new(&key.into(), &iv.into())
                .decrypt_padded_vec_mut::<Pkcs7>(&data)
                .map_err(|_| CipherError::Decrypt)?;
            Ok(String::from_utf8(plaintext)?)
        }
    }
}

/// Produce a blob in the pre-IV on-disk format, for exercising the migration
/// path.
#[cfg(test)]
pub(crate) fn encrypt_legacy(secret: &str, plaintext: &str) -> CipherText {
    let key = legacy_key(secret);
    let iv = [0u8; 16];
    let ciphertext =
        Aes256CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    CipherText::Legacy(hex::encode(ciphertext))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX_SECRET: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    #[test]
    fn round_trip_with_hashed_secret() {
        let secret = "not-a-hex-secret";
        for raw in ["sk-test-123", "a", "key with spaces & symbols !@#$%"] {
            let blob = encrypt(secret, raw);
            assert_eq!(decrypt(secret, &blob).unwrap(), raw);
        }
    }

    #[test]
    fn round_trip_with_hex_secret() {
        let blob = encrypt(HEX_SECRET, "sk-test-123");
        assert_eq!(decrypt(HEX_SECRET, &blob).unwrap(), "sk-test-123");
    }

    #[test]
    fn round_trip_long_printable_key() {
        let raw: String = ('!'..='~').cycle().take(500).collect();
        let blob = encrypt("secret", &raw);
        assert_eq!(decrypt("secret", &blob).unwrap(), raw);
    }

    #[test]
    fn fresh_iv_per_encryption() {
        let first = encrypt("secret", "sk-test-123");
        let second = encrypt("secret", "sk-test-123");
        assert_ne!(first.encode(), second.encode());
    }

    #[test]
    fn derive_key_decodes_hex_secret_directly() {
        let key = derive_key(HEX_SECRET);
        assert_eq!(key.to_vec(), hex::decode(HEX_SECRET).unwrap());
        // Same-length non-hex input falls back to hashing.
        let not_hex = "z".repeat(64);
        assert_ne!(derive_key(&not_hex).to_vec(), hex::decode(HEX_SECRET).unwrap());
    }

    #[test]
    fn parse_splits_on_separator() {
        assert_eq!(
            CipherText::parse("aabb:ccdd"),
            CipherText::Current {
                iv_hex: "aabb".into(),
                cipher_hex: "ccdd".into()
            }
        );
        assert_eq!(CipherText::parse("ccdd"), CipherText::Legacy("ccdd".into()));
        assert_eq!(CipherText::parse("aabb:ccdd").encode(), "aabb:ccdd");
    }

    #[test]
    fn legacy_blob_decrypts_without_separator() {
        let blob = encrypt_legacy("secret", "sk-legacy-456");
        assert!(blob.is_legacy());
        assert!(!blob.encode().contains(':'));
        assert_eq!(decrypt("secret", &blob).unwrap(), "sk-legacy-456");
    }

    #[test]
    fn corrupted_ciphertext_is_an_error() {
        assert!(decrypt("secret", &CipherText::parse("nothex:zz")).is_err());
        // Valid hex but not a whole cipher block.
        assert!(decrypt("secret", &CipherText::parse("00112233445566778899aabbccddeeff:aabb")).is_err());
        // Bad IV length.
        assert!(decrypt("secret", &CipherText::parse("aabb:00112233445566778899aabbccddeeff")).is_err());
    }
}
