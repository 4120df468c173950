//! AES-128-ECB with PKCS#7 padding, as used by Tuya 3.2+ payloads.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};

use crate::descriptor::LocalKey;
use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

const BLOCK: usize = 16;

pub(crate) fn encrypt(key: &LocalKey, plaintext: &[u8]) -> Vec<u8> {
    let cipher = Aes128::new(GenericArray::from_slice(key.as_bytes()));

    let pad = BLOCK - plaintext.len() % BLOCK;
    let mut buf = Vec::with_capacity(plaintext.len() + pad);
    buf.extend_from_slice(plaintext);
    buf.resize(plaintext.len() + pad, pad as u8);

    for chunk in buf.chunks_exact_mut(BLOCK) {
        cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
    }
    buf
}

pub(crate) fn decrypt(key: &LocalKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK != 0 {
        return Err(Error::PayloadDecode(format!(
            "ciphertext length {} is not a positive multiple of {BLOCK}",
            ciphertext.len()
        )));
    }

    let cipher = Aes128::new(GenericArray::from_slice(key.as_bytes()));
    let mut buf = ciphertext.to_vec();
    for chunk in buf.chunks_exact_mut(BLOCK) {
        cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
    }

    let pad = usize::from(buf[buf.len() - 1]);
    let valid = (1..=BLOCK).contains(&pad)
        && buf[buf.len() - pad..].iter().all(|&b| usize::from(b) == pad);
    if !valid {
        return Err(Error::PayloadDecode("bad padding".into()));
    }
    buf.truncate(buf.len() - pad);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> LocalKey {
        "0123456789abcdef".parse().unwrap()
    }

    #[test]
    fn test_padding_always_added() {
        assert_eq!(encrypt(&key(), b"").len(), 16);
        assert_eq!(encrypt(&key(), &[0u8; 15]).len(), 16);
        assert_eq!(encrypt(&key(), &[0u8; 16]).len(), 32);
    }

    #[test]
    fn test_decrypt_inverts_encrypt() {
        let msg = br#"{"dps":{"20":true}}"#;
        assert_eq!(decrypt(&key(), &encrypt(&key(), msg)).unwrap(), msg);
    }

    #[test]
    fn test_wrong_key_fails() {
        let other: LocalKey = "fedcba9876543210".parse().unwrap();
        let sealed = encrypt(&key(), br#"{"dps":{"20":true}}"#);
        // A wrong key either breaks the padding or yields garbage; never the input.
        match decrypt(&other, &sealed) {
            Ok(plain) => assert_ne!(plain, br#"{"dps":{"20":true}}"#),
            Err(e) => assert!(matches!(e, Error::PayloadDecode(_))),
        }
    }

    #[test]
    fn test_rejects_truncated_ciphertext() {
        let sealed = encrypt(&key(), b"hello");
        assert!(decrypt(&key(), &sealed[..10]).is_err());
        assert!(decrypt(&key(), &[]).is_err());
    }
}
