//! AES-256-CBC over fixed 512 byte payloads

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cairn_core::{Error, KeyMaterial, Result, IV_SIZE};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const AES_BLOCK_SIZE: usize = 16;

/// Block cipher keyed by SHA-256 of the caller's key bytes
#[derive(Clone)]
pub struct BlockCipher {
    key: Zeroizing<[u8; 32]>,
}

impl std::fmt::Debug for BlockCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BlockCipher([REDACTED])")
    }
}

impl BlockCipher {
    pub fn new(key: &KeyMaterial) -> Self {
        let digest = Sha256::digest(key.as_bytes());
        let mut derived = Zeroizing::new([0u8; 32]);
        derived.copy_from_slice(&digest);
        Self { key: derived }
    }

    /// Draw a fresh random IV
    pub fn fresh_iv() -> [u8; IV_SIZE] {
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);
        iv
    }

    /// Encrypt `buf` in place; its length must be a multiple of 16
    pub fn encrypt(&self, iv: &[u8], buf: &mut [u8]) -> Result<()> {
        let len = buf.len();
        check_aligned("encrypt", len)?;
        Aes256CbcEnc::new_from_slices(self.key.as_slice(), iv)
            .map_err(|e| Error::cryptographic("cipher init", format!("{e:?}")))?
            .encrypt_padded_mut::<NoPadding>(buf, len)
            .map_err(|e| Error::cryptographic("encrypt", format!("{e:?}")))?;
        Ok(())
    }

    /// Decrypt `buf` in place; its length must be a multiple of 16
    pub fn decrypt(&self, iv: &[u8], buf: &mut [u8]) -> Result<()> {
        check_aligned("decrypt", buf.len())?;
        Aes256CbcDec::new_from_slices(self.key.as_slice(), iv)
            .map_err(|e| Error::cryptographic("cipher init", format!("{e:?}")))?
            .decrypt_padded_mut::<NoPadding>(buf)
            .map_err(|e| Error::cryptographic("decrypt", format!("{e:?}")))?;
        Ok(())
    }
}

fn check_aligned(operation: &'static str, len: usize) -> Result<()> {
    if len % AES_BLOCK_SIZE != 0 {
        return Err(Error::cryptographic(
            operation,
            format!("{len} bytes is not a multiple of the {AES_BLOCK_SIZE} byte AES block"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_in_place() {
        let cipher = BlockCipher::new(&KeyMaterial::from("secret"));
        let iv = BlockCipher::fresh_iv();
        let plain: Vec<u8> = (0..512u32).map(|i| i as u8).collect();

        let mut buf = plain.clone();
        cipher.encrypt(&iv, &mut buf).unwrap();
        assert_ne!(buf, plain);

        cipher.decrypt(&iv, &mut buf).unwrap();
        assert_eq!(buf, plain);
    }

    #[test]
    fn test_distinct_ivs_give_distinct_ciphertext() {
        let cipher = BlockCipher::new(&KeyMaterial::from("secret"));
        let mut a = vec![7u8; 512];
        let mut b = vec![7u8; 512];
        cipher.encrypt(&BlockCipher::fresh_iv(), &mut a).unwrap();
        cipher.encrypt(&BlockCipher::fresh_iv(), &mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_does_not_decrypt() {
        let iv = BlockCipher::fresh_iv();
        let mut buf = vec![1u8; 32];
        BlockCipher::new(&KeyMaterial::from("a"))
            .encrypt(&iv, &mut buf)
            .unwrap();
        BlockCipher::new(&KeyMaterial::from("b"))
            .decrypt(&iv, &mut buf)
            .unwrap();
        assert_ne!(buf, vec![1u8; 32]);
    }

    #[test]
    fn test_unaligned_buffer_is_rejected() {
        let cipher = BlockCipher::new(&KeyMaterial::from("k"));
        let mut buf = vec![0u8; 15];
        assert!(cipher.encrypt(&BlockCipher::fresh_iv(), &mut buf).is_err());
    }
}
