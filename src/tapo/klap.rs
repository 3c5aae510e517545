//! KLAP session cryptography
//!
//! Tapo plugs on current firmware authenticate with a two step handshake and then
//! expect every request body AES-128-CBC encrypted and signed:
//!
//! ```text
//! auth   = SHA256(SHA1(username) ‖ SHA1(password))
//! hs1    : client → local_seed(16)          server → remote_seed(16) ‖ SHA256(local ‖ remote ‖ auth)
//! hs2    : client → SHA256(remote ‖ local ‖ auth)
//! key    = SHA256("lsk" ‖ local ‖ remote ‖ auth)[..16]
//! iv     = SHA256("iv"  ‖ local ‖ remote ‖ auth)  (12 byte prefix, last 4 bytes = initial seq)
//! sig    = SHA256("ldk" ‖ local ‖ remote ‖ auth)[..28]
//! body   = SHA256(sig ‖ seq ‖ ciphertext) ‖ ciphertext
//! ```

use crate::error::{Result, TapmonError};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha1::Sha1;
use sha2::{Digest, Sha256};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

pub const SEED_LEN: usize = 16;
const SIGNATURE_LEN: usize = 32;

fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Credential hash shared by client and device.
pub fn auth_hash(username: &str, password: &str) -> [u8; 32] {
    let user = Sha1::digest(username.as_bytes());
    let pass = Sha1::digest(password.as_bytes());
    sha256(&[user.as_slice(), pass.as_slice()])
}

/// Hash the device must return from handshake1 to prove it knows the credentials.
pub fn server_hash(local_seed: &[u8], remote_seed: &[u8], auth: &[u8; 32]) -> [u8; 32] {
    sha256(&[local_seed, remote_seed, auth.as_slice()])
}

/// Body of handshake2.
pub fn client_hash(local_seed: &[u8], remote_seed: &[u8], auth: &[u8; 32]) -> [u8; 32] {
    sha256(&[remote_seed, local_seed, auth.as_slice()])
}

/// Per-session cipher derived from both seeds.
pub struct KlapCipher {
    key: [u8; 16],
    iv_prefix: [u8; 12],
    signature: [u8; 28],
    seq: i32,
}

impl KlapCipher {
    pub fn new(local_seed: &[u8], remote_seed: &[u8], auth: &[u8; 32]) -> Self {
        let key_hash = sha256(&[b"lsk".as_slice(), local_seed, remote_seed, auth.as_slice()]);
        let iv_hash = sha256(&[b"iv".as_slice(), local_seed, remote_seed, auth.as_slice()]);
        let sig_hash = sha256(&[b"ldk".as_slice(), local_seed, remote_seed, auth.as_slice()]);

        let mut key = [0u8; 16];
        key.copy_from_slice(&key_hash[..16]);
        let mut iv_prefix = [0u8; 12];
        iv_prefix.copy_from_slice(&iv_hash[..12]);
        let mut signature = [0u8; 28];
        signature.copy_from_slice(&sig_hash[..28]);
        let seq = i32::from_be_bytes([iv_hash[28], iv_hash[29], iv_hash[30], iv_hash[31]]);

        Self {
            key,
            iv_prefix,
            signature,
            seq,
        }
    }

    /// Sequence number of the most recently encrypted request.
    pub fn seq(&self) -> i32 {
        self.seq
    }

    fn iv(&self, seq: i32) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv[..12].copy_from_slice(&self.iv_prefix);
        iv[12..].copy_from_slice(&seq.to_be_bytes());
        iv
    }

    /// Encrypt and sign a request body, advancing the sequence number.
    ///
    /// Returns the wire payload and the sequence it was sealed with.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> (Vec<u8>, i32) {
        self.seq = self.seq.wrapping_add(1);
        (self.seal(self.seq, plaintext), self.seq)
    }

    /// Encrypt and sign `plaintext` for an explicit sequence number.
    pub fn seal(&self, seq: i32, plaintext: &[u8]) -> Vec<u8> {
        let ciphertext = Aes128CbcEnc::new(&self.key.into(), &self.iv(seq).into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
        let signature = sha256(&[
            self.signature.as_slice(),
            seq.to_be_bytes().as_slice(),
            ciphertext.as_slice(),
        ]);

        let mut payload = Vec::with_capacity(SIGNATURE_LEN + ciphertext.len());
        payload.extend_from_slice(&signature);
        payload.extend_from_slice(&ciphertext);
        payload
    }

    /// Decrypt a response produced for request `seq`.
    pub fn decrypt(&self, seq: i32, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.len() <= SIGNATURE_LEN {
            return Err(TapmonError::Encoding(format!(
                "response too short ({} bytes)",
                payload.len()
            )));
        }

        Aes128CbcDec::new(&self.key.into(), &self.iv(seq).into())
            .decrypt_padded_vec_mut::<Pkcs7>(&payload[SIGNATURE_LEN..])
            .map_err(|_| TapmonError::Encoding("invalid padding in response".to_string()))
    }
}
