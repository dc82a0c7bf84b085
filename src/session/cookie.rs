//! AES-256-GCM sealed session cookie

use crate::error::{AppError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const COOKIE_NAME: &str = "stockwatch_session";

const NONCE_SIZE: usize = 12;

/// Seals session ids into cookie values and opens them again
pub struct CookieCodec {
    cipher: Aes256Gcm,
}

impl CookieCodec {
    /// Derive the 256-bit key from the configured secret
    pub fn from_secret(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(AppError::Config("cookie_secret is empty".to_string()));
        }

        let key = Sha256::digest(secret.as_bytes());
        let cipher =
            Aes256Gcm::new_from_slice(&key).map_err(|e| AppError::Encryption(e.to_string()))?;
        Ok(Self { cipher })
    }

    fn generate_nonce() -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }

    /// `base64url(nonce || ciphertext)`
    pub fn seal(&self, session_id: &str) -> Result<String> {
        let nonce_bytes = Self::generate_nonce();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, session_id.as_bytes())
            .map_err(|e| AppError::Encryption(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    pub fn open(&self, value: &str) -> Result<String> {
        let sealed = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|e| AppError::Encryption(format!("Invalid cookie encoding: {}", e)))?;

        if sealed.len() <= NONCE_SIZE {
            return Err(AppError::Encryption("Cookie too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|e| AppError::Encryption(format!("Decryption failed: {}", e)))?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::Encryption(format!("Invalid UTF-8 in cookie: {}", e)))
    }

    /// `Set-Cookie` value for a sealed session id
    pub fn set_cookie(&self, session_id: &str, max_age_secs: u64) -> Result<String> {
        Ok(format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            COOKIE_NAME,
            self.seal(session_id)?,
            max_age_secs
        ))
    }
}

/// Find our cookie in a `Cookie` request header
pub fn find_session_cookie(header: &str) -> Option<&str> {
    header.split(';').find_map(|part| {
        let (name, value) = part.trim().split_once('=')?;
        (name == COOKIE_NAME).then_some(value)
    })
}
