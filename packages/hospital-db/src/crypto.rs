//! Módulo de criptografia para dados sensíveis
//!
//! Este módulo implementa as primitivas usadas para proteger dados pessoais
//! (documento de identidade) gravados no banco de dados.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use argon2::Argon2;
use chacha20poly1305::{ChaCha20Poly1305, Key as ChaChaKey, Nonce as ChaChaNonce};
use rand::{rngs::OsRng as RandOsRng, RngCore};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Erros específicos para operações de criptografia
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Falha na criptografia: {0}")]
    EncryptionFailed(String),

    #[error("Falha na descriptografia: {0}")]
    DecryptionFailed(String),

    #[error("Dados inválidos: {0}")]
    InvalidData(String),

    #[error("Configuração de criptografia inválida: {0}")]
    InvalidConfiguration(String),
}

/// Tamanho do nonce em bytes para AES-GCM e ChaCha20-Poly1305
const NONCE_SIZE: usize = 12;

/// Tamanho do salt usado na derivação da chave de embrulho
pub const KDF_SALT_SIZE: usize = 16;

/// Chave AES-256 para criptografia (com zeroização automática)
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Cria uma nova chave aleatória
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        RandOsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Cria uma chave a partir de bytes existentes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidData(format!(
                "A chave deve ter 32 bytes, recebeu {}",
                bytes.len()
            )));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Deriva uma chave a partir de uma frase secreta usando Argon2id
    pub fn derive(phrase: &str, salt: &[u8]) -> Result<Self, CryptoError> {
        if phrase.is_empty() {
            return Err(CryptoError::InvalidConfiguration(
                "Frase secreta vazia".to_string(),
            ));
        }

        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(phrase.as_bytes(), salt, &mut key)
            .map_err(|e| CryptoError::InvalidConfiguration(e.to_string()))?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Estrutura que armazena dados criptografados e seu nonce
#[derive(Debug, Clone)]
pub struct EncryptedData {
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
}

/// Chave de dados embrulhada, pronta para ser persistida
#[derive(Debug, Clone)]
pub struct WrappedKey {
    pub data: EncryptedData,
    /// Salt da derivação Argon2id
    pub salt: Vec<u8>,
}

/// Criptografa dados usando AES-256-GCM
pub fn encrypt(data: &[u8], key: &EncryptionKey) -> Result<EncryptedData, CryptoError> {
    let aes_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(aes_key);

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, data)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedData {
        ciphertext,
        nonce: nonce.to_vec(),
    })
}

/// Descriptografa dados usando AES-256-GCM
pub fn decrypt(encrypted: &EncryptedData, key: &EncryptionKey) -> Result<Vec<u8>, CryptoError> {
    let aes_key = Key::<Aes256Gcm>::from_slice(key.as_bytes());
    let cipher = Aes256Gcm::new(aes_key);

    if encrypted.nonce.len() != NONCE_SIZE {
        return Err(CryptoError::InvalidData(format!(
            "Nonce inválido: esperado {} bytes, recebido {}",
            NONCE_SIZE,
            encrypted.nonce.len()
        )));
    }

    let nonce = Nonce::from_slice(&encrypted.nonce);

    cipher
        .decrypt(nonce, encrypted.ciphertext.as_ref())
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

/// Criptografa um texto e devolve o par (ciphertext, nonce)
pub fn encrypt_str(text: &str, key: &EncryptionKey) -> Result<EncryptedData, CryptoError> {
    encrypt(text.as_bytes(), key)
}

/// Descriptografa um texto UTF-8
pub fn decrypt_str(encrypted: &EncryptedData, key: &EncryptionKey) -> Result<String, CryptoError> {
    let plaintext = decrypt(encrypted, key)?;
    String::from_utf8(plaintext).map_err(|e| CryptoError::InvalidData(e.to_string()))
}

/// Embrulha a chave de dados com ChaCha20-Poly1305 usando uma chave derivada da frase secreta
pub fn wrap_key(key: &EncryptionKey, phrase: &str) -> Result<WrappedKey, CryptoError> {
    let mut salt = vec![0u8; KDF_SALT_SIZE];
    RandOsRng.fill_bytes(&mut salt);
    let wrapping_key = EncryptionKey::derive(phrase, &salt)?;

    let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(wrapping_key.as_bytes()));

    let mut nonce = [0u8; NONCE_SIZE];
    RandOsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(ChaChaNonce::from_slice(&nonce), key.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(WrappedKey {
        data: EncryptedData {
            ciphertext,
            nonce: nonce.to_vec(),
        },
        salt,
    })
}

/// Desembrulha a chave de dados. Falha se a frase secreta estiver incorreta.
pub fn unwrap_key(wrapped: &WrappedKey, phrase: &str) -> Result<EncryptionKey, CryptoError> {
    let wrapping_key = EncryptionKey::derive(phrase, &wrapped.salt)?;
    let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(wrapping_key.as_bytes()));

    if wrapped.data.nonce.len() != NONCE_SIZE {
        return Err(CryptoError::InvalidData(format!(
            "Nonce inválido: esperado {} bytes, recebido {}",
            NONCE_SIZE,
            wrapped.data.nonce.len()
        )));
    }

    let mut plaintext = cipher
        .decrypt(
            ChaChaNonce::from_slice(&wrapped.data.nonce),
            wrapped.data.ciphertext.as_ref(),
        )
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

    let key = EncryptionKey::from_bytes(&plaintext);
    plaintext.zeroize();
    key
}
