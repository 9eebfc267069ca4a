//! Cryptographic context for channel payloads
//!
//! A client holds one long-term [`ClientKeyPair`]. Every time a channel is bound
//! to a server it derives a fresh [`EncoderDecoder`] from that key pair and the
//! server's X25519 public key:
//!
//! - the X25519 shared secret is hashed into a key-encryption key,
//! - a random session key is generated and wrapped with it,
//! - the wrapped key is signed with the client's Ed25519 key,
//! - request and response bodies are sealed with ChaCha20-Poly1305 under the
//!   session key, laid out as `nonce || ciphertext`.
//!
//! [`ServerCipher`] is the peer side of the same scheme.

use core::fmt;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::{CryptoRng, OsRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::debug;
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};
use zeroize::Zeroizing;

use crate::errors::{CryptographicError, Result};
use crate::types::ServerPublicKey;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// ChaCha20-Poly1305 nonce length
pub const NONCE_LEN: usize = 12;

/// Poly1305 authentication tag length
pub const TAG_LEN: usize = 16;

/// Symmetric key length
pub const KEY_LEN: usize = 32;

/// Domain separation for the key-encryption key derivation
const KEK_CONTEXT: &[u8] = b"synclink/session-key-wrap/v1";

// ----------------------------------------------------------------------------
// Client Key Pair
// ----------------------------------------------------------------------------

/// Long-term client keys: X25519 for key agreement, Ed25519 for signing
#[derive(Clone)]
pub struct ClientKeyPair {
    agreement_secret: StaticSecret,
    agreement_public: PublicKey,
    signing_key: SigningKey,
}

impl ClientKeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::generate_with_rng(&mut OsRng)
    }

    /// Generate a new key pair with custom RNG
    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut agreement_bytes = [0u8; 32];
        let mut signing_bytes = [0u8; 32];
        rng.fill_bytes(&mut agreement_bytes);
        rng.fill_bytes(&mut signing_bytes);

        Self::from_bytes(agreement_bytes, &signing_bytes)
    }

    /// Create from raw private key bytes
    pub fn from_bytes(agreement_secret: [u8; 32], signing_secret: &[u8; 32]) -> Self {
        let agreement_secret = StaticSecret::from(agreement_secret);
        let agreement_public = PublicKey::from(&agreement_secret);

        Self {
            agreement_secret,
            agreement_public,
            signing_key: SigningKey::from_bytes(signing_secret),
        }
    }

    /// X25519 public key bytes
    pub fn agreement_public_bytes(&self) -> [u8; 32] {
        self.agreement_public.to_bytes()
    }

    /// Ed25519 verifying key bytes
    pub fn signing_public_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// SHA-256 of the agreement public key
    pub fn fingerprint(&self) -> [u8; 32] {
        Sha256::digest(self.agreement_public.as_bytes()).into()
    }

    fn key_encryption_key(&self, server_key: &ServerPublicKey) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        let server_public = PublicKey::from(*server_key.as_bytes());
        let shared = self.agreement_secret.diffie_hellman(&server_public);
        derive_kek(&shared, self.agreement_public.as_bytes(), server_key.as_bytes())
    }
}

impl fmt::Debug for ClientKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientKeyPair")
            .field("fingerprint", &hex::encode(self.fingerprint()))
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Encoder / Decoder
// ----------------------------------------------------------------------------

/// Per-server encryption context of a channel
pub struct EncoderDecoder {
    server_key: ServerPublicKey,
    client_public: [u8; 32],
    session_cipher: ChaCha20Poly1305,
    encoded_session_key: Vec<u8>,
    session_key_signature: [u8; 64],
}

impl EncoderDecoder {
    /// Derive a context for the given server
    pub fn new(keys: &ClientKeyPair, server_key: ServerPublicKey) -> Result<Self> {
        Self::new_with_rng(keys, server_key, &mut OsRng)
    }

    /// Derive a context for the given server with custom RNG
    pub fn new_with_rng<R: RngCore + CryptoRng>(
        keys: &ClientKeyPair,
        server_key: ServerPublicKey,
        rng: &mut R,
    ) -> Result<Self> {
        let kek = keys.key_encryption_key(&server_key)?;
        let kek_cipher = ChaCha20Poly1305::new(Key::from_slice(kek.as_slice()));

        let mut session_key = Zeroizing::new([0u8; KEY_LEN]);
        rng.fill_bytes(session_key.as_mut_slice());
        let encoded_session_key = seal(&kek_cipher, rng, session_key.as_slice())?;
        let session_key_signature = keys.signing_key.sign(&encoded_session_key).to_bytes();
        debug!(
            server_key = %server_key,
            client = %hex::encode(&keys.fingerprint()[..8]),
            "derived session context"
        );

        Ok(Self {
            server_key,
            client_public: keys.agreement_public_bytes(),
            session_cipher: ChaCha20Poly1305::new(Key::from_slice(session_key.as_slice())),
            encoded_session_key,
            session_key_signature,
        })
    }

    /// Session key wrapped for the server
    pub fn encoded_session_key(&self) -> &[u8] {
        &self.encoded_session_key
    }

    /// Client signature over [`Self::encoded_session_key`]
    pub fn session_key_signature(&self) -> &[u8; 64] {
        &self.session_key_signature
    }

    pub fn client_public_key(&self) -> &[u8; 32] {
        &self.client_public
    }

    pub fn server_key(&self) -> &ServerPublicKey {
        &self.server_key
    }

    /// Encrypt an outgoing body
    pub fn encode_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        seal(&self.session_cipher, &mut OsRng, data)
    }

    /// Decrypt and authenticate an incoming body
    pub fn decode_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        open(&self.session_cipher, data)
    }
}

impl fmt::Debug for EncoderDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderDecoder")
            .field("server_key", &self.server_key)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// Server Cipher
// ----------------------------------------------------------------------------

/// Server side of a client's session
pub struct ServerCipher {
    session_cipher: ChaCha20Poly1305,
}

impl ServerCipher {
    /// Unwrap the session key a client sent along with its request
    pub fn from_request_key(
        server_secret: &[u8; 32],
        client_public: &[u8; 32],
        encoded_session_key: &[u8],
    ) -> Result<Self> {
        let secret = StaticSecret::from(*server_secret);
        let server_public = PublicKey::from(&secret);
        let shared = secret.diffie_hellman(&PublicKey::from(*client_public));
        let kek = derive_kek(&shared, client_public, server_public.as_bytes())?;

        let session_key = Zeroizing::new(open(
            &ChaCha20Poly1305::new(Key::from_slice(kek.as_slice())),
            encoded_session_key,
        )?);
        if session_key.len() != KEY_LEN {
            return Err(CryptographicError::InvalidKeyFormat.into());
        }

        Ok(Self {
            session_cipher: ChaCha20Poly1305::new(Key::from_slice(session_key.as_slice())),
        })
    }

    /// Check the client's signature over its wrapped session key
    pub fn verify_signature(
        signing_public: &[u8; 32],
        encoded_session_key: &[u8],
        signature: &[u8],
    ) -> Result<()> {
        let verifying_key = VerifyingKey::from_bytes(signing_public)
            .map_err(|_| CryptographicError::InvalidKeyFormat)?;
        let signature: [u8; 64] = signature
            .try_into()
            .map_err(|_| CryptographicError::SignatureVerificationFailed)?;

        verifying_key
            .verify(encoded_session_key, &Signature::from_bytes(&signature))
            .map_err(|_| CryptographicError::SignatureVerificationFailed.into())
    }

    pub fn encode_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        seal(&self.session_cipher, &mut OsRng, data)
    }

    pub fn decode_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        open(&self.session_cipher, data)
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Key-encryption key for one client/server pair; wiped on drop
fn derive_kek(
    shared: &SharedSecret,
    client_public: &[u8; 32],
    server_public: &[u8; 32],
) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    if !shared.was_contributory() {
        return Err(CryptographicError::NonContributoryKey.into());
    }

    Ok(Zeroizing::new(
        Sha256::new()
            .chain_update(KEK_CONTEXT)
            .chain_update(shared.as_bytes())
            .chain_update(client_public)
            .chain_update(server_public)
            .finalize()
            .into(),
    ))
}

fn seal<R: RngCore + CryptoRng>(
    cipher: &ChaCha20Poly1305,
    rng: &mut R,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptographicError::EncryptionFailed)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

fn open(cipher: &ChaCha20Poly1305, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptographicError::MalformedCiphertext { len: sealed.len() }.into());
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptographicError::DecryptionFailed.into())
}
