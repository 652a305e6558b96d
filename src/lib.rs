//! Chaumian RSA blind signatures for anonymous coin issuance.
//!
//! A bank can sign a coin identifier without ever seeing it, and the
//! resulting signature cannot be linked back to the blinded request it was
//! derived from. The coin identifier is padded with EMSA-PSS, blinded with a
//! fresh invertible factor, raw-signed by the bank, then unblinded into an
//! ordinary RSA-PSS signature that verifies under the bank's public key.
//!
//! ```rust
//! use chaumian_blinding::{KeyPair, LocalSigner, Options, Protocoin, Signer};
//!
//! let options = Options::default();
//! let rng = &mut rand::thread_rng();
//!
//! // [BANK]: generate an RSA-2048 key pair and stand up an in-process signer.
//! let kp = KeyPair::generate(rng, 2048)?;
//! let bank = LocalSigner::new(kp);
//!
//! // [CLIENT]: draw a fresh coin identifier and blind it for the bank.
//! // The blinding factor never leaves the client.
//! let protocoin = Protocoin::new(rng, bank.public_key(), &options)?;
//! let request = protocoin.coin_request(rng)?;
//!
//! // [BANK]: raw-sign the blinded request. The bank only ever sees an
//! // opaque integer; the coin identifier stays hidden.
//! let blind_sig = bank.sign(&request)?;
//!
//! // [CLIENT]: strip the blinding factor and keep the resulting coin. The
//! // coin's signature differs from what the bank returned, so the bank
//! // cannot link the coin to the request that produced it.
//! let coin = protocoin.into_coin(&blind_sig)?;
//!
//! // [ANYONE]: the coin verifies with the bank's public key alone.
//! assert!(coin.verify(bank.public_key(), &options));
//! # Ok::<(), chaumian_blinding::Error>(())
//! ```

#[macro_use]
extern crate derive_new;

use derive_more::*;
use digest::DynDigest;
use hmac_sha256::Hash as Sha256;
use hmac_sha512::sha384::Hash as Sha384;
use hmac_sha512::Hash as Sha512;
use rsa::pkcs8::{
    DecodePrivateKey as _, DecodePublicKey as _, EncodePrivateKey as _, EncodePublicKey as _,
    LineEnding,
};
use rsa::rand_core::CryptoRngCore;
use rsa::traits::{PrivateKeyParts as _, PublicKeyParts as _};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use std::fmt::{self, Display};

mod blinding;
mod mgf1;
mod num_padding;
mod protocol;
pub mod pss;

pub use blinding::{blind, unblind, BlindingFactor};
pub use protocol::{Coin, CoinId, CoinRequest, LocalSigner, Protocoin, Signer, COIN_ID_LEN};

use num_padding::ToBytesPadded;

pub mod reexports {
    pub use {digest, hmac_sha256, hmac_sha512, rand, rsa};
}

/// The customary RSA public exponent, 65537.
pub const RSA_F4: u32 = 65537;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    /// No valid key pair could be produced for the requested parameters.
    KeyGeneration,
    /// The secure random source failed; the whole operation may be retried.
    RandomSource,
    /// The encoded message cannot fit in the modulus capacity.
    MessageTooLong,
    /// A modular input was not below the modulus, or a wire value had the
    /// wrong length.
    InputTooLarge,
    /// The unblinded signature failed the requester's own check.
    Verification,
    /// DER/PEM (de)serialization failure.
    Encoding,
    /// An imported key did not pass validation.
    InvalidKey,
    Internal,
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::KeyGeneration => write!(f, "Key generation failed"),
            Error::RandomSource => write!(f, "Random source failure"),
            Error::MessageTooLong => write!(f, "Message too long for the modulus"),
            Error::InputTooLarge => write!(f, "Input exceeds the modulus"),
            Error::Verification => write!(f, "Verification failed"),
            Error::Encoding => write!(f, "Encoding error"),
            Error::InvalidKey => write!(f, "Invalid key"),
            Error::Internal => write!(f, "Internal error"),
        }
    }
}

/// Hash function used for padding and for hashing the coin identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Hash {
    Sha256,
    Sha384,
    Sha512,
}

impl Hash {
    pub fn output_size(self) -> usize {
        match self {
            Hash::Sha256 => 32,
            Hash::Sha384 => 48,
            Hash::Sha512 => 64,
        }
    }

    pub(crate) fn digest(self, msg: &[u8]) -> Vec<u8> {
        match self {
            Hash::Sha256 => Sha256::hash(msg).to_vec(),
            Hash::Sha384 => Sha384::hash(msg).to_vec(),
            Hash::Sha512 => Sha512::hash(msg).to_vec(),
        }
    }

    pub(crate) fn new_hasher(self) -> Box<dyn DynDigest> {
        match self {
            Hash::Sha256 => Box::new(Sha256::new()),
            Hash::Sha384 => Box::new(Sha384::new()),
            Hash::Sha512 => Box::new(Sha512::new()),
        }
    }
}

/// Padding options
#[derive(Clone, Debug, Eq, PartialEq, new)]
pub struct Options {
    /// Hash function to use for padding and for hashing the message
    hash: Hash,
    /// Salt length in bytes
    salt_len: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            hash: Hash::Sha384,
            salt_len: Hash::Sha384.output_size(),
        }
    }
}

impl Options {
    pub fn hash(&self) -> Hash {
        self.hash
    }

    pub fn salt_len(&self) -> usize {
        self.salt_len
    }
}

/// An RSA public key
#[derive(Clone, Debug, Eq, PartialEq, AsRef, Deref, From, Into, new)]
pub struct PublicKey(pub RsaPublicKey);

/// An RSA secret key
#[derive(Clone, Debug, AsRef, Deref, From, Into, new)]
pub struct SecretKey(pub RsaPrivateKey);

/// An RSA key pair
#[derive(Clone, Debug, From, Into, new)]
pub struct KeyPair {
    pub pk: PublicKey,
    pub sk: SecretKey,
}

/// A PSS-padded representative of a coin identifier, ready for blinding
#[derive(Clone, Debug, Eq, PartialEq, AsRef, Deref, From, Into, new)]
pub struct EncodedMessage(pub Vec<u8>);

/// A blinded representative, opaque to the signer
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, AsRef, Deref, From, Into, new)]
pub struct BlindedValue(pub Vec<u8>);

/// The signer's raw exponentiation of a blinded value
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, AsRef, Deref, From, Into, new)]
pub struct BlindSignature(pub Vec<u8>);

/// A (non-blind) signature over the original coin identifier
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, AsRef, Deref, From, Into, new)]
pub struct Signature(pub Vec<u8>);

impl AsRef<[u8]> for EncodedMessage {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl AsRef<[u8]> for BlindedValue {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl AsRef<[u8]> for BlindSignature {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl KeyPair {
    /// Generate a new key pair with the customary public exponent 65537.
    pub fn generate<R: CryptoRngCore + ?Sized>(
        rng: &mut R,
        modulus_bits: usize,
    ) -> Result<KeyPair, Error> {
        let e = BigUint::from(RSA_F4);
        let mut sk = RsaPrivateKey::new_with_exp(rng, modulus_bits, &e)
            .map_err(|_| Error::KeyGeneration)?;
        sk.precompute().map_err(|_| Error::KeyGeneration)?;
        let sk = SecretKey(sk);
        let pk = sk.public_key()?;
        Ok(KeyPair { pk, sk })
    }
}

impl Signature {
    /// Verify that the signature is valid for the given public key and
    /// original message.
    pub fn verify(&self, pk: &PublicKey, msg: impl AsRef<[u8]>, options: &Options) -> bool {
        pk.verify(self, msg, options)
    }
}

impl PublicKey {
    pub fn to_der(&self) -> Result<Vec<u8>, Error> {
        self.0
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|_| Error::Encoding)
    }

    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        if der.len() > 800 {
            return Err(Error::Encoding);
        }
        let pk = PublicKey(RsaPublicKey::from_public_key_der(der).map_err(|_| Error::Encoding)?);
        pk.check_rsa_parameters()?;
        Ok(pk)
    }

    pub fn to_pem(&self) -> Result<String, Error> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|_| Error::Encoding)
    }

    pub fn from_pem(pem: &str) -> Result<Self, Error> {
        if pem.len() > 1000 {
            return Err(Error::Encoding);
        }
        let pk =
            PublicKey(RsaPublicKey::from_public_key_pem(pem.trim()).map_err(|_| Error::Encoding)?);
        pk.check_rsa_parameters()?;
        Ok(pk)
    }

    fn check_rsa_parameters(&self) -> Result<(), Error> {
        let modulus_bits = self.0.size() * 8;
        if !(2048..=4096).contains(&modulus_bits) {
            return Err(Error::InvalidKey);
        }
        let e3 = BigUint::from(3u32);
        let ef4 = BigUint::from(RSA_F4);
        if ![e3, ef4].contains(self.0.e()) {
            return Err(Error::InvalidKey);
        }
        Ok(())
    }

    /// Raw RSA public operation, `value^e mod N`.
    pub fn encrypt_raw(&self, value: &BigUint) -> Result<BigUint, Error> {
        if value >= self.0.n() {
            return Err(Error::InputTooLarge);
        }
        Ok(value.modpow(self.0.e(), self.0.n()))
    }

    /// Verify a (non-blind) signature over `msg`.
    ///
    /// Recomputes `m' = signature^e mod N` and checks the PSS padding
    /// against the message. Any failure, structural or cryptographic, is
    /// reported through the single boolean outcome.
    pub fn verify(&self, sig: &Signature, msg: impl AsRef<[u8]>, options: &Options) -> bool {
        let modulus_bytes = self.0.size();
        if sig.len() != modulus_bytes {
            return false;
        }
        let s = BigUint::from_bytes_be(sig.as_ref());
        let m = match self.encrypt_raw(&s) {
            Ok(m) => m,
            Err(_) => return false,
        };
        let em_bits = modulus_bytes * 8 - 1;
        let encoded = EncodedMessage(m.to_bytes_be_padded((em_bits + 7) / 8));
        pss::verify(msg.as_ref(), &encoded, em_bits, options)
    }
}

impl SecretKey {
    pub fn to_der(&self) -> Result<Vec<u8>, Error> {
        self.0
            .to_pkcs8_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|_| Error::Encoding)
    }

    pub fn from_der(der: &[u8]) -> Result<Self, Error> {
        let mut sk = RsaPrivateKey::from_pkcs8_der(der).map_err(|_| Error::Encoding)?;
        sk.validate().map_err(|_| Error::InvalidKey)?;
        sk.precompute().map_err(|_| Error::InvalidKey)?;
        Ok(SecretKey(sk))
    }

    pub fn to_pem(&self) -> Result<String, Error> {
        self.0
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|_| Error::Encoding)
    }

    pub fn from_pem(pem: &str) -> Result<Self, Error> {
        let mut sk = RsaPrivateKey::from_pkcs8_pem(pem.trim()).map_err(|_| Error::Encoding)?;
        sk.validate().map_err(|_| Error::InvalidKey)?;
        sk.precompute().map_err(|_| Error::InvalidKey)?;
        Ok(SecretKey(sk))
    }

    pub fn public_key(&self) -> Result<PublicKey, Error> {
        Ok(PublicKey(RsaPublicKey::from(self.as_ref())))
    }

    /// Raw RSA private operation, `representative^d mod N`.
    pub fn sign_raw(&self, representative: &BigUint) -> Result<BigUint, Error> {
        if representative >= self.0.n() {
            return Err(Error::InputTooLarge);
        }
        Ok(representative.modpow(self.0.d(), self.0.n()))
    }

    /// Sign a blinded value.
    ///
    /// The blinded integer is treated opaquely: no padding is inspected or
    /// recomputed here, only the raw private-key exponentiation is applied.
    pub fn blind_sign(&self, blinded: &BlindedValue) -> Result<BlindSignature, Error> {
        let modulus_bytes = self.0.size();
        if blinded.len() != modulus_bytes {
            return Err(Error::InputTooLarge);
        }
        let m = BigUint::from_bytes_be(blinded.as_ref());
        let s = self.sign_raw(&m)?;
        Ok(BlindSignature(s.to_bytes_be_padded(modulus_bytes)))
    }
}
