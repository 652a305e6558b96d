//! The coin-issuance protocol: a requester blinds a fresh coin identifier,
//! a signer raw-signs the blinded value, and the requester unblinds the
//! result into a coin anyone can verify.
//!
//! The signer is a trait so the in-process implementation used here and in
//! tests can be swapped for a transport-backed one; the exchange itself is
//! two opaque modulus-length byte strings either way.

use rsa::rand_core::CryptoRngCore;
use rsa::traits::PublicKeyParts as _;

use crate::blinding::{blind, unblind, BlindingFactor};
use crate::pss;
use crate::{BlindSignature, BlindedValue, Error, KeyPair, Options, PublicKey, Signature};

/// Coin identifiers are 128-bit random values.
pub const COIN_ID_LEN: usize = 16;

/// A coin's globally unique identifier, chosen before blinding and embedded
/// in the signed representative.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CoinId(pub [u8; COIN_ID_LEN]);

impl CoinId {
    pub fn random<R: CryptoRngCore + ?Sized>(rng: &mut R) -> Result<Self, Error> {
        let mut id = [0u8; COIN_ID_LEN];
        rng.try_fill_bytes(&mut id)
            .map_err(|_| Error::RandomSource)?;
        Ok(CoinId(id))
    }
}

impl AsRef<[u8]> for CoinId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Wire message 1: the blinded value to be signed, nothing else.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CoinRequest(pub BlindedValue);

impl AsRef<[u8]> for CoinRequest {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

/// An issued coin: identifier plus the unblinded signature over it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Coin {
    pub id: CoinId,
    pub signature: Signature,
}

impl Coin {
    /// Third-party verification, requiring only the signer's public key.
    pub fn verify(&self, pk: &PublicKey, options: &Options) -> bool {
        pk.verify(&self.signature, self.id, options)
    }
}

/// The signing side of the protocol, e.g. the issuing bank.
///
/// Implementations must treat the blinded value opaquely; authorization
/// checks (account debiting and the like) happen before `sign` is called.
pub trait Signer {
    fn public_key(&self) -> &PublicKey;

    fn sign(&self, request: &CoinRequest) -> Result<BlindSignature, Error>;
}

/// An in-process signer holding the key pair directly.
#[derive(Clone, Debug, new)]
pub struct LocalSigner {
    keypair: KeyPair,
}

impl Signer for LocalSigner {
    fn public_key(&self) -> &PublicKey {
        &self.keypair.pk
    }

    fn sign(&self, request: &CoinRequest) -> Result<BlindSignature, Error> {
        self.keypair.sk.blind_sign(&request.0)
    }
}

/// A coin in the making: the requester's identifier and one-time blinding
/// factor, bound to the signer's public key.
#[derive(Debug)]
pub struct Protocoin {
    id: CoinId,
    factor: BlindingFactor,
    pk: PublicKey,
    options: Options,
}

impl Protocoin {
    /// Draw a fresh coin identifier and blinding factor for the given
    /// signer.
    pub fn new<R: CryptoRngCore + ?Sized>(
        rng: &mut R,
        pk: &PublicKey,
        options: &Options,
    ) -> Result<Self, Error> {
        let id = CoinId::random(rng)?;
        let factor = BlindingFactor::generate(rng, pk)?;
        Ok(Protocoin {
            id,
            factor,
            pk: pk.clone(),
            options: options.clone(),
        })
    }

    pub fn id(&self) -> CoinId {
        self.id
    }

    /// PSS-encode the identifier and blind the encoded representative.
    pub fn coin_request<R: CryptoRngCore + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<CoinRequest, Error> {
        let em_bits = self.pk.0.size() * 8 - 1;
        let encoded = pss::encode(rng, self.id.as_ref(), em_bits, &self.options)?;
        let blinded = blind(&self.pk, &encoded, &self.factor)?;
        Ok(CoinRequest(blinded))
    }

    /// Unblind the signer's response and produce the finished coin.
    ///
    /// Consumes the protocoin, retiring its blinding factor. The unblinded
    /// signature is checked against the signer's public key before the coin
    /// is handed out; no coin is produced on failure.
    pub fn into_coin(self, blind_sig: &BlindSignature) -> Result<Coin, Error> {
        let signature = unblind(&self.pk, blind_sig, &self.factor)?;
        if !self.pk.verify(&signature, self.id, &self.options) {
            return Err(Error::Verification);
        }
        Ok(Coin {
            id: self.id,
            signature,
        })
    }
}
