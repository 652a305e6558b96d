//! Blinding factors and the blind/unblind transform.
//!
//! Blinding multiplies the encoded representative by `r^e mod N`. The
//! signer's private exponentiation then yields `(m^e-preimage) * r mod N`,
//! and multiplying by `r^-1` leaves exactly the signature the signer would
//! have produced over the representative itself.

use num_integer::Integer;
use num_traits::{One, Zero};
use rsa::rand_core::CryptoRngCore;
use rsa::traits::PublicKeyParts as _;
use rsa::BigUint;

use crate::num_padding::ToBytesPadded;
use crate::{BlindSignature, BlindedValue, EncodedMessage, Error, PublicKey, Signature};

// Non-invertible draws are vanishingly rare for a two-prime modulus; the cap
// only guards against a degenerate modulus.
const MAX_DRAWS: usize = 128;

/// A one-time blinding factor bound to a signer's public key.
///
/// Holds both `r` and `r^-1 mod N`, computed in the same extended-Euclid
/// pass that establishes coprimality. Deliberately not `Clone`: a factor
/// must never be used for more than one request.
#[derive(Debug)]
pub struct BlindingFactor {
    r: BigUint,
    r_inv: BigUint,
}

impl BlindingFactor {
    /// Draw a fresh factor `r` in `[2, N-1]` with `gcd(r, N) = 1`,
    /// regenerating on the (negligible) non-invertible draws.
    pub fn generate<R: CryptoRngCore + ?Sized>(
        rng: &mut R,
        pk: &PublicKey,
    ) -> Result<BlindingFactor, Error> {
        let n = pk.0.n();
        let two = BigUint::from(2u8);
        for _ in 0..MAX_DRAWS {
            let r = random_below(rng, n)?;
            if r < two {
                continue;
            }
            if let Some(r_inv) = mod_inverse(&r, n) {
                return Ok(BlindingFactor { r, r_inv });
            }
        }
        Err(Error::Internal)
    }
}

/// Blind an encoded representative: `c = m * r^e mod N`.
pub fn blind(
    pk: &PublicKey,
    encoded: &EncodedMessage,
    factor: &BlindingFactor,
) -> Result<BlindedValue, Error> {
    let n = pk.0.n();
    let m = BigUint::from_bytes_be(encoded.as_ref());
    if &m >= n {
        return Err(Error::InputTooLarge);
    }
    let mask = factor.r.modpow(pk.0.e(), n);
    let blinded = (&m * &mask) % n;
    Ok(BlindedValue(blinded.to_bytes_be_padded(pk.0.size())))
}

/// Remove the blinding from a blind signature: `s = s' * r^-1 mod N`.
pub fn unblind(
    pk: &PublicKey,
    blind_sig: &BlindSignature,
    factor: &BlindingFactor,
) -> Result<Signature, Error> {
    let modulus_bytes = pk.0.size();
    if blind_sig.len() != modulus_bytes {
        return Err(Error::InputTooLarge);
    }
    let s = BigUint::from_bytes_be(blind_sig.as_ref());
    if &s >= pk.0.n() {
        return Err(Error::InputTooLarge);
    }
    let sig = (&s * &factor.r_inv) % pk.0.n();
    Ok(Signature(sig.to_bytes_be_padded(modulus_bytes)))
}

/// Uniform draw in `[0, n)` by rejection sampling full-width candidates.
fn random_below<R: CryptoRngCore + ?Sized>(rng: &mut R, n: &BigUint) -> Result<BigUint, Error> {
    let bits = n.bits();
    let len = (bits + 7) / 8;
    let excess = 8 * len - bits;
    let mut buf = vec![0u8; len];
    loop {
        rng.try_fill_bytes(&mut buf)
            .map_err(|_| Error::RandomSource)?;
        buf[0] &= 0xFF >> excess;
        let candidate = BigUint::from_bytes_be(&buf);
        if &candidate < n {
            return Ok(candidate);
        }
    }
}

/// Modular inverse via the extended Euclidean algorithm, tracking signs
/// separately since `BigUint` is unsigned. Returns `None` when
/// `gcd(a, n) != 1`.
fn mod_inverse(a: &BigUint, n: &BigUint) -> Option<BigUint> {
    let mut t = BigUint::zero();
    let mut t_neg = false;
    let mut new_t = BigUint::one();
    let mut new_t_neg = false;
    let mut r = n.clone();
    let mut new_r = a.clone();

    while !new_r.is_zero() {
        let (q, rem) = r.div_rem(&new_r);
        let qt = &q * &new_t;
        let (next_t, next_t_neg) = if t_neg == new_t_neg {
            if t >= qt {
                (t - &qt, t_neg)
            } else {
                (&qt - t, !t_neg)
            }
        } else {
            (t + &qt, t_neg)
        };
        t = new_t;
        t_neg = new_t_neg;
        new_t = next_t;
        new_t_neg = next_t_neg;
        r = new_r;
        new_r = rem;
    }

    if !r.is_one() {
        return None;
    }
    Some(if t_neg { n - &t } else { t })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn small_inverses() {
        let inv = |a: u32, n: u32| mod_inverse(&BigUint::from(a), &BigUint::from(n));
        assert_eq!(inv(3, 10), Some(BigUint::from(7u32)));
        assert_eq!(inv(7, 26), Some(BigUint::from(15u32)));
        assert_eq!(inv(5, 10), None);
        assert_eq!(inv(0, 10), None);
    }

    #[test]
    fn draws_stay_below_modulus() {
        let rng = &mut StdRng::seed_from_u64(11);
        let n = BigUint::from(0x1_0000_0001u64);
        for _ in 0..200 {
            assert!(random_below(rng, &n).unwrap() < n);
        }
    }

    // A modulus made of many small odd primes makes non-coprime draws
    // frequent, so the regeneration loop is actually exercised.
    #[test]
    fn factors_are_invertible_for_smooth_modulus() {
        let rng = &mut StdRng::seed_from_u64(12);
        let primes: [u32; 21] = [
            3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79,
        ];
        let mut n = BigUint::one();
        for p in primes {
            n *= BigUint::from(p);
        }
        let one = BigUint::one();
        for _ in 0..50 {
            let r = loop {
                let candidate = random_below(rng, &n).unwrap();
                if candidate >= BigUint::from(2u8) {
                    if let Some(r_inv) = mod_inverse(&candidate, &n) {
                        assert_eq!((&candidate * &r_inv) % &n, one);
                        break candidate;
                    }
                }
            };
            for p in primes {
                assert!(!(&r % BigUint::from(p)).is_zero());
            }
        }
    }
}
