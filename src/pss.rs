//! EMSA-PSS message encoding.
//!
//! The encoded representative is what gets blinded, so both sides must
//! reconstruct byte-identical values: eight zero prefix bytes, then
//! `H' = Hash(prefix || Hash(msg) || salt)`, a data block
//! `PS || 0x01 || salt` masked with MGF1(H'), the excess leftmost bits
//! cleared, and a 0xBC trailer.

use digest::DynDigest;
use rsa::rand_core::CryptoRngCore;

use crate::mgf1::mgf1_xor;
use crate::{EncodedMessage, Error, Options};

/// Encode `msg` into an `em_bits`-bit PSS representative with a fresh salt.
pub fn encode<R: CryptoRngCore + ?Sized>(
    rng: &mut R,
    msg: &[u8],
    em_bits: usize,
    options: &Options,
) -> Result<EncodedMessage, Error> {
    let m_hash = options.hash().digest(msg);
    let mut salt = vec![0u8; options.salt_len()];
    rng.try_fill_bytes(&mut salt)
        .map_err(|_| Error::RandomSource)?;
    let mut hasher = options.hash().new_hasher();
    emsa_pss_encode(&m_hash, em_bits, &salt, hasher.as_mut()).map(EncodedMessage)
}

/// Check that `encoded` is a valid PSS representative for `msg`.
///
/// Returns false on any mismatch, structural or cryptographic; the reason
/// is deliberately not reported.
pub fn verify(msg: &[u8], encoded: &EncodedMessage, em_bits: usize, options: &Options) -> bool {
    let m_hash = options.hash().digest(msg);
    let mut hasher = options.hash().new_hasher();
    emsa_pss_verify(
        &m_hash,
        encoded.as_ref(),
        em_bits,
        options.salt_len(),
        hasher.as_mut(),
    )
}

fn emsa_pss_encode(
    m_hash: &[u8],
    em_bits: usize,
    salt: &[u8],
    hash: &mut dyn DynDigest,
) -> Result<Vec<u8>, Error> {
    let h_len = hash.output_size();
    let s_len = salt.len();
    let em_len = (em_bits + 7) / 8;
    if m_hash.len() != h_len {
        return Err(Error::Internal);
    }
    if em_len < h_len + s_len + 2 {
        return Err(Error::MessageTooLong);
    }
    let mut em = vec![0u8; em_len];
    let (db, rest) = em.split_at_mut(em_len - h_len - 1);
    let h = &mut rest[..h_len];

    let prefix = [0u8; 8];
    hash.update(&prefix);
    hash.update(m_hash);
    hash.update(salt);
    h.copy_from_slice(&hash.finalize_reset());

    db[em_len - s_len - h_len - 2] = 0x01;
    db[em_len - s_len - h_len - 1..].copy_from_slice(salt);
    mgf1_xor(db, hash, h);
    db[0] &= 0xFF >> (8 * em_len - em_bits);
    em[em_len - 1] = 0xBC;
    Ok(em)
}

fn emsa_pss_verify(
    m_hash: &[u8],
    em: &[u8],
    em_bits: usize,
    s_len: usize,
    hash: &mut dyn DynDigest,
) -> bool {
    let h_len = hash.output_size();
    let em_len = (em_bits + 7) / 8;
    if em.len() != em_len || m_hash.len() != h_len || em_len < h_len + s_len + 2 {
        return false;
    }
    if em[em_len - 1] != 0xBC {
        return false;
    }
    let (masked_db, rest) = em.split_at(em_len - h_len - 1);
    let h = &rest[..h_len];
    let top_mask = 0xFFu8 >> (8 * em_len - em_bits);
    if masked_db[0] & !top_mask != 0 {
        return false;
    }

    let mut db = masked_db.to_vec();
    mgf1_xor(&mut db, hash, h);
    db[0] &= top_mask;

    // The remaining checks all feed one accumulator so that a wrong padding
    // byte and a wrong recovered hash are indistinguishable to the caller.
    let ps_len = em_len - h_len - s_len - 2;
    let mut diff = 0u8;
    for &b in &db[..ps_len] {
        diff |= b;
    }
    diff |= db[ps_len] ^ 0x01;

    let salt = &db[ps_len + 1..];
    let prefix = [0u8; 8];
    hash.update(&prefix);
    hash.update(m_hash);
    hash.update(salt);
    let expected = hash.finalize_reset();
    for (a, b) in h.iter().zip(expected.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Hash;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const EM_BITS: usize = 2047;

    #[test]
    fn encode_verify_round_trip_all_hashes() {
        let rng = &mut StdRng::seed_from_u64(1);
        for hash in [Hash::Sha256, Hash::Sha384, Hash::Sha512] {
            let options = Options::new(hash, hash.output_size());
            let encoded = encode(rng, b"coin id", EM_BITS, &options).unwrap();
            assert_eq!(encoded.len(), (EM_BITS + 7) / 8);
            assert!(verify(b"coin id", &encoded, EM_BITS, &options));
            assert!(!verify(b"other id", &encoded, EM_BITS, &options));
        }
    }

    #[test]
    fn zero_salt_round_trip() {
        let rng = &mut StdRng::seed_from_u64(2);
        let options = Options::new(Hash::Sha384, 0);
        let encoded = encode(rng, b"deterministic", EM_BITS, &options).unwrap();
        assert!(verify(b"deterministic", &encoded, EM_BITS, &options));
    }

    #[test]
    fn any_corrupted_byte_fails_verification() {
        let rng = &mut StdRng::seed_from_u64(3);
        let options = Options::default();
        let encoded = encode(rng, b"coin id", EM_BITS, &options).unwrap();
        for i in 0..encoded.len() {
            let mut tampered = encoded.clone();
            tampered.0[i] ^= 0x40;
            assert!(
                !verify(b"coin id", &tampered, EM_BITS, &options),
                "byte {} accepted after corruption",
                i
            );
        }
    }

    #[test]
    fn wrong_length_fails_verification() {
        let rng = &mut StdRng::seed_from_u64(4);
        let options = Options::default();
        let encoded = encode(rng, b"coin id", EM_BITS, &options).unwrap();
        let mut truncated = encoded.0.clone();
        truncated.pop();
        assert!(!verify(
            b"coin id",
            &EncodedMessage(truncated),
            EM_BITS,
            &options
        ));
    }

    #[test]
    fn modulus_too_small_is_rejected() {
        let rng = &mut StdRng::seed_from_u64(5);
        let options = Options::default();
        // SHA-384 digest + salt + framing needs 98 bytes.
        assert_eq!(
            encode(rng, b"coin id", 97 * 8, &options).err(),
            Some(Error::MessageTooLong)
        );
        assert!(encode(rng, b"coin id", 98 * 8 - 1, &options).is_ok());
    }
}
