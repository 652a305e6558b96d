use digest::DynDigest;

/// MGF1: expand `seed` with `hash` and XOR the resulting mask into `dst`.
pub fn mgf1_xor(dst: &mut [u8], hash: &mut dyn DynDigest, seed: &[u8]) {
    let mut counter: u32 = 0;
    let mut offset = 0;
    while offset < dst.len() {
        let mut h = hash.box_clone();
        h.update(seed);
        h.update(&counter.to_be_bytes());
        let block = h.finalize_reset();

        for (d, m) in dst[offset..].iter_mut().zip(block.iter()) {
            *d ^= m;
        }

        offset += block.len();
        counter = counter.wrapping_add(1);
    }
}
