use rsa::BigUint;

pub trait ToBytesPadded {
    /// Big-endian byte representation of `self`, left-padded with zeroes to
    /// `len` bytes. No padding is added if the representation already has at
    /// least `len` bytes.
    fn to_bytes_be_padded(&self, len: usize) -> Vec<u8>;
}

impl ToBytesPadded for BigUint {
    fn to_bytes_be_padded(&self, len: usize) -> Vec<u8> {
        let bytes = self.to_bytes_be();
        match len.checked_sub(bytes.len()) {
            None | Some(0) => bytes,
            Some(pad) => {
                let mut out = vec![0u8; pad];
                out.extend_from_slice(&bytes);
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_requested_length() {
        let n = BigUint::from(0x0102u32);
        assert_eq!(n.to_bytes_be_padded(4), vec![0, 0, 1, 2]);
        assert_eq!(n.to_bytes_be_padded(2), vec![1, 2]);
        assert_eq!(n.to_bytes_be_padded(1), vec![1, 2]);
    }
}
