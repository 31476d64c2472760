use super::CursorError;

const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const NO_VALUE: u8 = 255;
const BITS_PER_CHAR: usize = 5;

/// Lookup table for Crockford base32 decoding
const LOOKUP: [u8; 256] = {
    let mut lut = [NO_VALUE; 256];
    let mut i = 0_u8;
    // Main alphabet, allow lower-case
    while i < 32 {
        let c = ALPHABET[i as usize];
        lut[c as usize] = i;
        if c.is_ascii_uppercase() {
            lut[(c + 32) as usize] = i;
        }
        i += 1;
    }
    // Crockford-specific aliases
    lut[b'O' as usize] = 0;
    lut[b'o' as usize] = 0;
    lut[b'I' as usize] = 1;
    lut[b'i' as usize] = 1;
    lut[b'L' as usize] = 1;
    lut[b'l' as usize] = 1;
    lut
};

/// Number of Base32 characters needed to carry `bytes` bytes.
pub(crate) const fn encoded_len(bytes: usize) -> usize {
    (bytes * 8).div_ceil(BITS_PER_CHAR)
}

/// Encodes `input` into Crockford base32, writing exactly
/// `encoded_len(input.len())` characters into `buf`.
///
/// The leading character carries the zero padding bits, so the output is
/// fixed-width and sorts like the big-endian input.
pub(crate) fn encode_base32(input: &[u8], buf: &mut [u8]) {
    debug_assert_eq!(buf.len(), encoded_len(input.len()));

    let mut bits = buf.len() * BITS_PER_CHAR - input.len() * 8;
    let mut acc = 0_u16;
    let mask = 0x1F;

    let mut out = 0;
    for &b in input {
        acc = (acc << 8) | u16::from(b);
        bits += 8;
        while bits >= BITS_PER_CHAR {
            bits -= BITS_PER_CHAR;
            buf[out] = ALPHABET[usize::from((acc >> bits) & mask)];
            out += 1;
        }
    }
}

/// Decodes a fixed-width Crockford base32 string into `out`.
///
/// The input length must be exactly `encoded_len(out.len())` and the padding
/// bits carried by the first character must be zero.
pub(crate) fn decode_base32(encoded: &[u8], out: &mut [u8]) -> Result<(), CursorError> {
    let expected = encoded_len(out.len());
    if encoded.len() != expected {
        return Err(CursorError::InvalidLength {
            len: encoded.len(),
            expected,
        });
    }

    let pad = expected * BITS_PER_CHAR - out.len() * 8;
    let mut acc = 0_u16;
    let mut bits = 0_usize;
    let mut pos = 0;

    for (index, &byte) in encoded.iter().enumerate() {
        let val = LOOKUP[usize::from(byte)];
        if val == NO_VALUE {
            return Err(CursorError::InvalidCharacter { byte, index });
        }

        if index == 0 {
            if val >> (BITS_PER_CHAR - pad) != 0 {
                return Err(CursorError::NonCanonical);
            }
            acc = u16::from(val);
            bits = BITS_PER_CHAR - pad;
        } else {
            acc = (acc << BITS_PER_CHAR) | u16::from(val);
            bits += BITS_PER_CHAR;
        }

        while bits >= 8 {
            bits -= 8;
            out[pos] = (acc >> bits) as u8;
            pos += 1;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<const N: usize>(input: [u8; N]) {
        let mut buf = vec![0_u8; encoded_len(N)];
        encode_base32(&input, &mut buf);
        let mut decoded = [0_u8; N];
        decode_base32(&buf, &mut decoded).unwrap();
        assert_eq!(input, decoded, "roundtrip for {input:?}");
    }

    #[test]
    fn encode_decode_preserves_bytes() {
        roundtrip([0_u8; 8]);
        roundtrip([0xFF_u8; 8]);
        roundtrip(u64::MAX.to_be_bytes());
        roundtrip(0x0123_4567_89AB_CDEF_u64.to_be_bytes());
        roundtrip([0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA, 0x99, 0x88]);
    }

    #[test]
    fn encoding_matches_known_value() {
        let mut buf = [0_u8; 13];
        encode_base32(&2_424_242_424_242_424_242_u64.to_be_bytes(), &mut buf);
        assert_eq!(&buf, b"23953MG16DJDJ");
    }

    #[test]
    fn encoding_preserves_big_endian_order() {
        let mut lo = [0_u8; 13];
        let mut hi = [0_u8; 13];
        encode_base32(&41_u64.to_be_bytes(), &mut lo);
        encode_base32(&42_u64.to_be_bytes(), &mut hi);
        assert!(lo < hi);
    }

    #[test]
    fn decode_accepts_lowercase_and_aliases() {
        let mut out = [0_u8; 8];
        decode_base32(b"23953mg16djdj", &mut out).unwrap();
        assert_eq!(u64::from_be_bytes(out), 2_424_242_424_242_424_242);

        let mut aliased = [0_u8; 8];
        decode_base32(b"oooooooooooOI", &mut aliased).unwrap();
        assert_eq!(u64::from_be_bytes(aliased), 1);
    }

    #[test]
    fn decode_rejects_bad_input() {
        let mut out = [0_u8; 8];
        assert_eq!(
            decode_base32(b"ABC", &mut out),
            Err(CursorError::InvalidLength {
                len: 3,
                expected: 13
            })
        );
        assert_eq!(
            decode_base32(b"000000000000U", &mut out),
            Err(CursorError::InvalidCharacter {
                byte: b'U',
                index: 12
            })
        );
        // u64 leaves 1 padding bit in the first character
        assert_eq!(
            decode_base32(b"G000000000000", &mut out),
            Err(CursorError::NonCanonical)
        );
    }
}
