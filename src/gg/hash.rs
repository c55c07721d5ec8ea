// Login hash
// The two password hashes a LOGIN80 frame can carry.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use super::consts::{GG_LOGIN_HASH_GG32, GG_LOGIN_HASH_LEN, GG_LOGIN_HASH_SHA1};

/// Hash algorithm used to answer the welcome seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashType {
    /// Legacy 32-bit checksum hash.
    Gg32,
    #[default]
    Sha1,
}

impl HashType {
    pub fn code(self) -> u8 {
        match self {
            HashType::Gg32 => GG_LOGIN_HASH_GG32,
            HashType::Sha1 => GG_LOGIN_HASH_SHA1,
        }
    }
}

/// The legacy GG32 hash of `password` salted with `seed`.
pub fn gg32_hash(password: &[u8], seed: u32) -> u32 {
    let mut x: u32 = 0;
    let mut y: u32 = seed;

    for &c in password {
        x = (x & 0xffff_ff00) | u32::from(c);
        y ^= x;
        y = y.wrapping_add(x);
        x <<= 8;
        y ^= x;
        x <<= 8;
        y = y.wrapping_sub(x);
        x <<= 8;
        y ^= x;

        let z = y & 0x1f;
        y = y.rotate_left(z);
    }

    y
}

/// SHA-1 over the password followed by the little-endian seed.
pub fn sha1_hash(password: &[u8], seed: u32) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(password);
    hasher.update(seed.to_le_bytes());
    hasher.finalize().into()
}

/// The zero-padded 64-byte hash field of a login frame.
pub fn login_hash(hash_type: HashType, password: &str, seed: u32) -> [u8; GG_LOGIN_HASH_LEN] {
    let mut field = [0u8; GG_LOGIN_HASH_LEN];
    match hash_type {
        HashType::Gg32 => {
            field[..4].copy_from_slice(&gg32_hash(password.as_bytes(), seed).to_le_bytes());
        }
        HashType::Sha1 => {
            field[..20].copy_from_slice(&sha1_hash(password.as_bytes(), seed));
        }
    }
    field
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gg32_empty_password_is_seed() {
        assert_eq!(gg32_hash(b"", 0x1234_5678), 0x1234_5678);
    }

    #[test]
    fn test_gg32_single_byte() {
        // x = 'a'; y ^= x; y += x; the shifted x values only touch the high
        // bytes, then y is rotated by its low five bits
        let seed = 0u32;
        let mut y = seed ^ 0x61;
        y = y.wrapping_add(0x61);
        y ^= 0x6100;
        y = y.wrapping_sub(0x61_0000);
        y ^= 0x6100_0000;
        let expected = y.rotate_left(y & 0x1f);
        assert_eq!(gg32_hash(b"a", seed), expected);
    }

    #[test]
    fn test_gg32_depends_on_seed() {
        assert_ne!(gg32_hash(b"haslo", 1), gg32_hash(b"haslo", 2));
    }

    #[test]
    fn test_sha1_hash_matches_digest_of_password_and_seed() {
        let mut input = b"secret".to_vec();
        input.extend_from_slice(&0xcafe_babeu32.to_le_bytes());
        let expected: [u8; 20] = Sha1::digest(&input).into();
        assert_eq!(sha1_hash(b"secret", 0xcafe_babe), expected);
    }

    #[test]
    fn test_sha1_known_vector_without_seed_bytes() {
        // sha1("abc") with an all-zero seed is sha1("abc\0\0\0\0"), make sure
        // the seed really is appended
        let plain: [u8; 20] = Sha1::digest(b"abc").into();
        assert_ne!(sha1_hash(b"abc", 0), plain);
        assert_eq!(
            hex::encode(plain),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_login_hash_field_is_zero_padded() {
        let field = login_hash(HashType::Gg32, "pass", 7);
        assert_eq!(&field[..4], &gg32_hash(b"pass", 7).to_le_bytes());
        assert!(field[4..].iter().all(|&b| b == 0));

        let field = login_hash(HashType::Sha1, "pass", 7);
        assert_eq!(&field[..20], &sha1_hash(b"pass", 7));
        assert!(field[20..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_hash_type_serde_names() {
        assert_eq!(serde_json::to_string(&HashType::Gg32).unwrap(), "\"gg32\"");
        let parsed: HashType = serde_json::from_str("\"sha1\"").unwrap();
        assert_eq!(parsed, HashType::Sha1);
    }
}
