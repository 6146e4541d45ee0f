/// Key used when the deployment does not configure one.
pub const DEFAULT_SHIFT: i64 = 4;

/// Which way a transform pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Character substitution over three independent alphabets: `A-Z` and `a-z`
/// rotate modulo 26, `0-9` rotates modulo 10. Everything else passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftCipher {
    key: i64,
}

impl ShiftCipher {
    pub fn new(key: i64) -> Self {
        Self { key }
    }

    pub fn key(&self) -> i64 {
        self.key
    }

    pub fn encrypt(&self, text: &str) -> String {
        self.transform(text, Direction::Encrypt)
    }

    pub fn decrypt(&self, text: &str) -> String {
        self.transform(text, Direction::Decrypt)
    }

    /// Run one pass over `text`. Empty input comes back empty.
    pub fn transform(&self, text: &str, direction: Direction) -> String {
        if text.is_empty() {
            return String::new();
        }

        // 130 is a common multiple of both alphabet sizes.
        let key = self.key.rem_euclid(130);
        let delta = match direction {
            Direction::Encrypt => key,
            Direction::Decrypt => -key,
        };

        text.chars().map(|c| shift_char(c, delta)).collect()
    }
}

impl Default for ShiftCipher {
    fn default() -> Self {
        Self::new(DEFAULT_SHIFT)
    }
}

fn shift_char(c: char, delta: i64) -> char {
    match c {
        'A'..='Z' => rotate(c, b'A', 26, delta),
        'a'..='z' => rotate(c, b'a', 26, delta),
        '0'..='9' => rotate(c, b'0', 10, delta),
        _ => c,
    }
}

fn rotate(c: char, base: u8, len: i64, delta: i64) -> char {
    // `c` is ASCII here, so the byte cast is lossless.
    let offset = (c as u8 - base) as i64;
    let shifted = (offset + delta).rem_euclid(len) as u8;
    (base + shifted) as char
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "",
        "Hello",
        "Hello, World! 2024",
        "xyz XYZ 789",
        "already-encrypted? Lipps",
        "émojis 🎉 and ümlauts stay put",
        "tabs\tand\nnewlines",
        "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ",
    ];

    #[test]
    fn hello_with_default_shift() {
        let cipher = ShiftCipher::default();
        assert_eq!(cipher.encrypt("Hello"), "Lipps");
        assert_eq!(cipher.decrypt("Lipps"), "Hello");
    }

    #[test]
    fn wraps_each_alphabet() {
        let cipher = ShiftCipher::new(4);
        assert_eq!(cipher.encrypt("xyz"), "bcd");
        assert_eq!(cipher.encrypt("XYZ"), "BCD");
        assert_eq!(cipher.encrypt("789"), "123");
    }

    #[test]
    fn decrypt_inverts_encrypt_for_many_keys() {
        for key in [i64::MIN, -53, -4, 0, 1, 4, 13, 26, 27, 100, i64::MAX] {
            let cipher = ShiftCipher::new(key);
            for sample in SAMPLES {
                let round = cipher.decrypt(&cipher.encrypt(sample));
                assert_eq!(&round, sample, "key {key}");
            }
        }
    }

    #[test]
    fn output_characters_keep_their_class() {
        let cipher = ShiftCipher::new(7);
        for sample in SAMPLES {
            let out = cipher.encrypt(sample);
            assert_eq!(out.chars().count(), sample.chars().count());
            for (before, after) in sample.chars().zip(out.chars()) {
                if before.is_ascii_uppercase() {
                    assert!(after.is_ascii_uppercase());
                } else if before.is_ascii_lowercase() {
                    assert!(after.is_ascii_lowercase());
                } else if before.is_ascii_digit() {
                    assert!(after.is_ascii_digit());
                } else {
                    assert_eq!(before, after);
                }
            }
        }
    }

    #[test]
    fn zero_key_is_identity() {
        let cipher = ShiftCipher::new(0);
        assert_eq!(cipher.encrypt("Same 123"), "Same 123");
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let cipher = ShiftCipher::default();
        assert_eq!(cipher.encrypt(""), "");
        assert_eq!(cipher.decrypt(""), "");
    }
}
