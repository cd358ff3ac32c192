//! Random resource names and passwords
//!
//! The random source is injected so tests can seed it.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

const NAME_ALPHABET: &str = "1234567890abcdefghijklmnopqrstuvwxyz";
const DIGITS: &str = "1234567890";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generated names share this prefix
pub const NAME_PREFIX: &str = "sdk";

#[derive(Debug, Clone)]
pub struct NameGenerator<R> {
    rng: R,
}

impl NameGenerator<StdRng> {
    /// Generator seeded from OS entropy
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Deterministic generator
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> NameGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// `sdk` followed by 12 lowercase alphanumerics
    pub fn name(&mut self) -> String {
        format!("{}{}", NAME_PREFIX, self.string(12, NAME_ALPHABET))
    }

    /// 59 characters mixing digits, lower and upper case
    ///
    /// Builds 20 of each class, rotates at a random index `i` in `1..=58`,
    /// and drops the character just before `i`.
    pub fn password(&mut self) -> String {
        let pw: Vec<char> = [
            self.string(20, DIGITS),
            self.string(20, LOWER),
            self.string(20, UPPER),
        ]
        .concat()
        .chars()
        .collect();

        let i = self.rng.gen_range(1..pw.len() - 1);
        pw[i..].iter().chain(&pw[..i - 1]).collect()
    }

    /// `length` characters drawn uniformly from `alphabet`
    pub fn string(&mut self, length: usize, alphabet: &str) -> String {
        let chars: Vec<char> = alphabet.chars().collect();
        if chars.is_empty() {
            return String::new();
        }
        (0..length)
            .map(|_| chars[self.rng.gen_range(0..chars.len())])
            .collect()
    }

    /// Uniform choice from `items`, drawn from the same source
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            Some(&items[self.rng.gen_range(0..items.len())])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_shape() {
        let mut names = NameGenerator::seeded(7);
        let name = names.name();
        assert_eq!(name.len(), 15);
        assert!(name.starts_with("sdk"));
        assert!(name[3..].chars().all(|c| NAME_ALPHABET.contains(c)));
    }

    #[test]
    fn test_password_shape() {
        let mut names = NameGenerator::seeded(42);
        for _ in 0..50 {
            let pw = names.password();
            assert_eq!(pw.chars().count(), 59);
            assert!(pw.chars().any(|c| c.is_ascii_digit()));
            assert!(pw.chars().any(|c| c.is_ascii_lowercase()));
            assert!(pw.chars().any(|c| c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_seeded_generators_agree() {
        let mut a = NameGenerator::seeded(99);
        let mut b = NameGenerator::seeded(99);
        assert_eq!(a.name(), b.name());
        assert_eq!(a.password(), b.password());
    }

    #[test]
    fn test_consecutive_names_differ() {
        let mut names = NameGenerator::seeded(1);
        assert_ne!(names.name(), names.name());
    }

    #[test]
    fn test_pick() {
        let mut names = NameGenerator::seeded(3);
        let empty: [u8; 0] = [];
        assert!(names.pick(&empty).is_none());
        assert_eq!(names.pick(&[5]), Some(&5));
        let items = ["a", "b", "c"];
        assert!(items.contains(names.pick(&items).unwrap()));
    }

    #[test]
    fn test_string_with_empty_alphabet() {
        let mut names = NameGenerator::seeded(3);
        assert_eq!(names.string(4, ""), "");
        assert_eq!(names.string(4, "x"), "xxxx");
    }
}
