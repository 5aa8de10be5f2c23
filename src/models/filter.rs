use serde::{Deserialize, Serialize};

/// Bitmap feature predicate applied to a posting's feature word.
///
/// A document's bits satisfy the filter iff every bit of `on_flag` is set,
/// no bit of `off_flag` is set, and for every non-zero mask in `or_flags`
/// at least one of its bits is set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BitsFilter {
    pub on_flag: u64,
    pub off_flag: u64,
    pub or_flags: Vec<u64>,
}

impl BitsFilter {
    pub fn new(on_flag: u64, off_flag: u64, or_flags: &[u64]) -> Self {
        Self {
            on_flag,
            off_flag,
            or_flags: or_flags.to_vec(),
        }
    }

    pub fn matches(&self, bits: u64) -> bool {
        if bits & self.on_flag != self.on_flag {
            return false;
        }
        if bits & self.off_flag != 0 {
            return false;
        }
        for &or_flag in &self.or_flags {
            if or_flag != 0 && bits & or_flag == 0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_on_flag_requires_all_bits() {
        let f = BitsFilter::new(0b0011, 0, &[]);
        assert!(f.matches(0b0111));
        assert!(!f.matches(0b0001));
    }

    #[test]
    fn test_off_flag_rejects_any_bit() {
        let f = BitsFilter::new(0, 0b0100, &[]);
        assert!(f.matches(0b0011));
        assert!(!f.matches(0b0110));
    }

    #[test]
    fn test_or_flags_need_one_bit_each() {
        let f = BitsFilter::new(0, 0, &[0b0011, 0b1100]);
        assert!(f.matches(0b0101));
        assert!(!f.matches(0b0001));
    }

    #[test]
    fn test_zero_or_flag_is_ignored() {
        let f = BitsFilter::new(0, 0, &[0]);
        assert!(f.matches(0));
    }

    // Exhaustive check of the predicate algebra over a small bit universe.
    #[test]
    fn test_predicate_algebra() {
        let masks: [u64; 4] = [0b0000, 0b0001, 0b0110, 0b1010];
        for &bits in &masks {
            for &on in &masks {
                for &off in &masks {
                    for &a in &masks {
                        for &b in &masks {
                            let or_flags = vec![a, b];
                            let f = BitsFilter::new(on, off, &or_flags);
                            let expected = (bits & on) == on
                                && (bits & off) == 0
                                && or_flags.iter().all(|&m| m == 0 || bits & m != 0);
                            assert_eq!(f.matches(bits), expected);
                        }
                    }
                }
            }
        }
    }
}
