use crate::error::{Error, Result};
use jiff::Timestamp;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use std::cell::RefCell;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::fmt;
use tracing::{debug, warn};

/// The default URL-friendly alphabet.
pub const DEFAULT_ABC: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_-";

/// Number of symbols every alphabet must contain.
pub const ABC_LEN: usize = 64;

/// Bits addressed by a single symbol (`2^6 == ABC_LEN`).
const SYMBOL_MASK: u8 = 0x3f;

const MIN_DIGITS: u32 = 4;
const MAX_DIGITS: u32 = 6;

// The Central Randomizer 1.3 (C) 1997 by Paul Houle (houle@msc.cornell.edu).
const LCG_MULTIPLIER: u64 = 9301;
const LCG_INCREMENT: u64 = 49297;
const LCG_MODULUS: u64 = 233280;

/// A seed-shuffled alphabet of 64 unique symbols used to render encoded integers.
///
/// The permutation is produced by a linear congruential generator and is fully
/// determined by the source alphabet and the seed. It is not cryptographically
/// strong and must stay bit-for-bit stable: independent processes sharing an
/// alphabet and a seed rely on computing the same permutation.
#[derive(Clone, PartialEq, Eq)]
pub struct Abc {
    source: Vec<char>,
    seed: u64,
    shuffled: Vec<char>,
}

impl Abc {
    /// Validates `alphabet` (64 unique characters) and `seed` (positive) and
    /// shuffles the alphabet.
    pub fn new(alphabet: &str, seed: u64) -> Result<Self> {
        let source: Vec<char> = alphabet.chars().collect();
        if source.len() != ABC_LEN {
            return Err(Error::InvalidAlphabetLength {
                expected: ABC_LEN,
                found: source.len(),
            });
        }
        let mut seen = HashSet::with_capacity(ABC_LEN);
        if let Some(&symbol) = source.iter().find(|symbol| !seen.insert(**symbol)) {
            return Err(Error::DuplicateSymbol { symbol });
        }
        if seed < 1 {
            return Err(Error::InvalidSeed);
        }

        let shuffled = shuffle(&source, seed);
        Ok(Self {
            source,
            seed,
            shuffled,
        })
    }

    /// The shuffled alphabet as a string.
    pub fn alphabet(&self) -> String {
        self.shuffled.iter().collect()
    }

    /// The seed the current permutation was computed from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Discards the current permutation and recomputes it from the seed.
    pub fn reset(&mut self) {
        self.shuffled = shuffle(&self.source, self.seed);
        debug!(seed = self.seed, "alphabet reset");
    }

    /// Replaces the seed and reshuffles the source alphabet with it.
    pub fn set_seed(&mut self, seed: u64) -> Result<()> {
        if seed < 1 {
            return Err(Error::InvalidSeed);
        }
        self.seed = seed;
        self.reset();
        Ok(())
    }

    /// Returns the symbol at `index` of the shuffled alphabet.
    pub fn lookup(&self, index: usize) -> Result<char> {
        self.shuffled
            .get(index)
            .copied()
            .ok_or(Error::IndexOutOfRange {
                index,
                len: ABC_LEN,
            })
    }

    /// Returns the index of `symbol` in the shuffled alphabet.
    pub fn position(&self, symbol: char) -> Option<usize> {
        self.shuffled.iter().position(|&candidate| candidate == symbol)
    }

    /// Encodes `value` into `nsymbols` symbols, least significant first.
    ///
    /// `digits` in `[4, 6]` is the number of payload bits carried by every
    /// symbol. The remaining `6 - digits` high bits of each symbol index are
    /// random, so with `digits == 6` the encoding is deterministic.
    ///
    /// With `nsymbols == 0` the width is derived from the value. An explicit
    /// width is always honored: unused positions encode zero payload so that
    /// further data can be appended without ambiguity.
    pub fn encode(&self, value: u64, nsymbols: usize, digits: u32) -> Result<Vec<char>> {
        self.encode_with(value, nsymbols, digits, getrandom::fill)
    }

    fn encode_with(
        &self,
        value: u64,
        nsymbols: usize,
        digits: u32,
        secure: impl FnOnce(&mut [u8]) -> std::result::Result<(), getrandom::Error>,
    ) -> Result<Vec<char>> {
        let mask = payload_mask(digits)?;
        let required = required_symbols(value, digits);
        let nsymbols = match nsymbols {
            0 => required,
            provided if provided < required => {
                return Err(Error::InsufficientWidth { required, provided });
            }
            provided => provided,
        };

        let filler = random_filler(nsymbols, SYMBOL_MASK & !mask, secure);
        let symbols = filler
            .iter()
            .enumerate()
            .map(|(position, &random)| {
                let payload = shift_right(value, digits, position) as u8 & mask;
                self.shuffled[usize::from(payload | random)]
            })
            .collect();
        Ok(symbols)
    }

    /// Recovers the payload bits of `symbols` encoded with the same `digits`.
    ///
    /// Random high bits are masked out, so any block produced by
    /// [`Abc::encode`] decodes to its original value.
    pub fn decode(&self, symbols: &[char], digits: u32) -> Result<u64> {
        let mask = payload_mask(digits)?;
        symbols
            .iter()
            .enumerate()
            .try_fold(0_u64, |value, (position, &symbol)| {
                let index = self
                    .position(symbol)
                    .ok_or(Error::UnknownSymbol { symbol })?;
                let payload = u64::from(index as u8 & mask);
                if payload == 0 {
                    return Ok(value);
                }
                let shift = u32::try_from(position)
                    .ok()
                    .and_then(|position| position.checked_mul(digits))
                    .filter(|shift| *shift < u64::BITS)
                    .ok_or(Error::DecodeOverflow)?;
                let shifted = payload << shift;
                if shifted >> shift != payload {
                    return Err(Error::DecodeOverflow);
                }
                Ok(value | shifted)
            })
    }
}

impl Default for Abc {
    fn default() -> Self {
        Self::new(DEFAULT_ABC, 1).expect("default alphabet is valid")
    }
}

impl fmt::Debug for Abc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Abc")
            .field("alphabet", &self.alphabet())
            .field("seed", &self.seed)
            .finish()
    }
}

impl fmt::Display for Abc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Abc{{alphabet='{}'}}", self.alphabet())
    }
}

fn shuffle(source: &[char], seed: u64) -> Vec<char> {
    let mut pool = source.to_vec();
    let mut shuffled = Vec::with_capacity(pool.len());
    let mut seed = seed;
    while pool.len() > 1 {
        // Only the first step can overflow; afterwards the seed stays below the modulus.
        seed = seed
            .wrapping_mul(LCG_MULTIPLIER)
            .wrapping_add(LCG_INCREMENT)
            % LCG_MODULUS;
        let index = (seed * pool.len() as u64 / LCG_MODULUS) as usize;
        shuffled.push(pool.remove(index));
    }
    shuffled.append(&mut pool);
    shuffled
}

fn payload_mask(digits: u32) -> Result<u8> {
    if !(MIN_DIGITS..=MAX_DIGITS).contains(&digits) {
        return Err(Error::InvalidDigits { digits });
    }
    Ok((1_u8 << digits) - 1)
}

fn required_symbols(value: u64, digits: u32) -> usize {
    match value {
        0 => 1,
        value => (value.ilog2() / digits) as usize + 1,
    }
}

/// `value >> (digits * position)`, zero once the shift passes the word size.
fn shift_right(value: u64, digits: u32, position: usize) -> u64 {
    u32::try_from(position)
        .ok()
        .and_then(|position| position.checked_mul(digits))
        .and_then(|shift| value.checked_shr(shift))
        .unwrap_or(0)
}

thread_local! {
    static FALLBACK_RNG: RefCell<SmallRng> = RefCell::new(fallback_rng());
}

fn fallback_rng() -> SmallRng {
    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    let nanos = Timestamp::now().as_nanosecond() as u64;
    SmallRng::seed_from_u64(nanos ^ hasher.finish())
}

/// `len` random bytes masked to `mask`, drawn from `secure` or, when that
/// fails, from a per-thread non-cryptographic generator.
fn random_filler(
    len: usize,
    mask: u8,
    secure: impl FnOnce(&mut [u8]) -> std::result::Result<(), getrandom::Error>,
) -> Vec<u8> {
    let mut bytes = vec![0_u8; len];
    if mask == 0 {
        return bytes;
    }
    if let Err(err) = secure(&mut bytes) {
        warn!(error = %err, "secure random source unavailable, using fallback generator");
        FALLBACK_RNG.with(|rng| rng.borrow_mut().fill_bytes(&mut bytes));
    }
    for byte in bytes.iter_mut() {
        *byte &= mask;
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED_1: &str = "gzmZM7VINvOFcpho01x-fYPs8Q_urjq6RkiWGn4SHDdK5t2TAJbaBLEyUwlX9C3e";
    const SEED_345234: &str = "U8dEc3Hnuq_RfyDApaT1ZxQmYePBCNMkF4-KJSvhjw609I7GlbzsriOL52XVoWgt";

    #[test]
    fn shuffle_is_seed_dependent_and_reproducible() {
        assert_eq!(Abc::new(DEFAULT_ABC, 1).unwrap().alphabet(), SEED_1);
        assert_eq!(Abc::new(DEFAULT_ABC, 345234).unwrap().alphabet(), SEED_345234);
        assert_eq!(Abc::default().alphabet(), SEED_1);
    }

    #[test]
    fn shuffle_is_a_permutation_of_the_source() {
        let mut expected: Vec<char> = DEFAULT_ABC.chars().collect();
        expected.sort_unstable();
        for seed in (1..=100_000).step_by(997) {
            let abc = Abc::new(DEFAULT_ABC, seed).unwrap();
            let mut shuffled: Vec<char> = abc.alphabet().chars().collect();
            shuffled.sort_unstable();
            assert_eq!(shuffled, expected, "seed {seed}");
        }
    }

    #[test]
    fn huge_seeds_are_accepted() {
        let abc = Abc::new(DEFAULT_ABC, u64::MAX).unwrap();
        assert_eq!(abc.alphabet().chars().count(), ABC_LEN);
    }

    #[test]
    fn custom_unicode_alphabet() {
        let hiragana: String = (0x3041_u32..0x3041 + 64).filter_map(char::from_u32).collect();
        let abc = Abc::new(&hiragana, 42).unwrap();
        let shuffled = abc.alphabet();
        assert_ne!(shuffled, hiragana);
        assert!(shuffled.chars().all(|c| hiragana.contains(c)));
        assert_eq!(abc.lookup(63).unwrap(), shuffled.chars().last().unwrap());
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            Abc::new("asgliaeprugb", 1),
            Err(Error::InvalidAlphabetLength {
                expected: 64,
                found: 12
            })
        );
        assert!(
            Abc::new(
                "1234567890qwertzuiopüäsdfghjklöä$<yxcvbnm,.->YXCVBNM;:_ASDFGHJKLQWERTZ",
                1
            )
            .is_err()
        );
    }

    #[test]
    fn rejects_duplicates() {
        let mut symbols: Vec<char> = DEFAULT_ABC.chars().collect();
        symbols[5] = 'A';
        let alphabet: String = symbols.into_iter().collect();
        assert_eq!(
            Abc::new(&alphabet, 1),
            Err(Error::DuplicateSymbol { symbol: 'A' })
        );
    }

    #[test]
    fn rejects_zero_seed() {
        assert_eq!(Abc::new(DEFAULT_ABC, 0), Err(Error::InvalidSeed));
        let mut abc = Abc::default();
        assert_eq!(abc.set_seed(0), Err(Error::InvalidSeed));
        assert_eq!(abc.alphabet(), SEED_1);
    }

    #[test]
    fn set_seed_and_reset() {
        let mut abc = Abc::default();
        abc.set_seed(345234).unwrap();
        assert_eq!(abc.seed(), 345234);
        assert_eq!(abc.alphabet(), SEED_345234);
        abc.reset();
        assert_eq!(abc.alphabet(), SEED_345234);
        abc.set_seed(1).unwrap();
        assert_eq!(abc, Abc::default());
    }

    #[test]
    fn lookup_and_position() {
        let abc = Abc::default();
        assert_eq!(abc.lookup(0), Ok('g'));
        assert_eq!(abc.lookup(63), Ok('e'));
        assert_eq!(
            abc.lookup(64),
            Err(Error::IndexOutOfRange { index: 64, len: 64 })
        );
        assert_eq!(abc.position('z'), Some(1));
        assert_eq!(abc.position('!'), None);
    }

    #[test]
    fn encode_computes_width() {
        let abc = Abc::default();
        assert_eq!(abc.encode(0, 1, 4).unwrap().len(), 1);
        assert_eq!(abc.encode(0, 0, 4).unwrap().len(), 1);
        assert_eq!(abc.encode(25, 0, 4).unwrap().len(), 2);
        assert_eq!(abc.encode(214235345234524356, 0, 4).unwrap().len(), 15);
        assert_eq!(abc.encode(214235345234524356, 0, 6).unwrap().len(), 10);
        assert_eq!(abc.encode(u64::MAX, 0, 5).unwrap().len(), 13);
    }

    #[test]
    fn encode_rejects_insufficient_width() {
        let abc = Abc::default();
        assert_eq!(
            abc.encode(48, 1, 4),
            Err(Error::InsufficientWidth {
                required: 2,
                provided: 1
            })
        );
        assert_eq!(abc.encode(48, 2, 4).unwrap().len(), 2);
        assert!(abc.encode(214235345234524356, 14, 4).is_err());
        assert_eq!(abc.encode(214235345234524356, 15, 4).unwrap().len(), 15);
    }

    #[test]
    fn encode_pads_explicit_width_beyond_the_word_size() {
        let abc = Abc::default();
        let symbols = abc.encode(u64::MAX, 20, 6).unwrap();
        assert_eq!(symbols.len(), 20);
        assert!(symbols[11..].iter().all(|&symbol| symbol == 'g'));
    }

    #[test]
    fn encode_rejects_digits_out_of_range() {
        let abc = Abc::default();
        assert_eq!(abc.encode(25, 0, 3), Err(Error::InvalidDigits { digits: 3 }));
        assert_eq!(abc.encode(25, 0, 7), Err(Error::InvalidDigits { digits: 7 }));
        for digits in 4..=6 {
            assert!(abc.encode(25, 0, digits).is_ok());
        }
    }

    #[test]
    fn encode_with_six_digits_is_deterministic() {
        let abc = Abc::default();
        assert_eq!(abc.encode(0, 0, 6).unwrap(), vec!['g']);
        assert_eq!(abc.encode(63, 0, 6).unwrap(), vec!['e']);
        assert_eq!(abc.encode(64, 0, 6).unwrap(), vec!['g', 'z']);
        assert_eq!(abc.encode(4095, 0, 6), abc.encode(4095, 0, 6));
    }

    #[test]
    fn encode_keeps_random_bits_out_of_the_payload() {
        let abc = Abc::default();
        for _ in 0..64 {
            let symbols = abc.encode(0b10111, 1, 5).unwrap();
            let index = abc.position(symbols[0]).unwrap();
            assert_eq!(index & 0b11111, 0b10111);

            let symbols = abc.encode(0b1010, 1, 4).unwrap();
            let index = abc.position(symbols[0]).unwrap();
            assert_eq!(index & 0b1111, 0b1010);
        }
    }

    #[test]
    fn decode_recovers_the_payload() {
        let abc = Abc::new(DEFAULT_ABC, 155000).unwrap();
        let cases = [
            (0, 5),
            (31, 5),
            (1_099_511_627_775, 5),
            (214235345234524356, 4),
            (4095, 6),
        ];
        for (value, digits) in cases {
            let symbols = abc.encode(value, 0, digits).unwrap();
            assert_eq!(abc.decode(&symbols, digits), Ok(value));
        }
    }

    #[test]
    fn decode_rejects_foreign_symbols_and_overflow() {
        let abc = Abc::default();
        assert_eq!(
            abc.decode(&['g', '!'], 6),
            Err(Error::UnknownSymbol { symbol: '!' })
        );
        // 11 symbols of 6 bits carry 66 bits; the top one must stay below 2^4.
        let mut symbols = vec!['e'; 10];
        symbols.push(abc.lookup(0b10000).unwrap());
        assert_eq!(abc.decode(&symbols, 6), Err(Error::DecodeOverflow));
    }

    fn unavailable(_: &mut [u8]) -> std::result::Result<(), getrandom::Error> {
        Err(getrandom::Error::UNSUPPORTED)
    }

    #[test]
    fn encode_falls_back_when_secure_source_fails() {
        let abc = Abc::new(DEFAULT_ABC, 155000).unwrap();
        for (value, digits) in [(1_099_511_627_775, 5), (214235345234524356, 4)] {
            let symbols = abc.encode_with(value, 0, digits, unavailable).unwrap();
            assert_eq!(abc.decode(&symbols, digits), Ok(value));
        }
    }

    #[test]
    fn fallback_filler_is_masked_and_advances() {
        let mask = SYMBOL_MASK & !0b1111;
        let first = random_filler(64, mask, unavailable);
        let second = random_filler(64, mask, unavailable);
        assert_eq!(first.len(), 64);
        assert!(first.iter().chain(&second).all(|byte| byte & !mask == 0));
        assert_ne!(first, second);
    }

    #[test]
    fn display_shows_the_shuffled_alphabet() {
        assert_eq!(Abc::default().to_string(), format!("Abc{{alphabet='{SEED_1}'}}"));
    }
}
