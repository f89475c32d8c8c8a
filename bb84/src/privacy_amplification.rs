use ring::digest::{Context, SHA256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivacyAmplificationMethod {
    None,
    #[default]
    Standard,
    Universal,
    Toeplitz,
}

pub const DEFAULT_AMPLIFICATION_FACTOR: f64 = 0.5;
/// Fixed retention ratio of the pairwise-XOR universal hash.
pub const UNIVERSAL_RETENTION: f64 = 0.6;

/// Compresses `key`; the output is never longer than the input.
///
/// `factor` applies to `standard` and `toeplitz`. `seed` selects the public
/// Toeplitz matrix.
pub fn amplify(method: PrivacyAmplificationMethod, key: &[bool], factor: f64, seed: u64) -> Vec<bool> {
    if key.is_empty() {
        return Vec::new();
    }
    let factor = factor.clamp(0.0, 1.0);
    match method {
        PrivacyAmplificationMethod::None => key.to_vec(),
        PrivacyAmplificationMethod::Standard => {
            let new_length = (key.len() as f64 * factor).floor() as usize;
            key[..new_length].to_vec()
        }
        PrivacyAmplificationMethod::Universal => universal_hash(key),
        PrivacyAmplificationMethod::Toeplitz => {
            let m = (key.len() as f64 * factor).floor() as usize;
            let matrix = ToeplitzMatrix::from_seed(m, key.len(), seed);
            toeplitz_hash(key, &matrix)
        }
    }
}

/// XOR of adjacent pairs (a trailing odd bit is copied through), truncated to
/// `floor(len * 0.6)`.
fn universal_hash(key: &[bool]) -> Vec<bool> {
    let new_length = (key.len() as f64 * UNIVERSAL_RETENTION).floor() as usize;
    let mut folded: Vec<bool> = key
        .chunks(2)
        .map(|pair| pair.iter().fold(false, |acc, &b| acc ^ b))
        .collect();
    folded.truncate(new_length);
    folded
}

fn hash_chunk(chunk: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(chunk);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

pub fn bools_to_bytes(bools: &[bool]) -> Vec<u8> {
    bools
        .chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0, |acc, (i, &bit)| acc | ((bit as u8) << i))
        })
        .collect()
}

pub fn bytes_to_bools(bytes: &[u8]) -> Vec<bool> {
    bytes
        .iter()
        .flat_map(|&byte| (0..8).map(move |i| byte & (1 << i) != 0))
        .collect()
}

/// Expands `seed` into `n` bits: SHA-256(seed ‖ counter) for counter = 0, 1, ...
pub fn expand_seed(seed: u64, n: usize) -> Vec<bool> {
    let mut bits = Vec::with_capacity(n + 256);
    let mut counter: u64 = 0;
    while bits.len() < n {
        let mut block = seed.to_le_bytes().to_vec();
        block.extend_from_slice(&counter.to_le_bytes());
        bits.extend(bytes_to_bools(&hash_chunk(&block)));
        counter += 1;
    }
    bits.truncate(n);
    bits
}

/// An `m × n` Toeplitz matrix, stored as its `n + m - 1` diagonals.
/// `T[i][j] = diagonals[i - j + n - 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToeplitzMatrix {
    rows: usize,
    cols: usize,
    diagonals: Vec<bool>,
}

impl ToeplitzMatrix {
    pub fn from_seed(rows: usize, cols: usize, seed: u64) -> Self {
        let len = if rows == 0 || cols == 0 { 0 } else { rows + cols - 1 };
        ToeplitzMatrix {
            rows,
            cols,
            diagonals: expand_seed(seed, len),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, i: usize, j: usize) -> bool {
        self.diagonals[i + self.cols - 1 - j]
    }
}

pub fn toeplitz_hash(shared_key: &[bool], matrix: &ToeplitzMatrix) -> Vec<bool> {
    (0..matrix.rows())
        .map(|i| {
            let mut hash_bit = false;
            for (j, &key_bit) in shared_key.iter().enumerate().take(matrix.cols()) {
                hash_bit ^= key_bit & matrix.get(i, j);
            }
            hash_bit
        })
        .collect()
}

/// Binary entropy H₂(p).
pub fn binary_entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        return 0.0;
    }
    -p * p.log2() - (1.0 - p) * (1.0 - p).log2()
}

/// Secure length from the Shannon bound `n · max(0, 1 − 2H₂(e))`.
pub fn shannon_secure_length(n: usize, qber: f64) -> usize {
    let fraction = (1.0 - 2.0 * binary_entropy(qber)).max(0.0);
    (n as f64 * fraction).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bb84_states::{format_bits, parse_bits};
    use ring::digest;

    #[test]
    fn test_standard_halves_the_key() {
        let key = vec![true; 8];
        assert_eq!(amplify(PrivacyAmplificationMethod::Standard, &key, 0.5, 0).len(), 4);
        // floor, so a single bit compresses to nothing
        assert!(amplify(PrivacyAmplificationMethod::Standard, &[true], 0.5, 0).is_empty());
    }

    #[test]
    fn test_universal_pairs() {
        let key = parse_bits("1010").unwrap();
        let out = amplify(PrivacyAmplificationMethod::Universal, &key, 0.5, 0);
        assert_eq!(format_bits(&out), "11");

        let odd = parse_bits("11001").unwrap();
        // pairs 0, 0, trailing 1 -> "001" cut to floor(5 * 0.6) = 3
        assert_eq!(format_bits(&amplify(PrivacyAmplificationMethod::Universal, &odd, 0.5, 0)), "001");
    }

    #[test]
    fn test_toeplitz_is_deterministic_per_seed() {
        let key: Vec<bool> = (0..64).map(|i| i % 3 == 0).collect();
        let a = amplify(PrivacyAmplificationMethod::Toeplitz, &key, 0.5, 7);
        let b = amplify(PrivacyAmplificationMethod::Toeplitz, &key, 0.5, 7);
        let c = amplify(PrivacyAmplificationMethod::Toeplitz, &key, 0.5, 8);
        assert_eq!(a.len(), 32);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_toeplitz_matrix_is_constant_along_diagonals() {
        let matrix = ToeplitzMatrix::from_seed(5, 9, 42);
        for i in 1..5 {
            for j in 1..9 {
                assert_eq!(matrix.get(i, j), matrix.get(i - 1, j - 1));
            }
        }
    }

    #[test]
    fn test_toeplitz_is_linear() {
        let matrix = ToeplitzMatrix::from_seed(10, 20, 3);
        let x: Vec<bool> = (0..20).map(|i| i % 2 == 0).collect();
        let y: Vec<bool> = (0..20).map(|i| i % 5 == 1).collect();
        let xy: Vec<bool> = x.iter().zip(&y).map(|(a, b)| a ^ b).collect();
        let hx = toeplitz_hash(&x, &matrix);
        let hy = toeplitz_hash(&y, &matrix);
        let expected: Vec<bool> = hx.iter().zip(&hy).map(|(a, b)| a ^ b).collect();
        assert_eq!(toeplitz_hash(&xy, &matrix), expected);
    }

    #[test]
    fn test_hash_function_accuracy() {
        let input_chunk = [0b10101010, 0b11001100, 0b11110000, 0b00001111];
        let expected_output = digest::digest(&SHA256, &input_chunk).as_ref().to_vec();
        assert_eq!(
            hash_chunk(&input_chunk),
            expected_output,
            "Hash function did not produce expected output"
        );
    }

    #[test]
    fn test_bit_packing_round_trips() {
        let bits: Vec<bool> = (0..16).map(|i| i % 3 == 1).collect();
        assert_eq!(bytes_to_bools(&bools_to_bytes(&bits)), bits);
    }

    #[test]
    fn test_shannon_bound() {
        assert_eq!(shannon_secure_length(100, 0.0), 100);
        // H₂(0.11) ≈ 0.5, nothing left
        assert_eq!(shannon_secure_length(100, 0.2), 0);
        assert!(shannon_secure_length(1000, 0.02) > 500);
        assert_eq!(binary_entropy(0.5), 1.0);
    }
}
