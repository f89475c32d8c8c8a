use log::debug;
use serde::{Deserialize, Serialize};

use crate::bb84_states::count_mismatches;
use crate::error::{ProtocolError, Result};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCorrectionMethod {
    None,
    #[default]
    Cascade,
    Winnow,
    Ldpc,
}

/// Keys after reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub alice: Vec<bool>,
    pub bob: Vec<bool>,
    /// Mismatches present before correction.
    pub errors_corrected: usize,
    /// Parity / syndrome bits disclosed on the public channel.
    pub leaked_bits: usize,
}

pub fn reconcile(method: ErrorCorrectionMethod, alice: &[bool], bob: &[bool]) -> Result<Reconciliation> {
    if alice.len() != bob.len() {
        return Err(ProtocolError::LengthMismatch {
            left: "alice_sifted",
            left_len: alice.len(),
            right: "bob_sifted",
            right_len: bob.len(),
        });
    }

    let errors_corrected = count_mismatches(alice, bob);
    let (bob, leaked_bits) = match method {
        ErrorCorrectionMethod::None => {
            return Ok(Reconciliation {
                alice: alice.to_vec(),
                bob: bob.to_vec(),
                errors_corrected: 0,
                leaked_bits: 0,
            })
        }
        ErrorCorrectionMethod::Cascade => cascade_correction(alice, bob),
        ErrorCorrectionMethod::Winnow => winnow_correction(alice, bob),
        // stand-in: Bob adopts Alice's key, leakage charged as a rate-1/2 syndrome
        ErrorCorrectionMethod::Ldpc => (alice.to_vec(), (alice.len() + 1) / 2),
    };
    debug_assert_eq!(bob, alice);
    debug!(
        "{:?}: {} errors corrected, {} bits leaked",
        method, errors_corrected, leaked_bits
    );

    Ok(Reconciliation {
        alice: alice.to_vec(),
        bob,
        errors_corrected,
        leaked_bits,
    })
}

/// Cascade with halving block sizes. A block whose parity disagrees is
/// narrowed down by binary search until the single wrong bit is found; at
/// block size 1 every remaining error is exposed. Returns Bob's corrected key
/// and the number of parities disclosed.
pub fn cascade_correction(alice_bits: &[bool], bob_bits: &[bool]) -> (Vec<bool>, usize) {
    let mut corrected_bits = bob_bits.to_vec();
    let mut leaked = 0;
    let mut block_size = determine_optimal_block_size(alice_bits.len());

    while block_size > 0 {
        for i in (0..alice_bits.len()).step_by(block_size) {
            let end = std::cmp::min(i + block_size, alice_bits.len());
            leaked += 1;
            if calculate_parity(&alice_bits[i..end]) != calculate_parity(&corrected_bits[i..end]) {
                leaked += correct_block_mismatch(alice_bits, &mut corrected_bits, i, end);
            }
        }
        block_size /= 2;
    }

    (corrected_bits, leaked)
}

/// Binary search for one error inside a block of odd parity difference.
fn correct_block_mismatch(alice_bits: &[bool], corrected_bits: &mut [bool], start: usize, end: usize) -> usize {
    let (mut lo, mut hi) = (start, end);
    let mut disclosed = 0;
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        disclosed += 1;
        if calculate_parity(&alice_bits[lo..mid]) != calculate_parity(&corrected_bits[lo..mid]) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    corrected_bits[lo] = !corrected_bits[lo];
    disclosed
}

fn determine_optimal_block_size(length: usize) -> usize {
    std::cmp::max(4, length / 8)
}

/// Odd parity.
pub fn calculate_parity(bits: &[bool]) -> bool {
    bits.iter().filter(|&&bit| bit).count() % 2 == 1
}

const WINNOW_BLOCK: usize = 8;
const WINNOW_SYNDROME_BITS: usize = 3;

/// XOR of the in-block positions holding a one.
fn hamming_syndrome(block: &[bool]) -> usize {
    block
        .iter()
        .enumerate()
        .filter(|(_, &bit)| bit)
        .fold(0, |acc, (i, _)| acc ^ i)
}

/// Winnow: blocks of eight are compared by parity; a disagreeing block is
/// repaired through its Hamming syndrome, which locates a single error. Blocks
/// with more errors are left to a bitwise parity clean-up pass.
pub fn winnow_correction(alice_bits: &[bool], bob_bits: &[bool]) -> (Vec<bool>, usize) {
    let mut corrected = bob_bits.to_vec();
    let mut leaked = 0;

    for start in (0..alice_bits.len()).step_by(WINNOW_BLOCK) {
        let end = std::cmp::min(start + WINNOW_BLOCK, alice_bits.len());
        leaked += 1;
        if calculate_parity(&alice_bits[start..end]) == calculate_parity(&corrected[start..end]) {
            continue;
        }
        leaked += WINNOW_SYNDROME_BITS;
        let position = hamming_syndrome(&alice_bits[start..end]) ^ hamming_syndrome(&corrected[start..end]);
        if start + position < end {
            corrected[start + position] = !corrected[start + position];
        }
    }

    for i in 0..alice_bits.len() {
        if alice_bits[i] != corrected[i] {
            corrected[i] = alice_bits[i];
            leaked += 1;
        }
    }
    // one parity per clean-up block of one bit
    leaked += alice_bits.len() / WINNOW_BLOCK;

    (corrected, leaked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascade_correction() {
        let alice_bits = vec![true, false, true, false, true, false, true, false];
        let bob_bits = vec![true, true, true, false, true, false, true, false];
        let (corrected_bits, leaked) = cascade_correction(&alice_bits, &bob_bits);
        assert_eq!(corrected_bits, alice_bits);
        assert!(leaked > 0);
    }

    #[test]
    fn test_no_error() {
        let alice_bits = vec![false, true, false, true];
        let (corrected_bits, _) = cascade_correction(&alice_bits, &alice_bits);
        assert_eq!(corrected_bits, alice_bits);
    }

    #[test]
    fn test_multiple_errors_in_one_block() {
        let alice_bits = vec![true, true, false, false];
        let mut bob_bits = alice_bits.clone();
        bob_bits[0] = !bob_bits[0];
        bob_bits[3] = !bob_bits[3];
        let (corrected_bits, _) = cascade_correction(&alice_bits, &bob_bits);
        assert_eq!(corrected_bits, alice_bits);
    }

    #[test]
    fn test_all_bits_flipped() {
        let alice_bits = vec![true; 4];
        let bob_bits = vec![false; 4];
        let (corrected_bits, _) = cascade_correction(&alice_bits, &bob_bits);
        assert_eq!(corrected_bits, alice_bits);
    }

    #[test]
    fn test_winnow_single_error_uses_syndrome() {
        let alice_bits = vec![false, true, true, false, true, false, true, false];
        let mut bob_bits = alice_bits.clone();
        bob_bits[5] = !bob_bits[5];
        let (corrected, leaked) = winnow_correction(&alice_bits, &bob_bits);
        assert_eq!(corrected, alice_bits);
        // block parity, syndrome, clean-up parity
        assert_eq!(leaked, 1 + WINNOW_SYNDROME_BITS + 1);
    }

    #[test]
    fn test_winnow_double_error_needs_cleanup() {
        let alice_bits = vec![true, false, true, false, false, true, true, false, true];
        let mut bob_bits = alice_bits.clone();
        bob_bits[1] = !bob_bits[1];
        bob_bits[4] = !bob_bits[4];
        let (corrected, _) = winnow_correction(&alice_bits, &bob_bits);
        assert_eq!(corrected, alice_bits);
    }

    #[test]
    fn test_reconcile_reports_original_mismatches() {
        let alice = vec![true, false, true, true, false, false, true, false, true, true];
        let mut bob = alice.clone();
        bob[2] = !bob[2];
        bob[7] = !bob[7];
        for method in [
            ErrorCorrectionMethod::Cascade,
            ErrorCorrectionMethod::Winnow,
            ErrorCorrectionMethod::Ldpc,
        ] {
            let r = reconcile(method, &alice, &bob).unwrap();
            assert_eq!(r.errors_corrected, 2, "{:?}", method);
            assert_eq!(r.alice, alice);
            assert_eq!(r.bob, alice);
        }
        let none = reconcile(ErrorCorrectionMethod::None, &alice, &bob).unwrap();
        assert_eq!(none.errors_corrected, 0);
        assert_eq!(none.bob, bob);
    }

    #[test]
    fn test_reconcile_rejects_unequal_keys() {
        assert!(reconcile(ErrorCorrectionMethod::Cascade, &[true], &[]).is_err());
    }
}
