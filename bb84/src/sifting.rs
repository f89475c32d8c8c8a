use serde::{Deserialize, Serialize};

use crate::bb84_states::{count_mismatches, Basis, Symbol};
use crate::error::{ProtocolError, Result};

/// Both parties' bits at the positions that survived basis reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiftedKeys {
    pub alice: Vec<bool>,
    pub bob: Vec<bool>,
    /// Positions in the original sequence, ascending.
    pub indices: Vec<usize>,
}

impl SiftedKeys {
    pub fn len(&self) -> usize {
        self.alice.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alice.is_empty()
    }

    pub fn mismatches(&self) -> usize {
        count_mismatches(&self.alice, &self.bob)
    }
}

fn same_len(left: &'static str, a: usize, right: &'static str, b: usize) -> Result<()> {
    if a != b {
        return Err(ProtocolError::LengthMismatch {
            left,
            left_len: a,
            right,
            right_len: b,
        });
    }
    Ok(())
}

/// Keeps position `i` iff the bases agree and Bob actually detected something.
pub fn sift(
    alice_bits: &[bool],
    alice_bases: &[Basis],
    bob_symbols: &[Symbol],
    bob_bases: &[Basis],
) -> Result<SiftedKeys> {
    same_len("alice_bits", alice_bits.len(), "alice_bases", alice_bases.len())?;
    same_len("alice_bits", alice_bits.len(), "bob_bits", bob_symbols.len())?;
    same_len("alice_bits", alice_bits.len(), "bob_bases", bob_bases.len())?;

    let mut keys = SiftedKeys::default();
    for i in 0..alice_bits.len() {
        if alice_bases[i] != bob_bases[i] {
            continue;
        }
        if let Symbol::Bit(b) = bob_symbols[i] {
            keys.alice.push(alice_bits[i]);
            keys.bob.push(b);
            keys.indices.push(i);
        }
    }
    Ok(keys)
}

/// Fraction of disagreeing sifted bits. An empty key yields 1.0, which every
/// threshold treats as insecure.
pub fn qber(alice: &[bool], bob: &[bool]) -> f64 {
    if alice.is_empty() || bob.is_empty() {
        return 1.0;
    }
    count_mismatches(alice, bob) as f64 / alice.len() as f64
}

/// Outcome of the security check. `Indeterminate` separates "nothing to
/// judge" from a measured QBER above threshold; both leave `is_secure` false.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityVerdict {
    Secure,
    Insecure,
    Indeterminate,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGate {
    pub threshold: f64,
}

impl Default for SecurityGate {
    fn default() -> Self {
        SecurityGate {
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }
}

impl SecurityGate {
    pub const DEFAULT_THRESHOLD: f64 = 0.085;

    pub fn new(threshold: f64) -> Self {
        SecurityGate { threshold }
    }

    pub fn is_secure(&self, qber: f64) -> bool {
        qber < self.threshold
    }

    pub fn verdict(&self, qber: f64, sifted_len: usize) -> SecurityVerdict {
        if sifted_len == 0 {
            SecurityVerdict::Indeterminate
        } else if self.is_secure(qber) {
            SecurityVerdict::Secure
        } else {
            SecurityVerdict::Insecure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bb84_states::{parse_bases, parse_bits};

    #[test]
    fn test_sift_drops_mismatched_and_undetected() {
        let alice = parse_bits("0110").unwrap();
        let alice_bases = parse_bases("+x+x").unwrap();
        let bob_bases = parse_bases("+xx+").unwrap();
        let bob = vec![Symbol::Bit(false), Symbol::Undetected, Symbol::Bit(true), Symbol::Bit(false)];

        let keys = sift(&alice, &alice_bases, &bob, &bob_bases).unwrap();
        assert_eq!(keys.alice, vec![false]);
        assert_eq!(keys.bob, vec![false]);
        assert_eq!(keys.indices, vec![0]);
    }

    #[test]
    fn test_sift_rejects_ragged_input() {
        let err = sift(&[true, false], &[Basis::Rectilinear], &[], &[]).unwrap_err();
        assert!(matches!(err, ProtocolError::LengthMismatch { left_len: 2, right_len: 1, .. }));
    }

    #[test]
    fn test_qber_of_empty_key_is_one() {
        assert_eq!(qber(&[], &[]), 1.0);
        assert_eq!(qber(&[true, false], &[true, true]), 0.5);
    }

    #[test]
    fn test_gate_has_no_hysteresis() {
        let gate = SecurityGate::default();
        assert!(gate.is_secure(0.0849));
        assert!(!gate.is_secure(0.085));
        assert_eq!(gate.verdict(1.0, 0), SecurityVerdict::Indeterminate);
        assert_eq!(gate.verdict(0.2, 10), SecurityVerdict::Insecure);
        assert_eq!(gate.verdict(0.0, 10), SecurityVerdict::Secure);
    }
}
