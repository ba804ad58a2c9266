//! Nucleotide helpers: IUPAC complements and ambiguity-aware base comparison

/// Complement of a single IUPAC nucleotide code, preserving case
///
/// `U` complements to `A`; unknown characters become `N`.
#[must_use]
pub fn complement(base: u8) -> u8 {
    let c = match base.to_ascii_uppercase() {
        b'A' => b'T',
        b'T' | b'U' => b'A',
        b'G' => b'C',
        b'C' => b'G',
        b'R' => b'Y',
        b'Y' => b'R',
        b'M' => b'K',
        b'K' => b'M',
        b'W' => b'W',
        b'S' => b'S',
        b'B' => b'V',
        b'V' => b'B',
        b'D' => b'H',
        b'H' => b'D',
        _ => b'N',
    };
    if base.is_ascii_lowercase() {
        c.to_ascii_lowercase()
    } else {
        c
    }
}

/// Reverse complement of a sequence
#[must_use]
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

/// Reverse complements a sequence in place
pub fn reverse_complement_in_place(seq: &mut [u8]) {
    seq.reverse();
    for b in seq.iter_mut() {
        *b = complement(*b);
    }
}

/// Set of concrete bases (A=1, C=2, G=4, T=8) an IUPAC code stands for
#[must_use]
pub fn base_mask(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'A' => 0b0001,
        b'C' => 0b0010,
        b'G' => 0b0100,
        b'T' | b'U' => 0b1000,
        b'R' => 0b0101,
        b'Y' => 0b1010,
        b'S' => 0b0110,
        b'W' => 0b1001,
        b'K' => 0b1100,
        b'M' => 0b0011,
        b'B' => 0b1110,
        b'D' => 0b1101,
        b'H' => 0b1011,
        b'V' => 0b0111,
        b'N' => 0b1111,
        _ => 0,
    }
}

/// Whether an oligo base matches a read base
///
/// An ambiguity code in the oligo matches any base it stands for. The read base must be a
/// concrete A, C, G or T; an `N` or other ambiguity code in the read never matches.
/// Comparison ignores case.
#[inline]
#[must_use]
pub fn bases_match(oligo: u8, read: u8) -> bool {
    let read = base_mask(read);
    read.count_ones() == 1 && base_mask(oligo) & read != 0
}

/// Whether a character is a valid IUPAC nucleotide code
#[must_use]
pub fn is_iupac(base: u8) -> bool {
    base_mask(base) != 0
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_reverse_complement() {
        assert_eq!(reverse_complement(b"ACGT"), b"ACGT");
        assert_eq!(reverse_complement(b"AACCG"), b"CGGTT");
        assert_eq!(reverse_complement(b"acgN"), b"Ncgt");
        assert_eq!(reverse_complement(b"RYMKBVDH"), b"DHBVMKRY");
        assert_eq!(reverse_complement(b"U"), b"A");
    }

    #[test]
    fn test_in_place_matches_copy() {
        let seq = b"TTGACCAGTRNW".to_vec();
        let mut inplace = seq.clone();
        reverse_complement_in_place(&mut inplace);
        assert_eq!(inplace, reverse_complement(&seq));
        reverse_complement_in_place(&mut inplace);
        assert_eq!(inplace, seq);
    }

    #[test]
    fn test_bases_match() {
        assert!(bases_match(b'A', b'a'));
        assert!(!bases_match(b'A', b'C'));
        assert!(bases_match(b'N', b'G'));
        assert!(bases_match(b'R', b'G'));
        assert!(!bases_match(b'R', b'T'));
        assert!(!bases_match(b'Y', b'N'));
        assert!(!bases_match(b'N', b'N'));
        assert!(!bases_match(b'A', b'R'));
        assert!(!bases_match(b'A', b'-'));
    }

    #[test]
    fn test_is_iupac() {
        assert!(b"ACGTURYSWKMBDHVN".iter().all(|&b| is_iupac(b)));
        assert!(!is_iupac(b'X'));
        assert!(!is_iupac(b'.'));
    }
}
