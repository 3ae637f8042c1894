//! Forwarding Records
//!
//! When an object moves, word 0 of its old location is overwritten with the
//! new address tagged in the low bit. Live objects keep that bit clear (the
//! client guarantees word 0 holds a word-aligned value), so a single read
//! distinguishes "moved, go here" from "not moved".
//!
//! The pad marker shares the tag: it decodes as a forwarding record whose
//! target is address zero, which no real move ever produces. Linear walkers
//! treat it as a one-word gap; nothing ever dereferences it.

use crate::heap::space::{read_word, write_word};

/// Low-bit tag marking word 0 of a moved object.
pub(crate) const FORWARD_TAG: usize = 0b1;

/// Filler word for alignment gaps in linearly walked memory.
pub const PAD_WORD: usize = FORWARD_TAG;

/// The forwarding target recorded at `addr`, or `None` if the object there
/// has not moved.
///
/// # Safety
/// `addr` must be word-aligned and readable.
#[inline]
pub(crate) unsafe fn forwarding_target(addr: usize) -> Option<usize> {
    let word = read_word(addr);
    if word & FORWARD_TAG != 0 {
        Some(word & !FORWARD_TAG)
    } else {
        None
    }
}

/// Install a forwarding record at `old` pointing to `new`.
///
/// Each old location is forwarded at most once per pass; installing over an
/// existing record is a collector bug.
///
/// # Safety
/// `old` must be word-aligned and writable; `new` must be word-aligned.
#[inline]
pub(crate) unsafe fn install(old: usize, new: usize) {
    debug_assert_eq!(new & FORWARD_TAG, 0, "unaligned forwarding target");
    debug_assert!(
        forwarding_target(old).is_none(),
        "forwarding record installed twice at {old:#x}"
    );
    write_word(old, new | FORWARD_TAG);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_util::align::WORD_BYTES;

    #[test]
    fn test_unforwarded_word_reads_none() {
        let words = [0usize, 1024, 0];
        let base = words.as_ptr() as usize;
        // Word 0 of a live object is aligned, so the tag bit is clear.
        assert_eq!(unsafe { forwarding_target(base) }, None);
        assert_eq!(unsafe { forwarding_target(base + WORD_BYTES) }, None);
    }

    #[test]
    fn test_install_and_decode() {
        let mut words = [0usize; 4];
        let base = words.as_mut_ptr() as usize;
        let target = base + 2 * WORD_BYTES;
        unsafe {
            install(base, target);
            assert_eq!(forwarding_target(base), Some(target));
        }
        // The tag lives in the stored word, not the decoded target.
        assert_eq!(words[0], target | FORWARD_TAG);
    }

    #[test]
    fn test_pad_word_decodes_as_gap() {
        let words = [PAD_WORD];
        let base = words.as_ptr() as usize;
        // A pad marker looks forwarded-to-zero, a target no move produces.
        assert_eq!(unsafe { forwarding_target(base) }, Some(0));
    }
}
