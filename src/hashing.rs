//! Hash mixing used to derive probe positions and tags.
//!
//! The table only ever looks at the low bits of a hash: the bottom seven
//! become the control-byte tag and the next few select the starting group.
//! Hashers with weak low bits (identity hashes of integers, for example) would
//! pile every key into a handful of groups, so every hash is passed through
//! [`mix`] before the table sees it.

use core::hash::BuildHasher;
use core::hash::Hash;

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// Spreads the entropy of `hash` across all 32 bits.
///
/// This is the intermediate step of MurmurHash3. It is a bijection, so
/// distinct inputs never collide, and a change in any input bit flips roughly
/// half of the output bits. It makes no attempt to resist adversarial input.
///
/// # Examples
///
/// ```rust
/// use swiss_hash::hashing::mix;
///
/// // Inputs that differ only in their high bits end up apart in the low bits,
/// // which are the ones the table indexes with.
/// assert_ne!(mix(1 << 20) & 0x7F, mix(2 << 20) & 0x7F);
/// assert_eq!(mix(1), 0xc353_9a5d);
/// assert_eq!(mix(0), 0);
/// ```
#[inline(always)]
pub const fn mix(hash: u32) -> u32 {
    hash.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

/// Folds a 64-bit hash into 32 bits without discarding the high half.
#[inline(always)]
const fn fold(hash: u64) -> u32 {
    (hash ^ (hash >> 32)) as u32
}

/// Hashes `key` with `hash_builder` and mixes the result into the 32-bit
/// value the table probes with.
///
/// # Examples
///
/// ```rust
/// use std::hash::RandomState;
///
/// use swiss_hash::hashing::hash_of;
///
/// let state = RandomState::new();
/// assert_eq!(hash_of(&state, "key"), hash_of(&state, "key"));
/// ```
#[inline]
pub fn hash_of<S, Q>(hash_builder: &S, key: &Q) -> u32
where
    S: BuildHasher,
    Q: Hash + ?Sized,
{
    mix(fold(hash_builder.hash_one(key)))
}
