//! The raw open-addressing table shared by [`HashMap`](crate::HashMap) and
//! [`HashSet`](crate::HashSet).
//!
//! Slots are organized in aligned groups of `GROUP_WIDTH` entries. Every slot
//! owns one control byte that is either [`EMPTY`], [`DELETED`], or a 7-bit tag
//! taken from the low bits of the entry's hash. A lookup walks groups in
//! triangular order starting from the group selected by the remaining hash
//! bits, compares the whole group of control bytes against the tag at once,
//! and only calls the caller's equality predicate on tag hits. The walk ends at
//! the first group holding an `EMPTY` byte; tombstones keep probe chains
//! intact and are stepped over.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::mem::MaybeUninit;

use crate::error::ConfigError;

cfg_if::cfg_if! {
    if #[cfg(feature = "density-ninety-seven")] {
        /// Load factor used when none is given explicitly.
        pub const DEFAULT_LOAD_FACTOR: f64 = 0.97;
    } else if #[cfg(feature = "density-ninety-two")] {
        /// Load factor used when none is given explicitly.
        pub const DEFAULT_LOAD_FACTOR: f64 = 0.92;
    } else {
        /// Load factor used when none is given explicitly.
        pub const DEFAULT_LOAD_FACTOR: f64 = 0.875;
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "eight-way")] {
        const GROUP_WIDTH: usize = 8;
    } else {
        const GROUP_WIDTH: usize = 16;
    }
}

/// Smallest number of slots a table is ever allocated with.
pub const MIN_CAPACITY: usize = 16;

/// Control byte of a slot that has never held an entry.
///
/// Both special markers have the sign bit set, so a single `movemask` over a
/// group finds every slot an insert may claim.
const EMPTY: u8 = 0xFF;

/// Control byte of a slot whose entry was removed.
const DELETED: u8 = 0x80;

const TAG_MASK: u32 = 0x7F;
const TAG_BITS: u32 = 7;

#[inline(always)]
fn hashtag(hash: u32) -> u8 {
    (hash & TAG_MASK) as u8
}

#[inline(always)]
fn is_full(ctrl: u8) -> bool {
    ctrl & 0x80 == 0
}

fn validate_load_factor(load_factor: f64) -> Result<f64, ConfigError> {
    if load_factor > 0.0 && load_factor < 1.0 {
        Ok(load_factor)
    } else {
        Err(ConfigError::InvalidLoadFactor(load_factor))
    }
}

#[inline]
fn slots_for(requested: usize) -> usize {
    requested
        .max(MIN_CAPACITY)
        .checked_next_power_of_two()
        .expect("capacity overflow")
}

#[inline]
fn max_load_for(capacity: usize, load_factor: f64) -> usize {
    ((capacity as f64 * load_factor) as usize).clamp(1, capacity - 1)
}

/// Set bits mark matching slots within one group, lowest slot first.
#[derive(Clone, Copy)]
struct BitMask(u16);

impl BitMask {
    #[inline(always)]
    fn any(self) -> bool {
        self.0 != 0
    }

    #[inline(always)]
    fn lowest(self) -> Option<usize> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as usize)
        }
    }
}

impl Iterator for BitMask {
    type Item = usize;

    #[inline(always)]
    fn next(&mut self) -> Option<usize> {
        let bit = self.lowest()?;
        self.0 &= self.0 - 1;
        Some(bit)
    }
}

#[derive(Clone, Copy)]
#[cfg_attr(not(feature = "eight-way"), repr(C, align(16)))]
#[cfg_attr(feature = "eight-way", repr(C, align(8)))]
struct ControlGroup {
    bytes: [u8; GROUP_WIDTH],
}

impl ControlGroup {
    const EMPTY: Self = Self {
        bytes: [EMPTY; GROUP_WIDTH],
    };

    #[inline(always)]
    fn match_byte(&self, byte: u8) -> BitMask {
        #[cfg(all(
            target_arch = "x86_64",
            target_feature = "sse2",
            not(feature = "eight-way")
        ))]
        {
            return BitMask(self.match_byte_sse2(byte));
        }

        #[allow(unreachable_code)]
        {
            let mut bits: u16 = 0;
            for (i, &b) in self.bytes.iter().enumerate() {
                if b == byte {
                    bits |= 1 << i;
                }
            }
            BitMask(bits)
        }
    }

    #[cfg(all(
        target_arch = "x86_64",
        target_feature = "sse2",
        not(feature = "eight-way")
    ))]
    #[inline(always)]
    fn match_byte_sse2(&self, byte: u8) -> u16 {
        use core::arch::x86_64::*;
        // SAFETY: `ControlGroup` is `#[repr(C, align(16))]` with its 16 bytes at
        // offset 0, so the aligned load stays within the group.
        unsafe {
            let data = _mm_load_si128(self.bytes.as_ptr() as *const __m128i);
            let cmp = _mm_cmpeq_epi8(data, _mm_set1_epi8(byte as i8));
            _mm_movemask_epi8(cmp) as u16
        }
    }

    #[inline(always)]
    fn match_tag(&self, tag: u8) -> BitMask {
        self.match_byte(tag)
    }

    #[inline(always)]
    fn match_empty(&self) -> BitMask {
        self.match_byte(EMPTY)
    }

    /// Slots an insert may claim: `EMPTY` or `DELETED`.
    #[inline(always)]
    fn match_free(&self) -> BitMask {
        #[cfg(all(
            target_arch = "x86_64",
            target_feature = "sse2",
            not(feature = "eight-way")
        ))]
        {
            use core::arch::x86_64::*;
            // SAFETY: Same layout argument as `match_byte_sse2`.
            return BitMask(unsafe {
                let data = _mm_load_si128(self.bytes.as_ptr() as *const __m128i);
                _mm_movemask_epi8(data) as u16
            });
        }

        #[allow(unreachable_code)]
        {
            let mut bits: u16 = 0;
            for (i, &b) in self.bytes.iter().enumerate() {
                if !is_full(b) {
                    bits |= 1 << i;
                }
            }
            BitMask(bits)
        }
    }
}

/// Triangular walk over groups. With a power-of-two group count it visits
/// every group exactly once before repeating.
struct ProbeSeq {
    group: usize,
    stride: usize,
}

impl ProbeSeq {
    #[inline(always)]
    fn new(group: usize) -> Self {
        Self { group, stride: 0 }
    }

    #[inline(always)]
    fn move_next(&mut self, group_mask: usize) {
        self.stride += 1;
        self.group = (self.group + self.stride) & group_mask;
    }
}

/// Debug statistics for hash table analysis.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of live entries.
    pub populated: usize,
    /// Number of tombstoned slots.
    pub tombstones: usize,
    /// Total number of slots allocated.
    pub capacity: usize,
    /// Number of occupied-or-tombstoned slots that triggers a rebuild.
    pub max_load: usize,
    /// Live entries divided by slots.
    pub load_factor: f64,
    /// Live plus tombstoned slots divided by slots.
    pub slot_utilization: f64,
    /// Total memory in bytes used by the table arrays.
    pub total_bytes: usize,
    /// Bytes held by slots that contain no live entry.
    pub wasted_bytes: usize,
}

#[cfg(any(test, feature = "stats"))]
impl DebugStats {
    /// Pretty-print the debug statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("=== Hash Table Debug Statistics ===");
        println!(
            "Population: {}/{} slots ({:.2}% load factor, max load {})",
            self.populated,
            self.capacity,
            self.load_factor * 100.0,
            self.max_load
        );
        println!(
            "Tombstones: {} ({:.2}% slot utilization)",
            self.tombstones,
            self.slot_utilization * 100.0
        );
        println!("Total Allocated: {} bytes", self.total_bytes);
        println!(
            "Memory: {} bytes wasted ({:.02}%)",
            self.wasted_bytes,
            if self.total_bytes == 0 {
                0.0
            } else {
                (self.wasted_bytes as f64 / self.total_bytes as f64) * 100.0
            }
        );
    }
}

/// Number of entries by how many groups past their home group they live.
///
/// `counts[0]` holds entries found in their home group, `counts[1]` entries
/// one probe step further, and so on.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeHistogram {
    /// Entry count per probe distance.
    pub counts: Vec<usize>,
}

#[cfg(any(test, feature = "stats"))]
impl ProbeHistogram {
    /// Pretty-print the histogram.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        let total: usize = self.counts.iter().sum();
        println!("=== Probe Length Histogram ===");
        for (distance, &count) in self.counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            println!(
                "{:>4} groups: {:>8} ({:.2}%)",
                distance,
                count,
                count as f64 / total.max(1) as f64 * 100.0
            );
        }
    }
}

/// A SwissTable-style hash table.
///
/// `HashTable<V>` stores values of type `V` and leaves hashing and equality to
/// the caller: every operation takes a 32-bit hash (usually produced by
/// [`hash_of`](crate::hashing::hash_of)) and a predicate that recognizes the
/// wanted value.
///
/// The table is rebuilt wholesale when it needs room. Before an insert that
/// would push `len + tombstones` past [`max_load`](Self::max_load) the
/// capacity at least doubles. When there is still room but tombstones
/// outnumber half of the live entries, the table is rebuilt at the same
/// capacity to clear them.
///
/// ## Example
///
/// ```rust
/// use std::hash::RandomState;
///
/// use swiss_hash::hash_table::Entry;
/// use swiss_hash::hash_table::HashTable;
/// use swiss_hash::hashing::hash_of;
///
/// #[derive(Debug, PartialEq)]
/// struct Person {
///     id: u64,
///     name: String,
/// }
///
/// let state = RandomState::new();
/// let mut table = HashTable::with_capacity(100);
/// let hash = hash_of(&state, &123u64);
///
/// match table.entry(hash, |p: &Person| p.id == 123) {
///     Entry::Vacant(entry) => {
///         entry.insert(Person {
///             id: 123,
///             name: "Alice".to_string(),
///         });
///     }
///     Entry::Occupied(_) => {
///         println!("Person already exists");
///     }
/// }
/// assert_eq!(table.find(hash, |p| p.id == 123).unwrap().name, "Alice");
/// ```
pub struct HashTable<V> {
    groups: Box<[ControlGroup]>,
    hashes: Box<[u32]>,
    slots: Box<[MaybeUninit<V>]>,

    populated: usize,
    tombstones: usize,
    max_load: usize,
    group_mask: usize,
    load_factor: f64,
}

impl<V> Debug for HashTable<V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        use alloc::format;
        use alloc::string::String;

        f.debug_struct("HashTable")
            .field(
                "control",
                &self
                    .groups
                    .iter()
                    .map(|group| {
                        let items: Vec<String> = group
                            .bytes
                            .iter()
                            .map(|&b| match b {
                                EMPTY => "..".into(),
                                DELETED => "##".into(),
                                tag => format!("{tag:02x}"),
                            })
                            .collect();
                        items.join(", ")
                    })
                    .collect::<Vec<_>>(),
            )
            .field("populated", &self.populated)
            .field("tombstones", &self.tombstones)
            .field("capacity", &self.capacity())
            .field("max_load", &self.max_load)
            .finish()
    }
}

impl<V> Clone for HashTable<V>
where
    V: Clone,
{
    fn clone(&self) -> Self {
        let mut new_table = Self::allocate(self.capacity(), self.load_factor);

        for index in 0..self.capacity() {
            match self.ctrl(index) {
                EMPTY => {}
                DELETED => {
                    new_table.set_ctrl(index, DELETED);
                    new_table.tombstones += 1;
                }
                tag => {
                    // SAFETY: A full control byte marks an initialized slot.
                    let value = unsafe { self.slots[index].assume_init_ref() }.clone();
                    new_table.slots[index].write(value);
                    new_table.hashes[index] = self.hashes[index];
                    new_table.set_ctrl(index, tag);
                    new_table.populated += 1;
                }
            }
        }

        debug_assert_eq!(new_table.populated, self.populated);
        new_table
    }
}

impl<V> Drop for HashTable<V> {
    fn drop(&mut self) {
        if core::mem::needs_drop::<V>() && self.populated > 0 {
            self.drop_entries();
        }
    }
}

impl<V> HashTable<V> {
    /// Creates a new hash table with at least `capacity` slots and the default
    /// load factor.
    ///
    /// The slot count is rounded up to a power of two and is never below
    /// [`MIN_CAPACITY`]; any request, including zero, is accepted.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_hash::hash_table::HashTable;
    ///
    /// let table: HashTable<String> = HashTable::with_capacity(100);
    /// assert_eq!(table.capacity(), 128);
    ///
    /// let tiny: HashTable<String> = HashTable::with_capacity(0);
    /// assert_eq!(tiny.capacity(), 16);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::allocate(slots_for(capacity), DEFAULT_LOAD_FACTOR)
    }

    /// Creates a new hash table with at least `capacity` slots that rebuilds
    /// once `load_factor` of its slots are in use.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidLoadFactor`] unless `load_factor` lies
    /// strictly between 0 and 1.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_hash::hash_table::HashTable;
    ///
    /// let table: HashTable<u32> = HashTable::with_capacity_and_load_factor(32, 0.5).unwrap();
    /// assert_eq!(table.max_load(), 16);
    ///
    /// assert!(HashTable::<u32>::with_capacity_and_load_factor(32, 1.0).is_err());
    /// ```
    pub fn with_capacity_and_load_factor(
        capacity: usize,
        load_factor: f64,
    ) -> Result<Self, ConfigError> {
        let load_factor = validate_load_factor(load_factor)?;
        Ok(Self::allocate(slots_for(capacity), load_factor))
    }

    fn allocate(capacity: usize, load_factor: f64) -> Self {
        debug_assert!(capacity.is_power_of_two() && capacity >= MIN_CAPACITY);

        let group_count = capacity / GROUP_WIDTH;
        Self {
            groups: vec![ControlGroup::EMPTY; group_count].into_boxed_slice(),
            hashes: vec![0; capacity].into_boxed_slice(),
            slots: Box::new_uninit_slice(capacity),
            populated: 0,
            tombstones: 0,
            max_load: max_load_for(capacity, load_factor),
            group_mask: group_count - 1,
            load_factor,
        }
    }

    #[inline(always)]
    fn ctrl(&self, index: usize) -> u8 {
        self.groups[index / GROUP_WIDTH].bytes[index % GROUP_WIDTH]
    }

    #[inline(always)]
    fn set_ctrl(&mut self, index: usize, ctrl: u8) {
        self.groups[index / GROUP_WIDTH].bytes[index % GROUP_WIDTH] = ctrl;
    }

    #[inline(always)]
    fn home_group(&self, hash: u32) -> usize {
        (hash >> TAG_BITS) as usize & self.group_mask
    }

    fn drop_entries(&mut self) {
        for index in 0..self.slots.len() {
            if is_full(self.ctrl(index)) {
                // SAFETY: A full control byte marks an initialized slot, and the
                // control byte is reset by the caller before the slot is reused.
                unsafe { self.slots[index].assume_init_drop() };
            }
        }
    }

    /// Returns an iterator over all values in the table.
    ///
    /// Values are yielded in slot order, which is unrelated to insertion order
    /// and changes whenever the table is rebuilt.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::hash::RandomState;
    ///
    /// use swiss_hash::hash_table::HashTable;
    /// use swiss_hash::hashing::hash_of;
    ///
    /// let state = RandomState::new();
    /// let mut table = HashTable::with_capacity(10);
    /// for word in ["a", "b", "c"] {
    ///     table
    ///         .entry(hash_of(&state, word), |s: &&str| *s == word)
    ///         .or_insert(word);
    /// }
    ///
    /// let mut values: Vec<_> = table.iter().copied().collect();
    /// values.sort();
    /// assert_eq!(values, ["a", "b", "c"]);
    /// ```
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            table: self,
            index: 0,
            remaining: self.populated,
        }
    }

    /// Returns an iterator that removes and yields all values from the table.
    ///
    /// After the iterator is dropped the table is empty, holds no tombstones,
    /// and keeps its capacity.
    pub fn drain(&mut self) -> Drain<'_, V> {
        Drain {
            table: self,
            index: 0,
        }
    }

    /// Returns `true` if the table contains no elements.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the number of elements in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns the number of slots, always a power of two.
    ///
    /// The capacity never decreases over the life of the table.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns how many slots may be live or tombstoned before the next insert
    /// rebuilds the table.
    pub fn max_load(&self) -> usize {
        self.max_load
    }

    /// Returns the fraction of slots the table fills before growing.
    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Returns the number of tombstoned slots.
    #[cfg(any(test, feature = "stats"))]
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    /// Removes all elements from the table.
    ///
    /// Capacity is preserved and every slot, tombstones included, becomes
    /// empty.
    pub fn clear(&mut self) {
        if core::mem::needs_drop::<V>() && self.populated > 0 {
            self.drop_entries();
        }
        self.groups.fill(ControlGroup::EMPTY);
        self.populated = 0;
        self.tombstones = 0;
    }

    /// Makes room for at least `additional` more inserts without a rebuild.
    ///
    /// If the table already has room this does nothing. Otherwise it rebuilds
    /// at the current capacity when dropping tombstones is enough, and grows
    /// (at least doubling) when it is not.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use swiss_hash::hash_table::HashTable;
    ///
    /// let mut table: HashTable<i32> = HashTable::with_capacity(16);
    /// table.reserve(50);
    /// assert!(table.max_load() >= 50);
    /// ```
    pub fn reserve(&mut self, additional: usize) {
        let projected = self
            .populated
            .saturating_add(self.tombstones)
            .saturating_add(additional);
        if projected <= self.max_load {
            return;
        }

        let required = self.populated.saturating_add(additional);
        if required <= self.max_load {
            self.rehash_in_place();
        } else {
            self.grow(required);
        }
    }

    /// Removes and returns a value from the table.
    ///
    /// The slot is tombstoned rather than emptied so that probe chains running
    /// through it stay intact. Removal never rebuilds the table.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::hash::RandomState;
    ///
    /// use swiss_hash::hash_table::HashTable;
    /// use swiss_hash::hashing::hash_of;
    ///
    /// let state = RandomState::new();
    /// let mut table = HashTable::with_capacity(10);
    /// table.entry(hash_of(&state, &42u64), |&n: &u64| n == 42).or_insert(42);
    ///
    /// assert_eq!(table.remove(hash_of(&state, &42u64), |&n| n == 42), Some(42));
    /// assert_eq!(table.remove(hash_of(&state, &42u64), |&n| n == 42), None);
    /// assert!(table.is_empty());
    /// ```
    pub fn remove(&mut self, hash: u32, eq: impl Fn(&V) -> bool) -> Option<V> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only returns full slots.
        Some(unsafe { self.take_slot(index) })
    }

    /// Keeps only the values for which `f` returns `true`.
    ///
    /// Rejected values are removed exactly like [`remove`](Self::remove)
    /// would, leaving tombstones behind.
    pub fn retain(&mut self, mut f: impl FnMut(&mut V) -> bool) {
        for index in 0..self.capacity() {
            if self.populated == 0 {
                break;
            }
            if !is_full(self.ctrl(index)) {
                continue;
            }
            // SAFETY: A full control byte marks an initialized slot.
            let keep = f(unsafe { self.slots[index].assume_init_mut() });
            if !keep {
                // SAFETY: The slot is still full.
                drop(unsafe { self.take_slot(index) });
            }
        }
    }

    /// Gets an entry for the given hash and equality predicate.
    ///
    /// Looking up a missing value never rebuilds the table. The insert
    /// pre-check runs in [`VacantEntry::insert`], so a vacant entry that is
    /// dropped leaves capacity and tombstones untouched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::hash::RandomState;
    ///
    /// use swiss_hash::hash_table::Entry;
    /// use swiss_hash::hash_table::HashTable;
    /// use swiss_hash::hashing::hash_of;
    ///
    /// let state = RandomState::new();
    /// let mut table = HashTable::with_capacity(10);
    /// let hash = hash_of(&state, "hello");
    ///
    /// match table.entry(hash, |s: &String| s == "hello") {
    ///     Entry::Vacant(entry) => {
    ///         entry.insert("hello".to_string());
    ///     }
    ///     Entry::Occupied(mut entry) => {
    ///         entry.get_mut().push('!');
    ///     }
    /// }
    /// assert_eq!(table.len(), 1);
    /// ```
    #[inline]
    pub fn entry(&mut self, hash: u32, eq: impl Fn(&V) -> bool) -> Entry<'_, V> {
        if let Some(index) = self.find_index(hash, eq) {
            return Entry::Occupied(OccupiedEntry { table: self, index });
        }

        Entry::Vacant(VacantEntry {
            table: self,
            hash,
            batched: false,
        })
    }

    /// Runs the insert pre-check once for a batch of `len` inserts.
    ///
    /// The projection assumes as many of the new values as possible land on
    /// tombstones. Follow with [`batch_entry`](Self::batch_entry) per value.
    pub(crate) fn reserve_batch(&mut self, len: usize) {
        self.prepare_insert(len.saturating_sub(self.tombstones), len);
    }

    /// Like [`entry`](Self::entry), without the per-insert pre-check.
    ///
    /// Only grows when the batch projection turned out too optimistic, that
    /// is when this value would claim an `EMPTY` slot while the table is
    /// already at its load limit.
    pub(crate) fn batch_entry(&mut self, hash: u32, eq: impl Fn(&V) -> bool) -> Entry<'_, V> {
        if let Some(index) = self.find_index(hash, eq) {
            return Entry::Occupied(OccupiedEntry { table: self, index });
        }

        Entry::Vacant(VacantEntry {
            table: self,
            hash,
            batched: true,
        })
    }

    /// Picks the slot a new value with `hash` goes into, rebuilding first if
    /// needed. Batched inserts skip the pre-check already run by
    /// [`reserve_batch`](Self::reserve_batch).
    fn insert_slot(&mut self, hash: u32, batched: bool) -> usize {
        if !batched {
            self.prepare_insert(1, 1);
            return self.find_insert_slot(hash);
        }

        let index = self.find_insert_slot(hash);
        if self.ctrl(index) == EMPTY && self.populated + self.tombstones >= self.max_load {
            #[cfg(feature = "logging")]
            log::trace!(
                "batch insert ran out of reusable tombstones at {} live entries",
                self.populated
            );
            self.grow(self.populated + 1);
            return self.find_insert_slot(hash);
        }
        index
    }

    /// Walks the probe sequence for `hash`, returning the slot holding the
    /// value `eq` accepts.
    #[inline]
    fn find_index(&self, hash: u32, eq: impl Fn(&V) -> bool) -> Option<usize> {
        if self.populated == 0 {
            return None;
        }

        let tag = hashtag(hash);
        let mut probe = ProbeSeq::new(self.home_group(hash));
        for _ in 0..=self.group_mask {
            let group = &self.groups[probe.group];
            for offset in group.match_tag(tag) {
                let index = probe.group * GROUP_WIDTH + offset;
                // SAFETY: Tags never have the high bit set, so a tag match is a
                // full slot and therefore initialized.
                if eq(unsafe { self.slots[index].assume_init_ref() }) {
                    return Some(index);
                }
            }

            if group.match_empty().any() {
                return None;
            }
            probe.move_next(self.group_mask);
        }

        None
    }

    /// Returns the first `EMPTY` or `DELETED` slot on the probe sequence.
    #[inline]
    fn find_insert_slot(&self, hash: u32) -> usize {
        let mut probe = ProbeSeq::new(self.home_group(hash));
        for _ in 0..=self.group_mask {
            if let Some(offset) = self.groups[probe.group].match_free().lowest() {
                return probe.group * GROUP_WIDTH + offset;
            }
            probe.move_next(self.group_mask);
        }

        unreachable!("max_load keeps at least one slot free")
    }

    #[inline]
    fn write_slot(&mut self, index: usize, hash: u32, value: V) -> &mut V {
        debug_assert!(!is_full(self.ctrl(index)));
        if self.ctrl(index) == DELETED {
            self.tombstones -= 1;
        }
        self.set_ctrl(index, hashtag(hash));
        self.hashes[index] = hash;
        self.populated += 1;
        self.slots[index].write(value)
    }

    /// Tombstones a full slot and moves its value out.
    ///
    /// # Safety
    ///
    /// The slot at `index` must be full.
    #[inline]
    unsafe fn take_slot(&mut self, index: usize) -> V {
        debug_assert!(is_full(self.ctrl(index)));
        self.set_ctrl(index, DELETED);
        self.populated -= 1;
        self.tombstones += 1;
        // SAFETY: The caller guarantees the slot was full. Its control byte is
        // now `DELETED`, so nothing reads the moved-out value again.
        unsafe { self.slots[index].assume_init_read() }
    }

    /// Finds a value in the table by hash and equality predicate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::hash::RandomState;
    ///
    /// use swiss_hash::hash_table::HashTable;
    /// use swiss_hash::hashing::hash_of;
    ///
    /// let state = RandomState::new();
    /// let mut table = HashTable::with_capacity(10);
    /// table.entry(hash_of(&state, &42u64), |&n: &u64| n == 42).or_insert(42);
    ///
    /// assert_eq!(table.find(hash_of(&state, &42u64), |&n| n == 42), Some(&42));
    /// assert_eq!(table.find(hash_of(&state, &99u64), |&n| n == 99), None);
    /// ```
    #[inline]
    pub fn find(&self, hash: u32, eq: impl Fn(&V) -> bool) -> Option<&V> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only returns full slots.
        Some(unsafe { self.slots[index].assume_init_ref() })
    }

    /// Finds a value in the table by hash and equality predicate, returning a
    /// mutable reference.
    #[inline]
    pub fn find_mut(&mut self, hash: u32, eq: impl Fn(&V) -> bool) -> Option<&mut V> {
        let index = self.find_index(hash, eq)?;
        // SAFETY: `find_index` only returns full slots.
        Some(unsafe { self.slots[index].assume_init_mut() })
    }

    /// The pre-insert check. `incoming` is the number of slots the pending
    /// inserts are expected to add on top of `len + tombstones`; `required` is
    /// the number of live entries a grown table must hold.
    #[inline]
    fn prepare_insert(&mut self, incoming: usize, required: usize) {
        let projected = self.populated + self.tombstones + incoming;
        if projected > self.max_load {
            self.grow(self.populated.saturating_add(required));
        } else if self.tombstones > self.populated / 2 {
            self.rehash_in_place();
        }
    }

    #[cold]
    #[inline(never)]
    fn grow(&mut self, required: usize) {
        let mut capacity = self.capacity().checked_mul(2).expect("capacity overflow");
        while max_load_for(capacity, self.load_factor) < required {
            capacity = capacity.checked_mul(2).expect("capacity overflow");
        }

        #[cfg(feature = "logging")]
        log::debug!(
            "growing table from {} to {} slots ({} live, {} tombstones)",
            self.capacity(),
            capacity,
            self.populated,
            self.tombstones
        );
        self.rebuild(capacity);
    }

    #[cold]
    #[inline(never)]
    fn rehash_in_place(&mut self) {
        #[cfg(feature = "logging")]
        log::debug!(
            "rehashing {} slots in place to drop {} tombstones ({} live)",
            self.capacity(),
            self.tombstones,
            self.populated
        );
        self.rebuild(self.capacity());
    }

    /// Moves every live entry into a fresh table of `capacity` slots.
    /// Tombstones are not carried over.
    fn rebuild(&mut self, capacity: usize) {
        let mut old = core::mem::replace(self, Self::allocate(capacity, self.load_factor));

        for index in 0..old.capacity() {
            if !is_full(old.ctrl(index)) {
                continue;
            }
            let hash = old.hashes[index];
            // SAFETY: A full control byte marks an initialized slot. The old
            // table forgets it below, so each value is moved exactly once.
            let value = unsafe { old.slots[index].assume_init_read() };
            let target = self.find_insert_slot(hash);
            self.write_slot(target, hash, value);
        }

        debug_assert_eq!(self.populated, old.populated);
        old.populated = 0;
    }

    /// Computes how far each entry lives from its home group.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> ProbeHistogram {
        let mut counts = vec![0usize; 1];

        for index in 0..self.capacity() {
            if !is_full(self.ctrl(index)) {
                continue;
            }
            let target = index / GROUP_WIDTH;
            let mut probe = ProbeSeq::new(self.home_group(self.hashes[index]));
            let mut distance = 0;
            while probe.group != target {
                probe.move_next(self.group_mask);
                distance += 1;
            }
            if counts.len() <= distance {
                counts.resize(distance + 1, 0);
            }
            counts[distance] += 1;
        }

        ProbeHistogram { counts }
    }

    /// Returns detailed utilization statistics for debugging.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        let capacity = self.capacity();
        let slot_bytes = core::mem::size_of::<V>() + core::mem::size_of::<u32>();
        let total_bytes = capacity * (slot_bytes + 1);
        let wasted_bytes = (capacity - self.populated) * slot_bytes;

        DebugStats {
            populated: self.populated,
            tombstones: self.tombstones,
            capacity,
            max_load: self.max_load,
            load_factor: self.populated as f64 / capacity as f64,
            slot_utilization: (self.populated + self.tombstones) as f64 / capacity as f64,
            total_bytes,
            wasted_bytes,
        }
    }
}

impl<V> IntoIterator for HashTable<V> {
    type IntoIter = IntoIter<V>;
    type Item = V;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            table: self,
            index: 0,
        }
    }
}

impl<'a, V> IntoIterator for &'a HashTable<V> {
    type IntoIter = Iter<'a, V>;
    type Item = &'a V;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A view into a single entry in a table, which may either be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashTable`].
///
/// [`entry`]: HashTable::entry
pub enum Entry<'a, V> {
    /// A vacant entry - no value matched.
    Vacant(VacantEntry<'a, V>),
    /// An occupied entry - a matching value is present.
    Occupied(OccupiedEntry<'a, V>),
}

impl<'a, V> Entry<'a, V> {
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the value in the entry.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the result of `default` if the entry is vacant and returns a
    /// mutable reference to the value in the entry.
    ///
    /// The closure is not called for occupied entries.
    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Applies `f` to an occupied entry and returns the value. Vacant entries
    /// are left alone and yield `None`.
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Option<&'a mut V> {
        match self {
            Entry::Occupied(entry) => {
                let value = entry.into_mut();
                f(value);
                Some(value)
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Inserts `V::default()` if the entry is vacant and returns a mutable
    /// reference to the value in the entry.
    pub fn or_default(self) -> &'a mut V
    where
        V: Default,
    {
        self.or_insert_with(Default::default)
    }
}

/// A view into a vacant entry in the hash table.
///
/// No slot is reserved until [`insert`](Self::insert) is called.
pub struct VacantEntry<'a, V> {
    table: &'a mut HashTable<V>,
    hash: u32,
    batched: bool,
}

impl<'a, V> VacantEntry<'a, V> {
    /// Inserts a value into the vacant entry and returns a mutable reference to
    /// it.
    ///
    /// This may grow the table, or rebuild it in place to drop tombstones,
    /// before the value is written to the first `EMPTY` or `DELETED` slot on
    /// its probe sequence.
    pub fn insert(self, value: V) -> &'a mut V {
        let table = self.table;
        let index = table.insert_slot(self.hash, self.batched);
        table.write_slot(index, self.hash, value)
    }
}

/// A view into an occupied entry in the hash table.
pub struct OccupiedEntry<'a, V> {
    table: &'a mut HashTable<V>,
    index: usize,
}

impl<'a, V> OccupiedEntry<'a, V> {
    /// Gets a reference to the value in the entry.
    pub fn get(&self) -> &V {
        // SAFETY: Occupied entries always point at a full slot.
        unsafe { self.table.slots[self.index].assume_init_ref() }
    }

    /// Gets a mutable reference to the value in the entry.
    pub fn get_mut(&mut self) -> &mut V {
        // SAFETY: Occupied entries always point at a full slot.
        unsafe { self.table.slots[self.index].assume_init_mut() }
    }

    /// Converts the entry into a mutable reference to the value with the
    /// lifetime of the entry.
    pub fn into_mut(self) -> &'a mut V {
        let table = self.table;
        // SAFETY: Occupied entries always point at a full slot.
        unsafe { table.slots[self.index].assume_init_mut() }
    }

    /// Removes the entry from the table and returns the value.
    pub fn remove(self) -> V {
        // SAFETY: Occupied entries always point at a full slot.
        unsafe { self.table.take_slot(self.index) }
    }
}

/// An iterator over the values in a [`HashTable`], in slot order.
///
/// This struct is created by the [`iter`] method on [`HashTable`].
///
/// [`iter`]: HashTable::iter
pub struct Iter<'a, V> {
    table: &'a HashTable<V>,
    index: usize,
    remaining: usize,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        while self.index < self.table.capacity() {
            let index = self.index;
            self.index += 1;
            if is_full(self.table.ctrl(index)) {
                self.remaining -= 1;
                // SAFETY: A full control byte marks an initialized slot.
                return Some(unsafe { self.table.slots[index].assume_init_ref() });
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}

/// A draining iterator over the values in a [`HashTable`].
///
/// This struct is created by the [`drain`] method on [`HashTable`].
///
/// [`drain`]: HashTable::drain
pub struct Drain<'a, V> {
    table: &'a mut HashTable<V>,
    index: usize,
}

impl<V> Iterator for Drain<'_, V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        if self.table.populated == 0 {
            return None;
        }

        while self.index < self.table.capacity() {
            let index = self.index;
            self.index += 1;
            if is_full(self.table.ctrl(index)) {
                self.table.set_ctrl(index, EMPTY);
                self.table.populated -= 1;
                // SAFETY: The slot was full and is now marked empty, so the value
                // is moved out exactly once.
                return Some(unsafe { self.table.slots[index].assume_init_read() });
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.populated, Some(self.table.populated))
    }
}

impl<V> Drop for Drain<'_, V> {
    fn drop(&mut self) {
        for _ in &mut *self {}

        self.table.groups.fill(ControlGroup::EMPTY);
        self.table.tombstones = 0;
    }
}

/// An owning iterator over the values of a [`HashTable`].
pub struct IntoIter<V> {
    table: HashTable<V>,
    index: usize,
}

impl<V> Iterator for IntoIter<V> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        if self.table.populated == 0 {
            return None;
        }

        while self.index < self.table.capacity() {
            let index = self.index;
            self.index += 1;
            if is_full(self.table.ctrl(index)) {
                self.table.set_ctrl(index, EMPTY);
                self.table.populated -= 1;
                // SAFETY: The slot was full and is now marked empty, so the
                // table's destructor will not drop it again.
                return Some(unsafe { self.table.slots[index].assume_init_read() });
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.populated, Some(self.table.populated))
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use core::hash::BuildHasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::hashing::hash_of;

    struct HashState {
        k0: u64,
        k1: u64,
    }

    impl HashState {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }
    }

    impl BuildHasher for HashState {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Item {
        key: u64,
        value: i32,
    }

    fn hash_key(state: &HashState, key: u64) -> u32 {
        hash_of(state, &key)
    }

    fn insert_item(table: &mut HashTable<Item>, state: &HashState, key: u64, value: i32) {
        match table.entry(hash_key(state, key), |v: &Item| v.key == key) {
            Entry::Vacant(v) => {
                v.insert(Item { key, value });
            }
            Entry::Occupied(_) => panic!("unexpected occupied for {key}: {table:#?}"),
        }
    }

    #[test]
    fn insert_and_find() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 0..32u64 {
            insert_item(&mut table, &state, k, (k as i32) * 2);
            assert_eq!(
                table.find(hash_key(&state, k), |v| v.key == k),
                Some(&Item {
                    key: k,
                    value: (k as i32) * 2
                }),
                "{:#?}",
                table
            );
        }
        assert_eq!(table.len(), 32);
        for k in 0..32u64 {
            assert_eq!(
                table.find(hash_key(&state, k), |v| v.key == k).map(|v| v.value),
                Some((k as i32) * 2)
            );
        }

        let miss_hash = hash_key(&state, 999);
        assert!(table.find(miss_hash, |v| v.key == 999).is_none());
    }

    #[test]
    fn capacity_is_coerced_to_power_of_two() {
        assert_eq!(HashTable::<u8>::with_capacity(0).capacity(), 16);
        assert_eq!(HashTable::<u8>::with_capacity(1).capacity(), 16);
        assert_eq!(HashTable::<u8>::with_capacity(17).capacity(), 32);
        assert_eq!(HashTable::<u8>::with_capacity(64).capacity(), 64);
        assert_eq!(HashTable::<u8>::with_capacity(100).capacity(), 128);
    }

    #[test]
    fn max_load_follows_load_factor() {
        assert_eq!(HashTable::<u8>::with_capacity(16).max_load(), 14);
        assert_eq!(HashTable::<u8>::with_capacity(32).max_load(), 28);
        assert_eq!(HashTable::<u8>::with_capacity(64).max_load(), 56);

        let tight = HashTable::<u8>::with_capacity_and_load_factor(16, 0.999).unwrap();
        assert_eq!(tight.max_load(), 15);
        let loose = HashTable::<u8>::with_capacity_and_load_factor(16, 0.01).unwrap();
        assert_eq!(loose.max_load(), 1);
    }

    #[test]
    fn rejects_load_factor_outside_unit_interval() {
        for lf in [0.0, 1.0, -0.5, 1.5, f64::NAN, f64::INFINITY] {
            assert!(
                HashTable::<u8>::with_capacity_and_load_factor(16, lf).is_err(),
                "accepted {lf}"
            );
        }
        assert_eq!(
            HashTable::<u8>::with_capacity_and_load_factor(16, 2.0).unwrap_err(),
            ConfigError::InvalidLoadFactor(2.0)
        );
    }

    #[test]
    fn duplicate_entry_is_occupied() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        let k = 42u64;
        let hash = hash_key(&state, k);

        insert_item(&mut table, &state, k, 7);

        match table.entry(hash, |v| v.key == k) {
            Entry::Occupied(mut occ) => {
                let prev_value = occ.get().value;
                occ.get_mut().value = 11;
                assert_eq!(prev_value, 7);
            }
            Entry::Vacant(_) => panic!("should be occupied: {k}#{hash:08X} in {table:#?}"),
        }
        assert_eq!(table.find(hash, |v| v.key == k).unwrap().value, 11);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn find_mut_and_modify() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 0..5u64 {
            insert_item(&mut table, &state, k, 1);
        }

        for k in 0..5u64 {
            if let Some(v) = table.find_mut(hash_key(&state, k), |v| v.key == k) {
                v.value += 9;
            }
        }
        for k in 0..5u64 {
            let v = table.find(hash_key(&state, k), |v| v.key == k).unwrap();
            assert_eq!(v.value, 10);
        }
    }

    #[test]
    fn remove_leaves_tombstones() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 0..8u64 {
            insert_item(&mut table, &state, k, k as i32);
        }
        assert_eq!(table.len(), 8);
        for k in [0u64, 3, 7] {
            let removed = table
                .remove(hash_key(&state, k), |v| v.key == k)
                .expect("should remove");
            assert_eq!(removed.key, k);
        }
        assert_eq!(table.len(), 5);
        assert_eq!(table.tombstones(), 3);

        assert!(table.remove(hash_key(&state, 1000), |v| v.key == 1000).is_none());
        assert!(table.remove(hash_key(&state, 3), |v| v.key == 3).is_none());
        assert_eq!(table.tombstones(), 3);
    }

    #[test]
    fn lookups_skip_tombstones() {
        // Every key shares one probe chain, so removing the early ones leaves
        // tombstones in front of the survivors.
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 0..12u64 {
            match table.entry(0, |v| v.key == k) {
                Entry::Vacant(v) => {
                    v.insert(Item {
                        key: k,
                        value: k as i32,
                    });
                }
                Entry::Occupied(_) => unreachable!(),
            }
        }
        for k in 0..6u64 {
            assert!(table.remove(0, |v| v.key == k).is_some());
        }
        for k in 6..12u64 {
            assert_eq!(table.find(0, |v| v.key == k).map(|v| v.value), Some(k as i32));
        }
        for k in 0..6u64 {
            assert!(table.find(0, |v| v.key == k).is_none());
        }
    }

    #[test]
    fn insert_reuses_tombstone_on_chain() {
        let mut table: HashTable<Item> = HashTable::with_capacity(64);
        for k in 0..4u64 {
            table.entry(0, |v| v.key == k).or_insert(Item { key: k, value: 0 });
        }
        table.remove(0, |v| v.key == 1).unwrap();
        assert_eq!(table.tombstones(), 1);

        // Tombstones (1) do not exceed half of the live entries (3 / 2), so
        // the insert lands on the tombstone instead of rehashing.
        table.entry(0, |v| v.key == 9).or_insert(Item { key: 9, value: 9 });
        assert_eq!(table.tombstones(), 0);
        assert_eq!(table.len(), 4);
        assert_eq!(table.capacity(), 64);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn insert_many() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 0..100000u64 {
            insert_item(&mut table, &state, k, k as i32);
            assert!(table.len() + table.tombstones() <= table.max_load());
        }

        assert_eq!(table.len(), 100000);
        assert!(table.capacity().is_power_of_two());
        for k in 0..100000u64 {
            assert_eq!(
                table.find(hash_key(&state, k), |v| v.key == k),
                Some(&Item {
                    key: k,
                    value: k as i32
                })
            );
        }
    }

    #[test]
    fn explicit_collision() {
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        let hash = 0;
        for k in 0..65u64 {
            match table.entry(hash, |v| v.key == k) {
                Entry::Vacant(v) => {
                    v.insert(Item {
                        key: k,
                        value: k as i32,
                    });
                }
                _ => unreachable!(),
            }
        }

        assert_eq!(table.len(), 65);
        for k in 0..65u64 {
            assert_eq!(
                table.find(hash, |v| v.key == k),
                Some(&Item {
                    key: k,
                    value: k as i32
                }),
                "{:#?}",
                table
            );
        }
    }

    #[test]
    fn growth_at_least_doubles() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(16);
        let mut last_capacity = table.capacity();
        for k in 0..1000u64 {
            insert_item(&mut table, &state, k, 0);
            let capacity = table.capacity();
            assert!(capacity == last_capacity || capacity >= last_capacity * 2);
            last_capacity = capacity;
        }
    }

    #[test]
    fn tombstone_rehash_keeps_capacity() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(256);
        for k in 0..40u64 {
            insert_item(&mut table, &state, k, 0);
        }
        for k in 0..30u64 {
            table.remove(hash_key(&state, k), |v| v.key == k).unwrap();
        }
        assert_eq!(table.tombstones(), 30);

        // 30 tombstones against 10 live entries: the next insert rebuilds at
        // the same size.
        insert_item(&mut table, &state, 1000, 0);
        assert_eq!(table.capacity(), 256);
        assert_eq!(table.tombstones(), 0);
        assert_eq!(table.len(), 11);
        for k in 30..40u64 {
            assert!(table.find(hash_key(&state, k), |v| v.key == k).is_some());
        }
    }

    #[test]
    fn unused_vacant_entry_defers_rebuild() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(16);
        for k in 0..14u64 {
            insert_item(&mut table, &state, k, 0);
        }
        assert_eq!(table.capacity(), 16);

        let hash = hash_key(&state, 99);
        assert!(matches!(table.entry(hash, |v| v.key == 99), Entry::Vacant(_)));
        assert_eq!(table.capacity(), 16);

        table.entry(hash, |v| v.key == 99).or_insert(Item { key: 99, value: 0 });
        assert_eq!(table.capacity(), 32);
        assert_eq!(table.len(), 15);

        for k in 0..10u64 {
            table.remove(hash_key(&state, k), |v| v.key == k).unwrap();
        }
        let missing = hash_key(&state, 500);
        assert!(
            table
                .entry(missing, |v| v.key == 500)
                .and_modify(|v| v.value += 1)
                .is_none()
        );
        assert_eq!(table.tombstones(), 10);

        insert_item(&mut table, &state, 500, 0);
        assert_eq!(table.tombstones(), 0);
        assert_eq!(table.capacity(), 32);
    }

    #[test]
    fn reserve_rehashes_or_grows() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(32);
        for k in 0..20u64 {
            insert_item(&mut table, &state, k, 0);
        }
        for k in 0..10u64 {
            table.remove(hash_key(&state, k), |v| v.key == k).unwrap();
        }

        // 10 live + 10 tombstones + 10 > 28, but 20 live fits: rehash only.
        table.reserve(10);
        assert_eq!(table.capacity(), 32);
        assert_eq!(table.tombstones(), 0);

        table.reserve(100);
        assert!(table.max_load() >= 110);
        assert_eq!(table.len(), 10);
    }

    #[test]
    fn iter_and_drain() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 10..20u64 {
            insert_item(&mut table, &state, k, (k as i32) + 1);
        }
        table.remove(hash_key(&state, 10), |v| v.key == 10).unwrap();

        let iter = table.iter();
        assert_eq!(iter.len(), 9);
        let collected: Vec<u64> = iter.map(|v| v.key).collect();
        assert_eq!(collected.len(), 9, "{:#?}", table);
        for k in 11..20u64 {
            assert!(collected.contains(&k));
        }

        let capacity = table.capacity();
        let drained: Vec<Item> = table.drain().collect();
        assert_eq!(drained.len(), 9);
        assert_eq!(table.len(), 0);
        assert_eq!(table.tombstones(), 0);
        assert_eq!(table.capacity(), capacity);

        for k in 10..20u64 {
            assert!(table.find(hash_key(&state, k), |v| v.key == k).is_none());
        }
    }

    #[test]
    fn partial_drain_empties_table() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 0..10u64 {
            insert_item(&mut table, &state, k, 0);
        }
        {
            let mut drain = table.drain();
            assert!(drain.next().is_some());
        }
        assert!(table.is_empty());
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn into_iter_yields_everything() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 0..50u64 {
            insert_item(&mut table, &state, k, 0);
        }
        let mut keys: Vec<u64> = table.into_iter().map(|v| v.key).collect();
        keys.sort_unstable();
        assert_eq!(keys, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn retain_tombstones_rejected_values() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 0..20u64 {
            insert_item(&mut table, &state, k, k as i32);
        }
        table.retain(|v| v.key % 2 == 0);
        assert_eq!(table.len(), 10);
        assert_eq!(table.tombstones(), 10);
        for k in 0..20u64 {
            assert_eq!(
                table.find(hash_key(&state, k), |v| v.key == k).is_some(),
                k % 2 == 0
            );
        }
    }

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct StringItem {
        key: String,
        value: i32,
    }

    #[test]
    fn insert_and_find_string_keys() {
        let state = HashState::default();
        let mut table: HashTable<StringItem> = HashTable::with_capacity(0);
        let keys = ["hello", "world", "foo", "bar", "baz"];

        for (i, k) in keys.iter().enumerate() {
            match table.entry(hash_of(&state, *k), |v: &StringItem| v.key == *k) {
                Entry::Vacant(v) => {
                    v.insert(StringItem {
                        key: k.to_string(),
                        value: i as i32,
                    });
                }
                Entry::Occupied(_) => panic!("unexpected occupied on first insert"),
            }
        }

        assert_eq!(table.len(), keys.len());
        for (i, k) in keys.iter().enumerate() {
            let found = table.find(hash_of(&state, *k), |v| v.key == *k).unwrap();
            assert_eq!(found.value, i as i32);
        }
        assert!(table.find(hash_of(&state, "nope"), |v| v.key == "nope").is_none());
    }

    #[test]
    fn entry_or_insert_with() {
        let state = HashState::default();
        let mut table: HashTable<StringItem> = HashTable::with_capacity(0);
        let hash = hash_of(&state, "k");

        let value = table
            .entry(hash, |v| v.key == "k")
            .or_insert_with(|| StringItem {
                key: "k".to_string(),
                value: 1,
            });
        value.value += 1;

        let value = table
            .entry(hash, |v| v.key == "k")
            .or_insert_with(|| panic!("should not be called"));
        assert_eq!(value.value, 2);
    }

    #[test]
    fn entry_and_modify_and_remove() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        let hash = hash_key(&state, 5);

        assert!(table.entry(hash, |v| v.key == 5).and_modify(|v| v.value += 1).is_none());
        insert_item(&mut table, &state, 5, 1);
        let modified = table.entry(hash, |v| v.key == 5).and_modify(|v| v.value += 1);
        assert_eq!(modified.map(|v| v.value), Some(2));

        match table.entry(hash, |v| v.key == 5) {
            Entry::Occupied(occ) => assert_eq!(occ.remove().value, 2),
            Entry::Vacant(_) => panic!("should be occupied"),
        }
        assert!(table.is_empty());
        assert_eq!(table.tombstones(), 1);
    }

    #[test]
    fn clear_resets_tombstones() {
        let state = HashState::default();
        let mut table: HashTable<StringItem> = HashTable::with_capacity(0);
        for i in 0..10 {
            let key = i.to_string();
            table
                .entry(hash_of(&state, key.as_str()), |v| v.key == key)
                .or_insert(StringItem {
                    key: key.clone(),
                    value: i,
                });
        }
        table.remove(hash_of(&state, "3"), |v| v.key == "3").unwrap();
        let capacity = table.capacity();

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.tombstones(), 0);
        assert_eq!(table.capacity(), capacity);
        assert!(table.find(hash_of(&state, "4"), |v| v.key == "4").is_none());
    }

    #[test]
    fn histogram_output() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 0..1000u64 {
            insert_item(&mut table, &state, k, 0);
        }

        let histogram = table.probe_histogram();
        assert_eq!(histogram.counts.iter().sum::<usize>(), 1000);
        assert!(histogram.counts[0] > 0);
    }

    #[test]
    fn debug_stats_track_population() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(64);
        for k in 0..10u64 {
            insert_item(&mut table, &state, k, 0);
        }
        table.remove(hash_key(&state, 0), |v| v.key == 0).unwrap();

        let stats = table.debug_stats();
        assert_eq!(stats.populated, 9);
        assert_eq!(stats.tombstones, 1);
        assert_eq!(stats.capacity, 64);
        assert_eq!(stats.max_load, 56);
        assert!(stats.wasted_bytes < stats.total_bytes);
    }

    #[test]
    fn test_clone() {
        let state = HashState::default();
        let mut table: HashTable<Item> = HashTable::with_capacity(0);
        for k in 0..20u64 {
            insert_item(&mut table, &state, k, k as i32);
        }
        table.remove(hash_key(&state, 3), |v| v.key == 3).unwrap();

        let mut cloned = table.clone();
        assert_eq!(cloned.len(), table.len());
        assert_eq!(cloned.tombstones(), table.tombstones());
        assert_eq!(cloned.capacity(), table.capacity());

        for k in 0..20u64 {
            assert_eq!(
                cloned.find(hash_key(&state, k), |v| v.key == k),
                table.find(hash_key(&state, k), |v| v.key == k)
            );
        }

        cloned.find_mut(hash_key(&state, 1), |v| v.key == 1).unwrap().value = 100;
        assert_eq!(table.find(hash_key(&state, 1), |v| v.key == 1).unwrap().value, 1);
    }

    #[test]
    fn values_are_dropped() {
        use alloc::rc::Rc;

        let marker = Rc::new(());
        {
            let mut table: HashTable<(u64, Rc<()>)> = HashTable::with_capacity(0);
            for k in 0..100u64 {
                table
                    .entry(k as u32, |(key, _)| *key == k)
                    .or_insert((k, marker.clone()));
            }
            assert_eq!(Rc::strong_count(&marker), 101);

            // Removal hands the value back instead of keeping it alive.
            drop(table.remove(7, |(key, _)| *key == 7));
            assert_eq!(Rc::strong_count(&marker), 100);

            table.clear();
            assert_eq!(Rc::strong_count(&marker), 1);

            for k in 0..10u64 {
                table
                    .entry(k as u32, |(key, _)| *key == k)
                    .or_insert((k, marker.clone()));
            }
        }
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn group_scan_matches_scalar_definition() {
        let mut group = ControlGroup::EMPTY;
        group.bytes[0] = 0x12;
        group.bytes[3] = DELETED;
        group.bytes[GROUP_WIDTH - 1] = 0x12;

        let tags: Vec<usize> = group.match_tag(0x12).collect();
        assert_eq!(tags, vec![0, GROUP_WIDTH - 1]);

        let free: Vec<usize> = group.match_free().collect();
        assert_eq!(free.len(), GROUP_WIDTH - 2);
        assert!(free.contains(&3));
        assert!(!free.contains(&0));

        let empty: Vec<usize> = group.match_empty().collect();
        assert_eq!(empty.len(), GROUP_WIDTH - 3);
        assert!(!empty.contains(&3));
    }

    #[test]
    fn probe_sequence_visits_every_group() {
        for group_count in [1usize, 2, 4, 8, 64] {
            let mask = group_count - 1;
            for start in 0..group_count {
                let mut seen = vec![false; group_count];
                let mut probe = ProbeSeq::new(start);
                for _ in 0..group_count {
                    seen[probe.group] = true;
                    probe.move_next(mask);
                }
                assert!(seen.iter().all(|&s| s), "{group_count} groups from {start}");
            }
        }
    }

    #[test]
    fn hash_bits_split_into_tag_and_group() {
        let table: HashTable<u8> = HashTable::with_capacity(64);
        assert_eq!(table.home_group(0), 0);
        assert_eq!(table.home_group(1 << TAG_BITS), 1 & table.group_mask);
        assert_eq!(hashtag(0xFFFF_FFFF), 0x7F);
    }
}
