//! Fixie Registry
//!
//! Fixies are pinned objects: allocated from caller-supplied memory, traced
//! and aged like nursery objects, but never moved. The collector keeps one
//! record per fixie in an address-keyed registry. Records outlive the
//! objects they describe: a fixie found dead is only marked so, and stays
//! queryable until the runtime calls for disposal.
//!
//! A fixie that survives enough passes tenures in place. From then on it is
//! treated like tenured memory: skipped by nursery-only passes, judged
//! again only when the whole heap is on the table.

use indexmap::IndexMap;

/// Bookkeeping for one pinned object.
#[derive(Debug)]
pub(crate) struct Fixie {
    pub size_words: usize,
    pub age: u8,
    pub marked: bool,
    pub tenured: bool,
    pub immortal: bool,
    pub dead: bool,
}

/// Outcome of touching a fixie during evacuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FixieTouch {
    /// First touch this pass; the caller must queue the fixie for a field
    /// walk.
    Walk,
    /// First touch, but the fixie is tenured and this pass does not trace
    /// the tenured generation.
    Skip,
    /// Already touched this pass.
    Seen,
}

/// Result of the end-of-pass sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct FixieSweep {
    pub marked: usize,
    /// Fixies that crossed the tenure threshold this pass. The heap must
    /// remember their reference slots: a tenured fixie is skipped by
    /// nursery-only passes, and slots written before tenure never went
    /// through the write barrier.
    pub newly_tenured: Vec<usize>,
    pub died: usize,
}

/// Transient records removed by disposal, with the address ranges they
/// covered.
#[derive(Debug, Default)]
pub(crate) struct DisposedFixies {
    pub count: usize,
    pub words: usize,
    pub ranges: Vec<(usize, usize)>,
}

#[derive(Default)]
pub(crate) struct FixieSet {
    records: IndexMap<usize, Fixie>,
    footprint_words: usize,
}

impl FixieSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: usize, size_words: usize, immortal: bool) {
        debug_assert!(size_words > 0);
        debug_assert!(
            !self.records.contains_key(&address),
            "fixie registered twice at {address:#x}"
        );
        // Immortal fixies sit outside the budget, like the immortal region.
        if !immortal {
            self.footprint_words += size_words;
        }
        self.records.insert(
            address,
            Fixie {
                size_words,
                age: 0,
                marked: false,
                tenured: false,
                immortal,
                dead: false,
            },
        );
    }

    pub fn get(&self, address: usize) -> Option<&Fixie> {
        self.records.get(&address)
    }

    pub fn contains(&self, address: usize) -> bool {
        self.records.contains_key(&address)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Budget charge for transient fixies, dead ones included until they
    /// are disposed.
    pub fn footprint_words(&self) -> usize {
        self.footprint_words
    }

    /// Addresses of immortal fixies, which every pass treats as roots.
    pub fn immortal_addresses(&self) -> Vec<usize> {
        self.records
            .iter()
            .filter(|(_, f)| f.immortal)
            .map(|(addr, _)| *addr)
            .collect()
    }

    /// Clear the per-pass mark bits.
    pub fn begin_pass(&mut self) {
        for record in self.records.values_mut() {
            record.marked = false;
        }
    }

    /// Record that the pass reached the fixie at `address`. Returns `None`
    /// when no such fixie exists.
    pub fn touch(&mut self, address: usize, is_major: bool) -> Option<FixieTouch> {
        let record = self.records.get_mut(&address)?;
        if record.marked {
            return Some(FixieTouch::Seen);
        }
        record.marked = true;
        record.dead = false;
        if record.tenured && !is_major {
            Some(FixieTouch::Skip)
        } else {
            Some(FixieTouch::Walk)
        }
    }

    /// End-of-pass verdicts: age survivors, tenure the persistent, declare
    /// the unreached dead.
    ///
    /// Transient fixies age on every pass that marks them and die on any
    /// pass that does not. Tenured fixies are only judged when the pass
    /// traced the tenured generation.
    pub fn sweep(&mut self, fixie_threshold: u8, is_major: bool) -> FixieSweep {
        let mut outcome = FixieSweep::default();
        for (address, record) in self.records.iter_mut() {
            if record.immortal {
                continue;
            }
            if record.marked {
                outcome.marked += 1;
                if !record.tenured {
                    record.age = record.age.saturating_add(1);
                    if record.age >= fixie_threshold {
                        record.tenured = true;
                        outcome.newly_tenured.push(*address);
                    }
                }
            } else if record.tenured {
                if is_major && !record.dead {
                    record.dead = true;
                    outcome.died += 1;
                }
            } else if !record.dead {
                record.dead = true;
                outcome.died += 1;
            }
        }
        outcome
    }

    /// Drop every transient record, immortal ones stay. The caller owns
    /// the underlying memory; only the bookkeeping is released.
    pub fn dispose_transient(&mut self) -> DisposedFixies {
        let mut disposed = DisposedFixies::default();
        self.records.retain(|address, record| {
            if record.immortal {
                true
            } else {
                disposed.count += 1;
                disposed.words += record.size_words;
                disposed.ranges.push((*address, record.size_words));
                false
            }
        });
        self.footprint_words = 0;
        disposed
    }
}
