//! Nursery - Paired Semispaces
//!
//! New objects are born in the active semispace. A pass evacuates survivors
//! into the inactive one, then the roles flip. Each semispace carries an age
//! side-table indexed by word offset: the age of the object starting at that
//! offset, incremented on every copy. Keeping ages out of band leaves every
//! bit of the client's object words alone.

use crate::error::Result;
use crate::heap::space::Space;
use crate::system::System;

pub(crate) struct Nursery {
    spaces: [Space; 2],
    ages: [Vec<u8>; 2],
    active: usize,
}

impl Nursery {
    pub fn new(system: &dyn System, semispace_words: usize) -> Result<Self> {
        let a = Space::map(system, semispace_words, "nursery-a")?;
        let b = Space::map(system, semispace_words, "nursery-b")?;
        Ok(Self {
            spaces: [a, b],
            ages: [vec![0; semispace_words], vec![0; semispace_words]],
            active: 0,
        })
    }

    pub fn semispace_words(&self) -> usize {
        self.spaces[0].capacity_words()
    }

    /// The semispace mutators allocate in. During a pass this is the
    /// from-space being evacuated.
    pub fn active_space(&self) -> &Space {
        &self.spaces[self.active]
    }

    pub fn active_space_mut(&mut self) -> &mut Space {
        &mut self.spaces[self.active]
    }

    /// The semispace survivors are copied into during a pass. Between
    /// passes it still holds the previous pass's forwarding records.
    pub fn inactive_space(&self) -> &Space {
        &self.spaces[1 - self.active]
    }

    pub fn free_words(&self) -> usize {
        self.active_space().free_words()
    }

    /// Whether `addr` lies in either semispace's mapped range.
    pub fn contains(&self, addr: usize) -> bool {
        self.spaces[0].contains(addr) || self.spaces[1].contains(addr)
    }

    /// Mutator allocation in the active semispace.
    pub fn allocate(&mut self, size_words: usize) -> Option<usize> {
        self.spaces[self.active].allocate(size_words)
    }

    /// Copy destination in the inactive semispace, used while a pass runs.
    pub fn allocate_to(&mut self, size_words: usize) -> Option<usize> {
        self.spaces[1 - self.active].allocate(size_words)
    }

    /// Age of the object starting at `addr` in the active (from) semispace.
    pub fn age_of(&self, addr: usize) -> u8 {
        let offset = self.spaces[self.active].offset_of(addr);
        self.ages[self.active][offset]
    }

    /// Record the age of a survivor placed at `addr` in the inactive (to)
    /// semispace.
    pub fn set_to_age(&mut self, addr: usize, age: u8) {
        let index = 1 - self.active;
        let offset = self.spaces[index].offset_of(addr);
        self.ages[index][offset] = age;
    }

    /// Prepare the inactive semispace to receive survivors. Whatever it
    /// held (two passes of stale copies and forwarding records) is dead.
    pub fn begin_pass(&mut self) {
        let to = 1 - self.active;
        self.spaces[to].reset();
        self.ages[to].fill(0);
    }

    /// Flip: the semispace that received survivors becomes the allocation
    /// space. The old active space keeps its cursor and forwarding records
    /// until the next pass resets it, so stale addresses stay resolvable.
    pub fn end_pass(&mut self) {
        self.active = 1 - self.active;
    }
}
