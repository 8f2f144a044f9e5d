// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The fixed set of sample blocks cycled between the render loop and the
//! audio device.
//!
//! A block is owned by exactly one side at a time. The render loop fills it
//! and hands it to the device by value; the device sends it back over the
//! completion channel once it has been played. The completion channel is
//! the counting resource: the render loop can't get a block back until the
//! device has finished with it, so at most `block_count` blocks are ever in
//! flight.

use crossbeam_channel::{Receiver, Sender};

use crate::error::EngineError;

/// A fixed-size buffer of encoded samples.
#[derive(Debug)]
pub struct Block {
    index: usize,
    samples: Vec<i32>,
}

impl Block {
    fn new(index: usize, size: usize) -> Block {
        Block {
            index,
            samples: vec![0; size],
        }
    }

    /// The block's slot in the round-robin.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [i32] {
        &mut self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Hands out blocks in round-robin order as they come back from the device.
pub struct BlockPool {
    slots: Vec<Option<Block>>,
    returns: Receiver<Block>,
    cursor: usize,
}

impl BlockPool {
    /// Creates `count` blocks of `size` samples each, all free. The returned
    /// sender is the completion channel to give to the device.
    pub fn new(count: usize, size: usize) -> (BlockPool, Sender<Block>) {
        let (completions, returns) = crossbeam_channel::bounded(count);
        let pool = BlockPool {
            slots: (0..count).map(|index| Some(Block::new(index, size))).collect(),
            returns,
            cursor: 0,
        };
        (pool, completions)
    }

    /// The number of blocks in the pool.
    pub fn count(&self) -> usize {
        self.slots.len()
    }

    /// Blocks until the block at the cursor has been returned, then hands it
    /// out and moves the cursor on. Fails if the device has gone away while
    /// still holding blocks.
    pub fn acquire(&mut self) -> Result<Block, EngineError> {
        loop {
            if let Some(block) = self.slots.get_mut(self.cursor).and_then(Option::take) {
                self.cursor = (self.cursor + 1) % self.slots.len();
                return Ok(block);
            }

            let block = self.returns.recv().map_err(|_| {
                EngineError::DriverFailure("audio output closed with blocks in flight".to_string())
            })?;
            self.put_back(block);
        }
    }

    /// The number of blocks that are submitted but not yet returned.
    pub fn in_flight(&mut self) -> usize {
        while let Ok(block) = self.returns.try_recv() {
            self.put_back(block);
        }
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    fn put_back(&mut self, block: Block) {
        let index = block.index;
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(block);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_round_robin() {
        let (mut pool, completions) = BlockPool::new(3, 4);
        assert_eq!(3, pool.count());

        let mut order = Vec::new();
        for _ in 0..7 {
            let block = pool.acquire().unwrap();
            assert_eq!(4, block.len());
            order.push(block.index());
            completions.send(block).unwrap();
        }
        assert_eq!(vec![0, 1, 2, 0, 1, 2, 0], order);
    }

    #[test]
    fn test_in_flight_is_bounded() {
        let (mut pool, completions) = BlockPool::new(2, 4);
        let first = pool.acquire().unwrap();
        assert_eq!(1, pool.in_flight());
        let second = pool.acquire().unwrap();
        assert_eq!(2, pool.in_flight());

        // Out of order completion still hands the cursor's block out next.
        completions.send(second).unwrap();
        assert_eq!(1, pool.in_flight());
        completions.send(first).unwrap();
        assert_eq!(0, pool.acquire().unwrap().index());
    }

    #[test]
    fn test_acquire_waits_for_completion() {
        let (mut pool, completions) = BlockPool::new(1, 4);
        let mut block = pool.acquire().unwrap();
        block.samples_mut()[0] = 7;

        let join = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            completions.send(block).unwrap();
            completions
        });

        let block = pool.acquire().unwrap();
        assert_eq!(7, block.samples()[0]);
        join.join().unwrap();
    }

    #[test]
    fn test_closed_output_is_a_driver_failure() {
        let (mut pool, completions) = BlockPool::new(1, 4);
        let _lost = pool.acquire().unwrap();
        drop(completions);
        assert!(matches!(pool.acquire(), Err(EngineError::DriverFailure(_))));
    }
}
