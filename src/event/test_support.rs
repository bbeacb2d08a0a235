//! Test-only allocator that collects committed frames in memory.

use std::sync::{Arc, Mutex};

use super::EventBuilderAllocator;

pub(crate) struct VecAllocator {
    buffer: Vec<u8>,
    committed: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl VecAllocator {
    pub fn new() -> (VecAllocator, Arc<Mutex<Vec<Vec<u8>>>>) {
        let committed = Arc::new(Mutex::new(Vec::new()));
        (
            VecAllocator {
                buffer: Vec::new(),
                committed: committed.clone(),
            },
            committed,
        )
    }
}

impl EventBuilderAllocator for VecAllocator {
    fn allocate(&mut self, size: usize) -> Result<(), String> {
        if self.buffer.len() < size {
            self.buffer.resize(size, 0);
        }
        Ok(())
    }

    fn data(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    fn commit(&mut self, size: usize) -> Result<(), String> {
        self.committed
            .lock()
            .unwrap()
            .push(self.buffer[..size].to_vec());
        Ok(())
    }

    fn rollback(&mut self) {}
}
