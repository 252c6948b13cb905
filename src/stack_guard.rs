//! Heap-allocated thread stacks with an overflow canary.

use alloc::alloc::{alloc, dealloc, Layout};
use core::ptr::NonNull;

/// Call-stack alignment required by both supported ABIs.
pub const STACK_ALIGN: usize = 16;

const CANARY: u64 = 0xDEAD_BEEF_CAFE_BABE;

/// An exclusively owned stack region. The memory is released on drop.
pub struct Stack {
    base: NonNull<u8>,
    layout: Layout,
}

impl Stack {
    /// Allocates `size` bytes. Returns `None` if the allocator refuses.
    pub fn new(size: usize) -> Option<Self> {
        let layout = Layout::from_size_align(size, STACK_ALIGN).ok()?;
        if layout.size() < core::mem::size_of::<u64>() {
            return None;
        }
        let base = NonNull::new(unsafe { alloc(layout) })?;
        unsafe { core::ptr::write(base.as_ptr() as *mut u64, CANARY) };
        Some(Self { base, layout })
    }

    pub fn size(&self) -> usize {
        self.layout.size()
    }

    /// Highest usable address, rounded down to [`STACK_ALIGN`].
    pub fn top(&self) -> *mut u8 {
        let end = self.base.as_ptr() as usize + self.layout.size();
        (end & !(STACK_ALIGN - 1)) as *mut u8
    }

    pub fn contains(&self, addr: usize) -> bool {
        let start = self.base.as_ptr() as usize;
        addr >= start && addr < start + self.layout.size()
    }

    /// `false` once something has written over the lowest word.
    pub fn is_intact(&self) -> bool {
        unsafe { core::ptr::read(self.base.as_ptr() as *const u64) == CANARY }
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe { dealloc(self.base.as_ptr(), self.layout) };
    }
}

impl core::fmt::Debug for Stack {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Stack")
            .field("base", &self.base)
            .field("size", &self.layout.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_is_aligned_and_inside() {
        let stack = Stack::new(32 * 1024).unwrap();
        let top = stack.top() as usize;
        assert_eq!(top % STACK_ALIGN, 0);
        assert!(stack.contains(top - 1));
        assert!(!stack.contains(top));
        assert_eq!(stack.size(), 32 * 1024);
    }

    #[test]
    fn test_stack_overflow_detection() {
        let stack = Stack::new(16 * 1024).unwrap();
        assert!(stack.is_intact());

        unsafe {
            *(stack.base.as_ptr() as *mut u64) = 0xBADCAFE;
        }
        assert!(!stack.is_intact());
    }

    #[test]
    fn test_refuses_impossible_sizes() {
        assert!(Stack::new(0).is_none());
        assert!(Stack::new(usize::MAX).is_none());
    }
}
