//! Host cache-timing microbenchmark.
//!
//! Two page-aligned buffers of `NPAGES` pages each: `a` is filled with a
//! constant, `b` with indices modulo `NPAGES`. Every iteration reads
//! `a[NPAGES * b[j]]` under a condition held in a single byte, then flushes
//! that byte's cache line, so the condition is always a miss while the
//! dependent load runs ahead speculatively.

use std::alloc::{self, Layout};
use std::hint::black_box;
use std::ptr::NonNull;

/// Pages per buffer.
pub const NPAGES: usize = 19;

/// Default iteration budget.
pub const DEFAULT_ITERS: usize = 1_000_000;

/// Value every byte of `a` holds (234 as a signed byte).
const FILL: i8 = -22;

/// Host page size, falling back to 4 KiB if the query fails.
fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    usize::try_from(raw).ok().filter(|p| p.is_power_of_two()).unwrap_or(4096)
}

/// Zeroed, page-aligned heap buffer.
struct PageBuffer {
    ptr: NonNull<i8>,
    layout: Layout,
}

impl PageBuffer {
    fn new(len: usize, align: usize) -> Self {
        let Ok(layout) = Layout::from_size_align(len.max(1), align) else {
            panic!("invalid buffer layout: {len} bytes aligned to {align}");
        };
        // SAFETY: the layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw.cast::<i8>()) else {
            alloc::handle_alloc_error(layout);
        };
        Self { ptr, layout }
    }

    fn as_mut_slice(&mut self) -> &mut [i8] {
        // SAFETY: the allocation holds `layout.size()` initialized bytes and
        // is exclusively borrowed through `self`.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl Drop for PageBuffer {
    fn drop(&mut self) {
        // SAFETY: allocated in `new` with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr().cast(), self.layout) };
    }
}

/// Evicts the cache line holding `addr`.
#[inline(always)]
fn flush<T>(addr: &T) {
    #[cfg(target_arch = "x86_64")]
    // SAFETY: clflush accepts any mapped address; `addr` is a live reference.
    unsafe {
        std::arch::x86_64::_mm_clflush(std::ptr::from_ref(addr).cast::<u8>());
    }
    #[cfg(not(target_arch = "x86_64"))]
    let _ = black_box(addr);
}

/// Runs the benchmark.
///
/// # Arguments
///
/// * `iters` - Iteration budget; only whole passes over the buffers run.
///
/// # Returns
///
/// The accumulated checksum, starting from 1 and wrapping.
pub fn run(iters: usize) -> u64 {
    let len = NPAGES * page_size();
    let align = page_size();
    let mut a_buf = PageBuffer::new(len, align);
    let mut b_buf = PageBuffer::new(len, align);
    let a = a_buf.as_mut_slice();
    let b = b_buf.as_mut_slice();

    for (i, (ai, bi)) in a.iter_mut().zip(b.iter_mut()).enumerate() {
        *ai = FILL;
        *bi = i8::try_from(i % NPAGES).unwrap_or_default();
    }

    let acc: u8 = 1;
    let mut y: u64 = 1;
    for _ in 0..iters / len {
        for &idx in b.iter() {
            if black_box(acc) != 0 {
                let idx = NPAGES * idx as usize;
                y = y.wrapping_add_signed(i64::from(a[idx]));
            }
            flush(&acc);
        }
    }
    y
}
