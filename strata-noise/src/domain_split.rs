use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::NoiseError;
use crate::sample_context::{ContextPool, SampleContext};

/// Cooperative cancellation flag, checked before every inner-loop iteration
/// and every recursive split. Clone it, hand it to another thread, call
/// `cancel` to abort in-flight generation.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Re-arms the token so the owning generator can be used again after a
    /// cancelled call.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Relaxed);
    }
}

/// Shared output buffer for quad-split slice leaves.
///
/// Rows of one leaf's region are not contiguous in the flat buffer, so the
/// usual `split_at_mut` partitioning cannot express the quad split; leaves
/// write through a raw pointer instead, each to its own disjoint region.
struct BufferPtr {
    ptr: *mut f64,
}

unsafe impl Send for BufferPtr {}
unsafe impl Sync for BufferPtr {}

/// Recursively bisects one segment's index domain and computes the leaves on
/// a work-stealing pool. Splitting only changes how elements are computed,
/// never which coordinate maps to which output index, so parallel output is
/// bit-identical to serial output.
pub(crate) struct DomainSplitter<'a> {
    pool: &'a rayon::ThreadPool,
    contexts: &'a ContextPool,
    cancel: &'a CancellationToken,
    started: Instant,
    deadline: Option<Instant>,
}

impl<'a> DomainSplitter<'a> {
    pub fn new(
        pool: &'a rayon::ThreadPool,
        contexts: &'a ContextPool,
        cancel: &'a CancellationToken,
        timeout: Option<Duration>,
    ) -> Self {
        let started = Instant::now();
        Self {
            pool,
            contexts,
            cancel,
            started,
            deadline: timeout.map(|limit| started + limit),
        }
    }

    /// Elements per leaf, sized so the leaf count roughly matches the pool
    /// parallelism.
    fn leaf_size(&self, total: usize) -> usize {
        (total / self.pool.current_num_threads().max(1)).max(1)
    }

    #[inline]
    fn checkpoint(&self) -> Result<(), NoiseError> {
        if self.cancel.is_cancelled() {
            return Err(NoiseError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(NoiseError::LayerProcessTimeout {
                    waited_ms: self.started.elapsed().as_millis() as u64,
                });
            }
        }
        Ok(())
    }

    pub fn fill_line<F>(&self, out: &mut [f64], sample: &F) -> Result<(), NoiseError>
    where
        F: Fn(&mut SampleContext, usize) -> Result<f64, NoiseError> + Sync,
    {
        if self.pool.current_num_threads() <= 1 {
            return self.line_leaf(0, out, sample);
        }
        let leaf = self.leaf_size(out.len());
        flatten_panic(panic::catch_unwind(AssertUnwindSafe(|| {
            self.pool.install(|| self.split_line(0, out, leaf, sample))
        })))
    }

    fn split_line<F>(
        &self,
        offset: usize,
        out: &mut [f64],
        leaf: usize,
        sample: &F,
    ) -> Result<(), NoiseError>
    where
        F: Fn(&mut SampleContext, usize) -> Result<f64, NoiseError> + Sync,
    {
        self.checkpoint()?;
        if out.len() <= leaf {
            return self.line_leaf(offset, out, sample);
        }
        let mid = out.len() / 2;
        let (low, high) = out.split_at_mut(mid);
        let (left, right) = rayon::join(
            || self.split_line(offset, low, leaf, sample),
            || self.split_line(offset + mid, high, leaf, sample),
        );
        left.and(right)
    }

    fn line_leaf<F>(&self, offset: usize, out: &mut [f64], sample: &F) -> Result<(), NoiseError>
    where
        F: Fn(&mut SampleContext, usize) -> Result<f64, NoiseError> + Sync,
    {
        let mut context = self.contexts.acquire();
        let result = (|| {
            for (index, slot) in out.iter_mut().enumerate() {
                self.checkpoint()?;
                *slot = sample(&mut context, offset + index)?;
            }
            Ok(())
        })();
        self.contexts.release(context);
        result
    }

    pub fn fill_slice<F>(
        &self,
        out: &mut [f64],
        width: usize,
        height: usize,
        sample: &F,
    ) -> Result<(), NoiseError>
    where
        F: Fn(&mut SampleContext, usize, usize) -> Result<f64, NoiseError> + Sync,
    {
        debug_assert_eq!(out.len(), width * height);
        let buffer = BufferPtr {
            ptr: out.as_mut_ptr(),
        };
        if self.pool.current_num_threads() <= 1 {
            return self.slice_leaf(&buffer, width, 0, width, 0, height, sample);
        }
        let leaf = self.leaf_size(out.len());
        flatten_panic(panic::catch_unwind(AssertUnwindSafe(|| {
            self.pool
                .install(|| self.split_slice(&buffer, width, 0, width, 0, height, leaf, sample))
        })))
    }

    #[allow(clippy::too_many_arguments)]
    fn split_slice<F>(
        &self,
        buffer: &BufferPtr,
        width: usize,
        x0: usize,
        x1: usize,
        y0: usize,
        y1: usize,
        leaf: usize,
        sample: &F,
    ) -> Result<(), NoiseError>
    where
        F: Fn(&mut SampleContext, usize, usize) -> Result<f64, NoiseError> + Sync,
    {
        self.checkpoint()?;
        let columns = x1 - x0;
        let rows = y1 - y0;
        if columns * rows <= leaf || (columns <= 1 && rows <= 1) {
            return self.slice_leaf(buffer, width, x0, x1, y0, y1, sample);
        }

        if columns > 1 && rows > 1 {
            let xm = x0 + columns / 2;
            let ym = y0 + rows / 2;
            let ((a, b), (c, d)) = rayon::join(
                || {
                    rayon::join(
                        || self.split_slice(buffer, width, x0, xm, y0, ym, leaf, sample),
                        || self.split_slice(buffer, width, xm, x1, y0, ym, leaf, sample),
                    )
                },
                || {
                    rayon::join(
                        || self.split_slice(buffer, width, x0, xm, ym, y1, leaf, sample),
                        || self.split_slice(buffer, width, xm, x1, ym, y1, leaf, sample),
                    )
                },
            );
            a.and(b).and(c).and(d)
        } else if rows > 1 {
            let ym = y0 + rows / 2;
            let (a, b) = rayon::join(
                || self.split_slice(buffer, width, x0, x1, y0, ym, leaf, sample),
                || self.split_slice(buffer, width, x0, x1, ym, y1, leaf, sample),
            );
            a.and(b)
        } else {
            let xm = x0 + columns / 2;
            let (a, b) = rayon::join(
                || self.split_slice(buffer, width, x0, xm, y0, y1, leaf, sample),
                || self.split_slice(buffer, width, xm, x1, y0, y1, leaf, sample),
            );
            a.and(b)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn slice_leaf<F>(
        &self,
        buffer: &BufferPtr,
        width: usize,
        x0: usize,
        x1: usize,
        y0: usize,
        y1: usize,
        sample: &F,
    ) -> Result<(), NoiseError>
    where
        F: Fn(&mut SampleContext, usize, usize) -> Result<f64, NoiseError> + Sync,
    {
        let mut context = self.contexts.acquire();
        let result = (|| {
            for y in y0..y1 {
                for x in x0..x1 {
                    self.checkpoint()?;
                    let value = sample(&mut context, x, y)?;
                    // SAFETY: leaves cover pairwise-disjoint (x, y) regions
                    // of a buffer that outlives the enclosing parallel scope,
                    // so no element is written by two leaves.
                    unsafe {
                        *buffer.ptr.add(y * width + x) = value;
                    }
                }
            }
            Ok(())
        })();
        self.contexts.release(context);
        result
    }
}

/// Maps a worker panic into `LayerProcessFailure`, keeping the panic message
/// when it was a string.
fn flatten_panic(
    outcome: Result<Result<(), NoiseError>, Box<dyn std::any::Any + Send>>,
) -> Result<(), NoiseError> {
    match outcome {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".to_string());
            Err(NoiseError::LayerProcessFailure(message))
        }
    }
}
