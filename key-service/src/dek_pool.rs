//! Pooled plaintext DEK buffers. Every buffer handed to an operation is
//! zeroized before it is returned to the pool (or dropped), so plaintext
//! key material never outlives the operation frame that requested it.
use crypto::CryptoError;
use parking_lot::Mutex;
use rand::RngCore;
use std::sync::Arc;
use zeroize::Zeroize;

/// Population count of set bits must land in `[3N/8, 5N/8]` of the total
/// bit count `N`. A buffer outside that band is rejected as
/// non-random-looking (all zero, all one, or heavily biased) even though
/// it came from a CSPRNG — this is a coarse sanity check, not a
/// statistical test suite.
pub fn entropy_in_bounds(buf: &[u8]) -> bool {
    let total_bits = buf.len() * 8;
    let set_bits: u32 = buf.iter().map(|b| b.count_ones()).sum();
    let set_bits = set_bits as usize;
    set_bits * 8 >= total_bits * 3 && set_bits * 8 <= total_bits * 5
}

pub struct DekBuffer {
    pool: Arc<Mutex<Vec<Vec<u8>>>>,
    size: usize,
    bytes: Vec<u8>,
}

impl DekBuffer {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for DekBuffer {
    fn drop(&mut self) {
        self.bytes.zeroize();
        if self.bytes.capacity() == self.size {
            let reclaimed = std::mem::take(&mut self.bytes);
            self.pool.lock().push(reclaimed);
        }
    }
}

/// Fixed-capacity pool of same-size plaintext-DEK scratch buffers, keyed
/// implicitly by the size each caller requests. A pool miss simply
/// allocates; callers return buffers to the pool on drop.
#[derive(Clone)]
pub struct DekBufferPool {
    pools: Arc<Mutex<std::collections::HashMap<usize, Arc<Mutex<Vec<Vec<u8>>>>>>>,
}

impl Default for DekBufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl DekBufferPool {
    pub fn new() -> Self {
        Self {
            pools: Arc::new(Mutex::new(std::collections::HashMap::new())),
        }
    }

    fn pool_for(&self, size: usize) -> Arc<Mutex<Vec<Vec<u8>>>> {
        self.pools
            .lock()
            .entry(size)
            .or_insert_with(|| Arc::new(Mutex::new(Vec::new())))
            .clone()
    }

    /// Acquires a buffer of exactly `size` bytes, filled with
    /// cryptographically secure randomness, and validated against
    /// [`entropy_in_bounds`]. Retries regeneration a bounded number of
    /// times before giving up — a CSPRNG producing out-of-band entropy on
    /// every draw indicates a broken RNG source, not bad luck.
    pub fn acquire_random(&self, size: usize) -> Result<DekBuffer, CryptoError> {
        let pool = self.pool_for(size);
        let mut bytes = pool.lock().pop().unwrap_or_default();
        bytes.clear();
        bytes.resize(size, 0);

        const MAX_ATTEMPTS: u32 = 8;
        let total_bits = (size * 8) as u32;
        for _ in 0..MAX_ATTEMPTS {
            rand::thread_rng().fill_bytes(&mut bytes);
            if entropy_in_bounds(&bytes) {
                return Ok(DekBuffer { pool, size, bytes });
            }
        }
        let popcount = bytes.iter().map(|b| b.count_ones()).sum();
        bytes.zeroize();
        Err(CryptoError::EntropyValidationFailed {
            popcount,
            low: total_bits * 3 / 8,
            high: total_bits * 5 / 8,
            bits: total_bits,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquired_buffer_has_requested_size() {
        let pool = DekBufferPool::new();
        let buf = pool.acquire_random(32).expect("entropy check should pass");
        assert_eq!(buf.as_slice().len(), 32);
    }

    #[test]
    fn all_zero_buffer_fails_entropy_check() {
        assert!(!entropy_in_bounds(&[0u8; 32]));
    }

    #[test]
    fn all_one_buffer_fails_entropy_check() {
        assert!(!entropy_in_bounds(&[0xffu8; 32]));
    }

    #[test]
    fn half_set_buffer_passes_entropy_check() {
        let mut buf = [0u8; 32];
        for (i, b) in buf.iter_mut().enumerate() {
            if i % 2 == 0 {
                *b = 0xff;
            }
        }
        assert!(entropy_in_bounds(&buf));
    }

    #[test]
    fn buffer_is_zeroized_on_drop() {
        let pool = DekBufferPool::new();
        let pool_inner = pool.pool_for(16);
        {
            let _buf = pool.acquire_random(16).expect("entropy check should pass");
        }
        let reclaimed = pool_inner.lock().pop().expect("buffer returned to pool");
        assert!(reclaimed.iter().all(|b| *b == 0));
    }
}
