//! Maps internal errors to the public taxonomy right at the trust boundary.
//! `ClassifiedError` is the type every transport edge converts into its own
//! status representation (e.g. `tonic::Status`). Instances are recycled
//! through a small pool since one is produced per failed request and the
//! fields are plain, cheaply-cleared `String`/`Vec` buffers.
use crate::types::{ErrorClass, ErrorKind, PolykeyError};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub struct ClassifiedError {
    pub class: ErrorClass,
    pub code: &'static str,
    pub message: String,
}

impl ClassifiedError {
    fn clear(&mut self) {
        self.message.clear();
    }
}

/// Fixed-capacity object pool for `ClassifiedError`. Reduces allocation
/// churn on the hot error path without introducing unbounded growth.
pub struct ClassifiedErrorPool {
    free: Mutex<Vec<ClassifiedError>>,
    capacity: usize,
}

impl ClassifiedErrorPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn classify(&self, error: &PolykeyError) -> PooledClassifiedError<'_> {
        let sanitized = error.sanitized();
        let mut item = self.free.lock().pop().unwrap_or_else(|| ClassifiedError {
            class: sanitized.kind.classify(),
            code: sanitized.code,
            message: String::new(),
        });
        item.clear();
        item.class = sanitized.kind.classify();
        item.code = sanitized.code;
        item.message.push_str(&sanitized.message);
        PooledClassifiedError {
            pool: self,
            value: Some(item),
        }
    }

    fn release(&self, mut item: ClassifiedError) {
        item.clear();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(item);
        }
    }
}

impl Default for ClassifiedErrorPool {
    fn default() -> Self {
        Self::new(256)
    }
}

/// RAII handle returned from the pool; the value returns to the pool on drop.
pub struct PooledClassifiedError<'a> {
    pool: &'a ClassifiedErrorPool,
    value: Option<ClassifiedError>,
}

impl<'a> std::ops::Deref for PooledClassifiedError<'a> {
    type Target = ClassifiedError;
    fn deref(&self) -> &ClassifiedError {
        self.value.as_ref().expect("value present until drop")
    }
}

impl<'a> Drop for PooledClassifiedError<'a> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.release(value);
        }
    }
}

/// Convenience used by interceptor-chain tests and call sites that don't
/// need pooling (e.g. one-off conversions at startup).
pub fn classify(kind: ErrorKind) -> ErrorClass {
    kind.classify()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_recycles_entries() {
        let pool = ClassifiedErrorPool::new(4);
        let err = PolykeyError::new(ErrorKind::KeyNotFound, "row missing");
        {
            let classified = pool.classify(&err);
            assert_eq!(classified.class, ErrorClass::NotFound);
            assert_eq!(classified.message, "the requested key was not found");
        }
        assert_eq!(pool.free.lock().len(), 1);
        let _again = pool.classify(&err);
        assert_eq!(pool.free.lock().len(), 0);
    }
}
