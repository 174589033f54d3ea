//! Memoized engine values

/// A lazily computed value with explicit invalidation
#[derive(Debug, Clone)]
pub struct Cached<T> {
    value: Option<T>,
}

impl<T> Cached<T> {
    pub const fn empty() -> Self {
        Self { value: None }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_cached(&self) -> bool {
        self.value.is_some()
    }

    /// Return the cached value, computing and storing it on a miss.
    ///
    /// Nothing is stored when `init` fails.
    pub fn get_or_try_init<E>(&mut self, init: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        let value = match self.value.take() {
            Some(value) => value,
            None => init()?,
        };
        Ok(self.value.insert(value))
    }

    /// Drop the cached value so the next access recomputes it
    pub fn invalidate(&mut self) -> Option<T> {
        self.value.take()
    }
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_computes_once() {
        let mut cache = Cached::empty();
        let mut calls = 0;

        for _ in 0..3 {
            let value = cache
                .get_or_try_init(|| {
                    calls += 1;
                    Ok::<_, ()>(7)
                })
                .unwrap();
            assert_eq!(*value, 7);
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let mut cache: Cached<u32> = Cached::empty();
        assert_eq!(cache.get_or_try_init(|| Err("busy")), Err("busy"));
        assert!(!cache.is_cached());
        assert_eq!(cache.get_or_try_init(|| Ok::<_, &str>(3)), Ok(&3));
    }

    #[test]
    fn test_invalidate() {
        let mut cache = Cached::empty();
        cache.get_or_try_init(|| Ok::<_, ()>(1)).unwrap();
        assert_eq!(cache.invalidate(), Some(1));
        assert!(cache.get().is_none());
        assert_eq!(cache.invalidate(), None);
    }
}
