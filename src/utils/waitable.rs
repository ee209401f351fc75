use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::subscription::WorkerError;

type Result<T> = std::result::Result<T, WorkerError>;

/// Thread-safe wrapper around a value that allows threads to wait for specific conditions on that value.
#[derive(Debug, Clone)]
pub(crate) struct Waitable<T> {
    inner: Arc<(Mutex<T>, Condvar)>,
}

impl<T> Waitable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new((Mutex::new(value), Condvar::new())),
        }
    }

    pub fn set(&self, value: T) -> Result<()> {
        let (mutex, condvar) = &*self.inner;
        let mut guard = mutex.lock()?;
        *guard = value;
        condvar.notify_all();
        Ok(())
    }

    pub fn get(&self) -> Result<T>
    where
        T: Clone,
    {
        let (mutex, _) = &*self.inner;
        let guard = mutex.lock()?;
        Ok(guard.clone())
    }

    /// Waits until `condition` holds or `timeout` elapses. Returns the value
    /// seen last and whether the condition was met.
    pub fn wait_until<F>(&self, timeout: Duration, mut condition: F) -> Result<(T, bool)>
    where
        T: Clone,
        F: FnMut(&T) -> bool,
    {
        let (mutex, condvar) = &*self.inner;
        let guard = mutex.lock()?;
        let (guard, wait_result) = condvar.wait_timeout_while(guard, timeout, |value| {
            !condition(value)
        })?;
        Ok((guard.clone(), !wait_result.timed_out()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_basic_operations() {
        let waitable = Waitable::new(42);

        // Test get
        assert_eq!(waitable.get().unwrap(), 42);

        // Test set
        waitable.set(100).unwrap();
        assert_eq!(waitable.get().unwrap(), 100);
    }

    #[test]
    fn test_wait_until() {
        let waitable = Waitable::new(0);
        let waitable_clone = waitable.clone();

        // Spawn a thread that will change the value after a delay
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            waitable_clone.set(42).unwrap();
        });

        // Wait for the value to become 42
        let result = waitable
            .wait_until(Duration::from_secs(5), |v| *v == 42)
            .unwrap();
        assert_eq!(result, (42, true));
    }

    #[test]
    fn test_wait_until_times_out() {
        let waitable = Waitable::new(0);
        let result = waitable
            .wait_until(Duration::from_millis(20), |v| *v == 42)
            .unwrap();
        assert_eq!(result, (0, false));
    }
}
