//! Data-access layer for arm records.
//!
//! Every read-modify-write on an arm goes through [`ArmStore::modify`], which
//! must apply the closure atomically for that key. Production selection and the
//! nightly analytics job can therefore share one store without lost updates.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{Arm, ArmKey, Error, Result};

/// Storage backend for [`Arm`] records keyed by [`ArmKey`].
pub trait ArmStore: Send + Sync {
    /// Fetch a copy of the arm, if registered.
    fn get(&self, key: &ArmKey) -> Result<Option<Arm>>;

    /// Insert `arm` unless its key is already present; return the stored record.
    fn insert_if_absent(&self, arm: Arm) -> Result<Arm>;

    /// Apply `f` to the stored arm as one transaction and return the result.
    ///
    /// Fails with [`Error::UnknownArm`] if the key is not registered.
    fn modify(&self, key: &ArmKey, f: &mut dyn FnMut(&mut Arm)) -> Result<Arm>;

    /// All arms, optionally restricted to one channel, in key order.
    fn list(&self, channel: Option<&str>) -> Result<Vec<Arm>>;
}

/// In-process store backed by a mutex-guarded ordered map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    arms: Mutex<BTreeMap<ArmKey, Arm>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from previously exported records (later duplicates win).
    pub fn from_arms(arms: impl IntoIterator<Item = Arm>) -> Self {
        let map = arms.into_iter().map(|a| (a.key().clone(), a)).collect();
        Self {
            arms: Mutex::new(map),
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.arms.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.arms.lock()?.is_empty())
    }
}

impl ArmStore for MemoryStore {
    fn get(&self, key: &ArmKey) -> Result<Option<Arm>> {
        Ok(self.arms.lock()?.get(key).cloned())
    }

    fn insert_if_absent(&self, arm: Arm) -> Result<Arm> {
        let mut arms = self.arms.lock()?;
        Ok(arms.entry(arm.key().clone()).or_insert(arm).clone())
    }

    fn modify(&self, key: &ArmKey, f: &mut dyn FnMut(&mut Arm)) -> Result<Arm> {
        let mut arms = self.arms.lock()?;
        let arm = arms
            .get_mut(key)
            .ok_or_else(|| Error::UnknownArm(key.to_string()))?;
        f(arm);
        Ok(arm.clone())
    }

    fn list(&self, channel: Option<&str>) -> Result<Vec<Arm>> {
        let arms = self.arms.lock()?;
        Ok(arms
            .values()
            .filter(|a| channel.map_or(true, |c| a.key().channel == c))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArmConfig, ThumbnailStyle};
    use chrono::Utc;
    use std::sync::Arc;

    fn arm(channel: &str, thumb: &str) -> Arm {
        let key = ArmKey::new(channel, "v", "listicle", thumb).unwrap();
        let config = ArmConfig::packaging("v", "listicle", ThumbnailStyle::named(thumb));
        Arm::new(key, config, 25, Utc::now())
    }

    #[test]
    fn insert_if_absent_keeps_existing_record() {
        let store = MemoryStore::new();
        let a = arm("c", "t");
        let key = a.key().clone();
        store.insert_if_absent(a.clone()).unwrap();
        store.modify(&key, &mut |x| x.observe(0.7, Utc::now())).unwrap();
        let again = store.insert_if_absent(a).unwrap();
        assert_eq!(again.pulls(), 1);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn modify_unknown_key_fails() {
        let store = MemoryStore::new();
        let key = ArmKey::new("c", "v", "f", "t").unwrap();
        let err = store.modify(&key, &mut |_| {}).unwrap_err();
        assert!(matches!(err, Error::UnknownArm(_)));
    }

    #[test]
    fn list_filters_by_channel_in_key_order() {
        let store = MemoryStore::from_arms([arm("b", "x"), arm("a", "z"), arm("a", "y")]);
        let a: Vec<String> = store
            .list(Some("a"))
            .unwrap()
            .iter()
            .filter_map(|x| x.key().thumbnail().map(str::to_string))
            .collect();
        assert_eq!(a, vec!["y".to_string(), "z".to_string()]);
        assert_eq!(store.list(None).unwrap().len(), 3);
    }

    #[test]
    fn concurrent_modifies_do_not_lose_updates() {
        let store = Arc::new(MemoryStore::new());
        let a = arm("c", "t");
        let key = a.key().clone();
        store.insert_if_absent(a).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let key = key.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        store.modify(&key, &mut |x| x.observe(0.5, Utc::now())).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.get(&key).unwrap().unwrap().pulls(), 400);
    }
}
