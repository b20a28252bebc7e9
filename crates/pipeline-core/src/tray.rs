//! Shared scratch store passed between pipeline stages
//!
//! The tray holds two kinds of entries, both keyed by string:
//! - value slots: exactly one value of a caller-chosen type
//! - history slots: a bounded sequence of values, oldest evicted first
//!
//! A key keeps the slot kind and value type it was created with until it is
//! removed. Accessing it as another kind or type is a [`TrayError`], never a
//! silent reinterpretation; a missing key is `Ok(None)`.

use crate::error::TrayError;
use std::any::{type_name, Any};
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// History capacity used when the settings document does not set one
pub const DEFAULT_HISTORY_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKind {
    Value,
    History,
}

impl SlotKind {
    fn label(self) -> &'static str {
        match self {
            SlotKind::Value => "value",
            SlotKind::History => "history",
        }
    }
}

struct Slot {
    kind: SlotKind,
    /// Stored value type (element type for histories)
    type_name: &'static str,
    data: Box<dyn Any + Send>,
}

impl Slot {
    fn expect_kind(&self, key: &str, kind: SlotKind) -> Result<(), TrayError> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(TrayError::SlotKindMismatch {
                key: key.to_string(),
                expected: kind.label(),
            })
        }
    }

    fn mismatch<T>(&self, key: &str) -> TrayError {
        TrayError::TypeMismatch {
            key: key.to_string(),
            expected: type_name::<T>(),
            found: self.type_name,
        }
    }
}

/// Fixed-capacity sequence kept in a history slot
#[derive(Debug, Clone)]
pub struct History<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> History<T> {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, value: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(value);
    }

    /// Most recently appended value
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Values in insertion order, oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Heterogeneous string-keyed store shared by all stages of a pipeline
pub struct Tray {
    slots: HashMap<String, Slot>,
    history_capacity: usize,
}

impl Tray {
    /// Create a tray whose history slots hold [`DEFAULT_HISTORY_CAPACITY`] values
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Create a tray with a custom history capacity (at least one value)
    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            slots: HashMap::with_capacity(32),
            history_capacity: capacity.max(1),
        }
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    /// Store `value` under `key`, overwriting any previous value of the same type
    pub fn set<T: Any + Send>(&mut self, key: impl Into<String>, value: T) -> Result<(), TrayError> {
        let key = key.into();

        if let Some(slot) = self.slots.get_mut(&key) {
            slot.expect_kind(&key, SlotKind::Value)?;
            let mismatch = slot.mismatch::<T>(&key);
            let stored = slot.data.downcast_mut::<T>().ok_or(mismatch)?;
            *stored = value;
            return Ok(());
        }

        self.slots.insert(
            key,
            Slot {
                kind: SlotKind::Value,
                type_name: type_name::<T>(),
                data: Box::new(value),
            },
        );
        Ok(())
    }

    /// Borrow the value stored under `key`
    pub fn get_ref<T: Any>(&self, key: &str) -> Result<Option<&T>, TrayError> {
        let Some(slot) = self.slots.get(key) else {
            return Ok(None);
        };
        slot.expect_kind(key, SlotKind::Value)?;
        slot.data
            .downcast_ref::<T>()
            .map(Some)
            .ok_or_else(|| slot.mismatch::<T>(key))
    }

    /// Mutably borrow the value stored under `key`
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Result<Option<&mut T>, TrayError> {
        let Some(slot) = self.slots.get_mut(key) else {
            return Ok(None);
        };
        slot.expect_kind(key, SlotKind::Value)?;
        let mismatch = slot.mismatch::<T>(key);
        slot.data.downcast_mut::<T>().map(Some).ok_or(mismatch)
    }

    /// Clone the value stored under `key`
    pub fn get<T: Any + Clone>(&self, key: &str) -> Result<Option<T>, TrayError> {
        Ok(self.get_ref::<T>(key)?.cloned())
    }

    /// Push `value` onto the history under `key`, creating it with the tray's
    /// history capacity on first use
    pub fn append_history<T: Any + Send>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) -> Result<(), TrayError> {
        let capacity = self.history_capacity;
        self.append_history_with_capacity(key, value, capacity)
    }

    /// Like [`Tray::append_history`]; `capacity` only applies when the slot is created
    pub fn append_history_with_capacity<T: Any + Send>(
        &mut self,
        key: impl Into<String>,
        value: T,
        capacity: usize,
    ) -> Result<(), TrayError> {
        let key = key.into();

        if let Some(slot) = self.slots.get_mut(&key) {
            slot.expect_kind(&key, SlotKind::History)?;
            let mismatch = slot.mismatch::<T>(&key);
            let history = slot.data.downcast_mut::<History<T>>().ok_or(mismatch)?;
            history.push(value);
            return Ok(());
        }

        let mut history = History::new(capacity);
        history.push(value);
        self.slots.insert(
            key,
            Slot {
                kind: SlotKind::History,
                type_name: type_name::<T>(),
                data: Box::new(history),
            },
        );
        Ok(())
    }

    /// Borrow the whole history under `key`
    pub fn history<T: Any>(&self, key: &str) -> Result<Option<&History<T>>, TrayError> {
        let Some(slot) = self.slots.get(key) else {
            return Ok(None);
        };
        slot.expect_kind(key, SlotKind::History)?;
        slot.data
            .downcast_ref::<History<T>>()
            .map(Some)
            .ok_or_else(|| slot.mismatch::<T>(key))
    }

    /// Most recently appended value of the history under `key`
    pub fn peek_latest_history<T: Any>(&self, key: &str) -> Result<Option<&T>, TrayError> {
        Ok(self.history::<T>(key)?.and_then(History::latest))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Drop the entry under `key`, freeing the key for a different type
    pub fn remove(&mut self, key: &str) -> bool {
        self.slots.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for Tray {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Tray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.slots.iter().collect();
        keys.sort_by(|a, b| a.0.cmp(b.0));

        let mut map = f.debug_map();
        for (key, slot) in keys {
            map.entry(key, &format_args!("{}<{}>", slot.kind.label(), slot.type_name));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_round_trip() {
        let mut tray = Tray::new();
        tray.set("threshold", 0.75f64).unwrap();
        tray.set("label", String::from("keyframe")).unwrap();

        assert_eq!(tray.get::<f64>("threshold").unwrap(), Some(0.75));
        assert_eq!(
            tray.get_ref::<String>("label").unwrap().map(String::as_str),
            Some("keyframe")
        );
    }

    #[test]
    fn test_set_overwrites_same_type() {
        let mut tray = Tray::new();
        tray.set("count", 1u32).unwrap();
        tray.set("count", 2u32).unwrap();

        assert_eq!(tray.get::<u32>("count").unwrap(), Some(2));
        assert_eq!(tray.len(), 1);
    }

    #[test]
    fn test_missing_key_is_not_an_error() {
        let tray = Tray::new();
        assert_eq!(tray.get::<u32>("absent").unwrap(), None);
        assert!(tray.peek_latest_history::<u32>("absent").unwrap().is_none());
    }

    #[test]
    fn test_wrong_type_is_mismatch() {
        let mut tray = Tray::new();
        tray.set("count", 5u32).unwrap();

        let err = tray.get::<i64>("count").unwrap_err();
        assert_eq!(
            err,
            TrayError::TypeMismatch {
                key: "count".to_string(),
                expected: "i64",
                found: "u32",
            }
        );

        // The stored value survives a failed overwrite
        assert!(tray.set("count", -1i64).is_err());
        assert_eq!(tray.get::<u32>("count").unwrap(), Some(5));
    }

    #[test]
    fn test_slot_kind_is_fixed_per_key() {
        let mut tray = Tray::new();
        tray.set("frame_class", 3usize).unwrap();
        tray.append_history("classes", 3usize).unwrap();

        assert!(matches!(
            tray.append_history("frame_class", 4usize),
            Err(TrayError::SlotKindMismatch { .. })
        ));
        assert!(matches!(
            tray.get::<usize>("classes"),
            Err(TrayError::SlotKindMismatch { .. })
        ));
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut tray = Tray::with_history_capacity(3);
        for value in 1..=4u32 {
            tray.append_history("values", value).unwrap();
        }

        let history = tray.history::<u32>("values").unwrap().unwrap();
        assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(history.capacity(), 3);
        assert_eq!(tray.peek_latest_history::<u32>("values").unwrap(), Some(&4));
    }

    #[test]
    fn test_history_capacity_applies_on_creation_only() {
        let mut tray = Tray::with_history_capacity(8);
        tray.append_history_with_capacity("short", 1u8, 2).unwrap();
        tray.append_history_with_capacity("short", 2u8, 50).unwrap();
        tray.append_history_with_capacity("short", 3u8, 50).unwrap();

        let history = tray.history::<u8>("short").unwrap().unwrap();
        assert_eq!(history.capacity(), 2);
        assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_history_type_mismatch() {
        let mut tray = Tray::new();
        tray.append_history("descriptors", vec![0.5f32]).unwrap();

        assert!(matches!(
            tray.append_history("descriptors", 0.5f32),
            Err(TrayError::TypeMismatch { .. })
        ));
        assert!(matches!(
            tray.peek_latest_history::<Vec<f64>>("descriptors"),
            Err(TrayError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut tray = Tray::with_history_capacity(0);
        tray.append_history("latest", 1u8).unwrap();
        tray.append_history("latest", 2u8).unwrap();

        assert_eq!(tray.history_capacity(), 1);
        assert_eq!(tray.peek_latest_history::<u8>("latest").unwrap(), Some(&2));
    }

    #[test]
    fn test_remove_frees_key() {
        let mut tray = Tray::new();
        tray.set("scratch", 1u8).unwrap();
        assert!(tray.remove("scratch"));
        assert!(!tray.contains("scratch"));

        tray.set("scratch", String::from("reused")).unwrap();
        assert_eq!(tray.get::<String>("scratch").unwrap().as_deref(), Some("reused"));

        tray.clear();
        assert!(tray.is_empty());
    }

    #[test]
    fn test_get_mut_updates_in_place() {
        let mut tray = Tray::new();
        tray.set("tags", vec![1u32]).unwrap();
        tray.get_mut::<Vec<u32>>("tags").unwrap().unwrap().push(2);

        assert_eq!(tray.get::<Vec<u32>>("tags").unwrap(), Some(vec![1, 2]));
    }
}
