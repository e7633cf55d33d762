//! Constant pool of one emitted class.
//!
//! Entries are deduplicated; indices start at 1 and two-slot constants
//! (`long`, `double`) occupy two indices.

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

/// A constant pool entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolEntry {
    Utf8(String),
    Int(i32),
    Float(OrderedFloat<f32>),
    Long(i64),
    Double(OrderedFloat<f64>),
    /// Index of a `Utf8` internal name.
    Class(u16),
    /// Index of a `Utf8` string value.
    String(u16),
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
}

impl PoolEntry {
    pub fn tag(&self) -> u8 {
        match self {
            PoolEntry::Utf8(_) => 1,
            PoolEntry::Int(_) => 3,
            PoolEntry::Float(_) => 4,
            PoolEntry::Long(_) => 5,
            PoolEntry::Double(_) => 6,
            PoolEntry::Class(_) => 7,
            PoolEntry::String(_) => 8,
            PoolEntry::FieldRef { .. } => 9,
            PoolEntry::MethodRef { .. } => 10,
            PoolEntry::InterfaceMethodRef { .. } => 11,
            PoolEntry::NameAndType { .. } => 12,
        }
    }

    fn width(&self) -> u16 {
        match self {
            PoolEntry::Long(_) | PoolEntry::Double(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<(u16, PoolEntry)>,
    index: FxHashMap<PoolEntry, u16>,
    next: u16,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: FxHashMap::default(),
            next: 1,
        }
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or get an existing entry, returning its index.
    pub fn add(&mut self, entry: PoolEntry) -> u16 {
        if let Some(&idx) = self.index.get(&entry) {
            return idx;
        }
        let idx = self.next;
        self.next += entry.width();
        self.index.insert(entry.clone(), idx);
        self.entries.push((idx, entry));
        idx
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        self.add(PoolEntry::Utf8(value.to_string()))
    }

    pub fn class(&mut self, internal_name: &str) -> u16 {
        let name = self.utf8(internal_name);
        self.add(PoolEntry::Class(name))
    }

    pub fn string(&mut self, value: &str) -> u16 {
        let utf8 = self.utf8(value);
        self.add(PoolEntry::String(utf8))
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        self.add(PoolEntry::NameAndType { name, descriptor })
    }

    pub fn field(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class(owner);
        let name_and_type = self.name_and_type(name, descriptor);
        self.add(PoolEntry::FieldRef {
            class,
            name_and_type,
        })
    }

    pub fn method(&mut self, owner: &str, name: &str, descriptor: &str, interface: bool) -> u16 {
        let class = self.class(owner);
        let name_and_type = self.name_and_type(name, descriptor);
        if interface {
            self.add(PoolEntry::InterfaceMethodRef {
                class,
                name_and_type,
            })
        } else {
            self.add(PoolEntry::MethodRef {
                class,
                name_and_type,
            })
        }
    }

    /// Entries with their indices, in insertion order.
    pub fn entries(&self) -> &[(u16, PoolEntry)] {
        &self.entries
    }

    /// The `constant_pool_count` value: one past the highest index.
    pub fn count(&self) -> u16 {
        self.next
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_deduplicated() {
        let mut pool = ConstantPool::new();
        let a = pool.class("app/Foo");
        let b = pool.class("app/Foo");
        assert_eq!(a, b);
        // Utf8 + Class
        assert_eq!(pool.entries().len(), 2);
    }

    #[test]
    fn wide_constants_take_two_indices() {
        let mut pool = ConstantPool::new();
        let long = pool.add(PoolEntry::Long(7));
        let next = pool.utf8("x");
        assert_eq!(long, 1);
        assert_eq!(next, 3);
        assert_eq!(pool.count(), 4);
    }

    #[test]
    fn interface_methods_use_their_own_tag() {
        let mut pool = ConstantPool::new();
        let plain = pool.method("app/Foo", "m", "()V", false);
        let iface = pool.method("app/Foo", "m", "()V", true);
        assert_ne!(plain, iface);
        let tags: Vec<u8> = pool.entries().iter().map(|(_, e)| e.tag()).collect();
        assert!(tags.contains(&10) && tags.contains(&11));
    }
}
