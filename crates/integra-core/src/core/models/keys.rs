use super::ids::ParticleId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A named, typed attribute key.
///
/// The value type is part of the key's type, so a key always denotes the same
/// semantic type on every particle that carries it. Keys are cheap to copy and
/// are usually declared as constants:
///
/// ```
/// use integra::core::models::keys::FloatKey;
///
/// const X: FloatKey = FloatKey::new("x");
/// assert_eq!(X.name(), "x");
/// ```
pub struct AttributeKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

pub type FloatKey = AttributeKey<f64>;
pub type IntKey = AttributeKey<i64>;
pub type StringKey = AttributeKey<String>;
pub type ParticleKey = AttributeKey<ParticleId>;

impl<T> AttributeKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for AttributeKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AttributeKey<T> {}

impl<T> PartialEq for AttributeKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T> Eq for AttributeKey<T> {}

impl<T> Hash for AttributeKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl<T> PartialOrd for AttributeKey<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for AttributeKey<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(other.name)
    }
}

impl<T> fmt::Debug for AttributeKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Key({:?})", type_label::<T>(), self.name)
    }
}

impl<T> fmt::Display for AttributeKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

fn type_label<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    match full {
        "f64" => "Float",
        "i64" => "Int",
        "alloc::string::String" => "String",
        _ if full.ends_with("ParticleId") => "Particle",
        _ => "Attribute",
    }
}
