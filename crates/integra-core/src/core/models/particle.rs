use super::ids::ParticleId;
use super::keys::AttributeKey;
use std::collections::HashMap;

/// Typed attribute tables of a single particle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    floats: HashMap<AttributeKey<f64>, f64>,
    ints: HashMap<AttributeKey<i64>, i64>,
    strings: HashMap<AttributeKey<String>, String>,
    particles: HashMap<AttributeKey<ParticleId>, ParticleId>,
}

/// A value type that can be stored as a particle attribute.
///
/// Each implementation selects the attribute table holding values of its type,
/// which lets the store expose a single generic accessor per operation.
pub trait AttributeValue: Clone + Sized + 'static {
    fn table(attributes: &Attributes) -> &HashMap<AttributeKey<Self>, Self>;
    fn table_mut(attributes: &mut Attributes) -> &mut HashMap<AttributeKey<Self>, Self>;
}

impl AttributeValue for f64 {
    fn table(attributes: &Attributes) -> &HashMap<AttributeKey<Self>, Self> {
        &attributes.floats
    }
    fn table_mut(attributes: &mut Attributes) -> &mut HashMap<AttributeKey<Self>, Self> {
        &mut attributes.floats
    }
}

impl AttributeValue for i64 {
    fn table(attributes: &Attributes) -> &HashMap<AttributeKey<Self>, Self> {
        &attributes.ints
    }
    fn table_mut(attributes: &mut Attributes) -> &mut HashMap<AttributeKey<Self>, Self> {
        &mut attributes.ints
    }
}

impl AttributeValue for String {
    fn table(attributes: &Attributes) -> &HashMap<AttributeKey<Self>, Self> {
        &attributes.strings
    }
    fn table_mut(attributes: &mut Attributes) -> &mut HashMap<AttributeKey<Self>, Self> {
        &mut attributes.strings
    }
}

impl AttributeValue for ParticleId {
    fn table(attributes: &Attributes) -> &HashMap<AttributeKey<Self>, Self> {
        &attributes.particles
    }
    fn table_mut(attributes: &mut Attributes) -> &mut HashMap<AttributeKey<Self>, Self> {
        &mut attributes.particles
    }
}

/// An attribute-bearing entity of the model.
///
/// Besides its attributes a particle carries two transient lock marks that are
/// only ever set while an access scope is active. Outside of a scope both marks
/// are always clear.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Human-readable name used in diagnostics.
    pub name: String,
    attributes: Attributes,
    pub(crate) read_locked: bool,
    pub(crate) write_locked: bool,
}

impl Particle {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Attributes::default(),
            read_locked: false,
            write_locked: false,
        }
    }

    pub fn get<T: AttributeValue>(&self, key: AttributeKey<T>) -> Option<&T> {
        T::table(&self.attributes).get(&key)
    }

    pub fn has<T: AttributeValue>(&self, key: AttributeKey<T>) -> bool {
        T::table(&self.attributes).contains_key(&key)
    }

    pub fn set<T: AttributeValue>(&mut self, key: AttributeKey<T>, value: T) -> Option<T> {
        T::table_mut(&mut self.attributes).insert(key, value)
    }

    pub fn remove<T: AttributeValue>(&mut self, key: AttributeKey<T>) -> Option<T> {
        T::table_mut(&mut self.attributes).remove(&key)
    }

    pub fn keys<T: AttributeValue>(&self) -> impl Iterator<Item = AttributeKey<T>> + '_ {
        T::table(&self.attributes).keys().copied()
    }

    pub fn is_read_locked(&self) -> bool {
        self.read_locked
    }

    pub fn is_write_locked(&self) -> bool {
        self.write_locked
    }
}
