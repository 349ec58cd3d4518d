use std::{collections::HashMap, fmt};

/// Built-in primitive types, mapped to their size in bytes.
pub static BUILTINS: phf::OrderedMap<&'static str, usize> = phf::phf_ordered_map! {
    "i64" => 8,
    "u64" => 8,
    "bool" => 1,
    "char" => 1,
};

/// Value sizes a stack slot can hold: a byte or a quadword.
pub const SLOT_SIZES: [usize; 2] = [1, 8];

/// A named primitive type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Type {
    name: Box<str>,
    size: usize,
}

impl Type {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes of a value of this type.
    pub fn size(&self) -> usize {
        self.size
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The set of known types, queried by name.
///
/// The registry is only ever mutated while seeding it; afterwards it's shared
/// read-only between the lexer (typename classification) and the code
/// generator (slot sizes).
#[derive(Clone, Debug)]
pub struct TypeRegistry {
    map: HashMap<Box<str>, Type>,
}

impl TypeRegistry {
    pub fn with_capacity(capacity: usize) -> TypeRegistry {
        TypeRegistry {
            map: HashMap::with_capacity(capacity),
        }
    }

    /// Constructs a registry seeded with the [`BUILTINS`].
    pub fn with_builtins() -> TypeRegistry {
        let mut registry = TypeRegistry::with_capacity(BUILTINS.len());
        for (name, size) in &BUILTINS {
            registry
                .define(name, *size)
                .expect("builtin types are unique");
        }
        registry
    }

    pub fn has(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.map.get(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Attempts to define the provided type.
    ///
    /// Fails if the type is already defined or if its size isn't one of the
    /// [`SLOT_SIZES`].
    pub fn define(&mut self, name: &str, size: usize) -> Result<Type, ()> {
        if self.has(name) || !SLOT_SIZES.contains(&size) {
            return Err(());
        }
        let ty = Type {
            name: name.into(),
            size,
        };
        self.map.insert(name.into(), ty.clone());
        Ok(ty)
    }
}
