//! Type registry: the complete, compile-time list of exposed types.
//!
//! Every exposed Rust type implements [`GraphType`], which yields a
//! [`TypeDescriptor`]. The crate-level [`REGISTRY`](crate::REGISTRY) lists
//! all descriptors and [`OPERATIONS`](crate::OPERATIONS) lists the entry
//! points. [`Registry::validate`] checks that the two agree: every name
//! referenced anywhere is registered exactly once, and every registered
//! type can be reached from some operation.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Structural category of an exposed type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    Object,
    Enum { values: &'static [&'static str] },
    Union { members: &'static [&'static str] },
    Interface { implementors: &'static [&'static str] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeDescriptor {
    pub name: &'static str,
    #[serde(flatten)]
    pub kind: TypeKind,
    /// Types that appear in this type's fields.
    pub references: &'static [&'static str],
}

impl TypeDescriptor {
    pub const fn interface(name: &'static str, implementors: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: TypeKind::Interface { implementors },
            references: &[],
        }
    }

    /// Names this descriptor points at: references, members, implementors.
    pub fn edges(&self) -> impl Iterator<Item = &'static str> {
        let nested: &'static [&'static str] = match self.kind {
            TypeKind::Object | TypeKind::Enum { .. } => &[],
            TypeKind::Union { members } => members,
            TypeKind::Interface { implementors } => implementors,
        };
        let references: &'static [&'static str] = self.references;
        references.iter().chain(nested.iter()).copied()
    }
}

/// A Rust type exposed through the gateway.
pub trait GraphType {
    const NAME: &'static str;
    const KIND: TypeKind;
    const REFERENCES: &'static [&'static str] = &[];
    const DESCRIPTOR: TypeDescriptor = TypeDescriptor {
        name: Self::NAME,
        kind: Self::KIND,
        references: Self::REFERENCES,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

/// A named entry point and the type it resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub name: &'static str,
    pub kind: OperationKind,
    pub result: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Type '{0}' is registered more than once")]
    Duplicate(&'static str),

    #[error("Type '{name}' is referenced by '{referenced_by}' but not registered")]
    Missing {
        name: &'static str,
        referenced_by: &'static str,
    },

    #[error("Union '{union}' has member '{member}', which is not an object type")]
    NonObjectMember {
        union: &'static str,
        member: &'static str,
    },

    #[error("Type '{0}' is registered but no operation can reach it")]
    Unreachable(&'static str),
}

pub struct Registry {
    types: &'static [TypeDescriptor],
    operations: &'static [Operation],
}

impl Registry {
    pub const fn new(types: &'static [TypeDescriptor], operations: &'static [Operation]) -> Self {
        Self { types, operations }
    }

    pub fn types(&self) -> &'static [TypeDescriptor] {
        self.types
    }

    pub fn operations(&self) -> &'static [Operation] {
        self.operations
    }

    pub fn get(&self, name: &str) -> Option<&'static TypeDescriptor> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Check that the registry is complete and consistent.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut by_name: BTreeMap<&'static str, &TypeDescriptor> = BTreeMap::new();
        for descriptor in self.types {
            if by_name.insert(descriptor.name, descriptor).is_some() {
                return Err(RegistryError::Duplicate(descriptor.name));
            }
        }

        for operation in self.operations {
            if !by_name.contains_key(operation.result) {
                return Err(RegistryError::Missing {
                    name: operation.result,
                    referenced_by: operation.name,
                });
            }
        }

        for descriptor in self.types {
            for name in descriptor.edges() {
                if !by_name.contains_key(name) {
                    return Err(RegistryError::Missing {
                        name,
                        referenced_by: descriptor.name,
                    });
                }
            }
            if let TypeKind::Union { members } = descriptor.kind {
                for member in members {
                    if by_name.get(member).map(|m| m.kind) != Some(TypeKind::Object) {
                        return Err(RegistryError::NonObjectMember {
                            union: descriptor.name,
                            member: *member,
                        });
                    }
                }
            }
        }

        // Interfaces are reached through their implementors.
        let mut reachable: BTreeSet<&'static str> = BTreeSet::new();
        let mut queue: VecDeque<&'static str> = self.operations.iter().map(|o| o.result).collect();
        while let Some(name) = queue.pop_front() {
            if !reachable.insert(name) {
                continue;
            }
            if let Some(descriptor) = by_name.get(name) {
                queue.extend(descriptor.edges());
            }
        }
        for descriptor in self.types {
            let via_implementor = match descriptor.kind {
                TypeKind::Interface { implementors } => {
                    implementors.iter().any(|i| reachable.contains(i))
                }
                _ => false,
            };
            if !reachable.contains(descriptor.name) && !via_implementor {
                return Err(RegistryError::Unreachable(descriptor.name));
            }
        }

        Ok(())
    }

    /// Stable digest of every type and operation. Changes whenever the
    /// exposed contract changes.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for descriptor in self.types {
            hasher.update(serde_json::to_vec(descriptor).unwrap_or_default());
        }
        for operation in self.operations {
            hasher.update(serde_json::to_vec(operation).unwrap_or_default());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Implement [`GraphType`] for an object type.
macro_rules! graph_object {
    ($ty:ident $(, refs: [$($r:ty),* $(,)?])? $(,)?) => {
        impl $crate::registry::GraphType for $ty {
            const NAME: &'static str = stringify!($ty);
            const KIND: $crate::registry::TypeKind = $crate::registry::TypeKind::Object;
            const REFERENCES: &'static [&'static str] =
                &[$($(<$r as $crate::registry::GraphType>::NAME),*)?];
        }
    };
}
pub(crate) use graph_object;

/// Implement [`GraphType`] for a wire enum under an exposed name.
macro_rules! graph_enum {
    ($ty:ty => $name:literal) => {
        impl $crate::registry::GraphType for $ty {
            const NAME: &'static str = $name;
            const KIND: $crate::registry::TypeKind = $crate::registry::TypeKind::Enum {
                values: <$ty>::WIRE_NAMES,
            };
        }
    };
}
pub(crate) use graph_enum;

/// Declare a result union: a serde enum tagged by `__typename` whose
/// variants wrap the object type of the same name.
macro_rules! result_union {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(tag = "__typename")]
        pub enum $name {
            $($variant($variant)),+
        }

        impl $name {
            /// Exposed name of the populated variant.
            pub fn typename(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => <$variant as $crate::registry::GraphType>::NAME),+
                }
            }
        }

        impl $crate::registry::GraphType for $name {
            const NAME: &'static str = stringify!($name);
            const KIND: $crate::registry::TypeKind = $crate::registry::TypeKind::Union {
                members: &[$(<$variant as $crate::registry::GraphType>::NAME),+],
            };
        }

        $(
            impl From<$variant> for $name {
                fn from(value: $variant) -> Self {
                    Self::$variant(value)
                }
            }
        )+
    };
}
pub(crate) use result_union;
