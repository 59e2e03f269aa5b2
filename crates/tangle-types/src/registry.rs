//! The type registry: bidirectional mapping between canonical type names
//! and small integer ids.
//!
//! Id 0 is reserved for the nil type. Ids 1–19 are pre-registered for the
//! builtin types in a fixed order, so two registries constructed the same
//! way agree on them without negotiation. Function *values* are keyed by
//! their qualified symbolic name and so get ids distinct from their bare
//! function type.
//!
//! The registry is the only state shared between concurrent encode/decode
//! calls; all operations take `&self` behind a lock.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use tangle_error::{Error, Result};

use crate::kind::Kind;
use crate::ty::{self, Type};
use crate::value::{Data, FuncVal, Value};

/// What an id resolves to.
#[derive(Debug, Clone)]
pub enum Registered {
    /// A plain type.
    Type(Type),
    /// A function value: its type, and the concrete handle when one was
    /// registered in this process.
    Func { ty: Type, handle: Option<Arc<FuncVal>> },
}

impl Registered {
    /// The type carried by this entry.
    pub fn ty(&self) -> &Type {
        match self {
            Self::Type(t) => t,
            Self::Func { ty, .. } => ty,
        }
    }
}

#[derive(Default)]
struct Inner {
    by_name: HashMap<String, u64>,
    entries: HashMap<u64, Registered>,
    next_id: u64,
}

/// Bidirectional type-name ↔ id registry.
pub struct TypeRegistry {
    auto_register: bool,
    inner: RwLock<Inner>,
}

impl TypeRegistry {
    /// Create a registry with the builtin types pre-registered. When
    /// `auto_register` is off, encoding an unregistered type fails instead
    /// of assigning it a fresh id.
    pub fn new(auto_register: bool) -> Self {
        let reg = Self {
            auto_register,
            inner: RwLock::new(Inner {
                by_name: HashMap::new(),
                entries: HashMap::new(),
                next_id: 1,
            }),
        };
        for kind in [
            Kind::Interface,
            Kind::Bool,
            Kind::String,
            Kind::Int8,
            Kind::Uint8,
            Kind::Int16,
            Kind::Uint16,
            Kind::Int32,
            Kind::Uint32,
            Kind::Int64,
            Kind::Uint64,
            Kind::Int,
            Kind::Uint,
            Kind::Float32,
            Kind::Float64,
            Kind::Complex64,
            Kind::Complex128,
            Kind::Uintptr,
            Kind::RawPtr,
        ] {
            reg.register(&ty::primitive(kind));
        }
        reg
    }

    /// The process-wide default registry (auto-registering).
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<TypeRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Self::new(true))).clone()
    }

    /// Register a type, returning its id. Registering the same canonical
    /// name twice returns the original id.
    pub fn register(&self, t: &Type) -> u64 {
        let name = t.name();
        let mut inner = self.inner.write();
        if let Some(&id) = inner.by_name.get(&name) {
            return id;
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.by_name.insert(name.clone(), id);
        inner.entries.insert(id, Registered::Type(t.clone()));
        debug!(%name, id, "registered type");
        id
    }

    /// Register a function value under its qualified name, returning its
    /// id. The handle is kept so decoding can resolve the function again.
    pub fn register_func(&self, ty: &Type, handle: &Arc<FuncVal>) -> u64 {
        let name = handle.name.clone();
        let mut inner = self.inner.write();
        if let Some(&id) = inner.by_name.get(&name) {
            // Fill in the handle if the name was known without one.
            if let Some(entry @ Registered::Func { handle: None, .. }) = inner.entries.get_mut(&id)
            {
                *entry = Registered::Func {
                    ty: ty.clone(),
                    handle: Some(handle.clone()),
                };
            }
            return id;
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.by_name.insert(name.clone(), id);
        inner.entries.insert(
            id,
            Registered::Func {
                ty: ty.clone(),
                handle: Some(handle.clone()),
            },
        );
        debug!(%name, id, "registered function");
        id
    }

    /// Id of a type. Auto-registers or fails depending on construction.
    pub fn id_of(&self, t: &Type) -> Result<u64> {
        if t.kind() == Kind::Nil {
            return Ok(0);
        }
        let name = t.name();
        if let Some(&id) = self.inner.read().by_name.get(&name) {
            return Ok(id);
        }
        if self.auto_register {
            Ok(self.register(t))
        } else {
            debug!(%name, "type lookup miss");
            Err(Error::unknown_name(name))
        }
    }

    /// Id for a value's type token: nil values map to id 0, non-nil
    /// function values to their function identity, everything else to its
    /// type.
    pub fn id_for_value(&self, v: &Value) -> Result<u64> {
        match v.data() {
            Data::Nil => Ok(0),
            Data::Func(Some(handle)) => {
                let name = &handle.name;
                if let Some(&id) = self.inner.read().by_name.get(name) {
                    return Ok(id);
                }
                if self.auto_register {
                    Ok(self.register_func(v.ty(), handle))
                } else {
                    debug!(name = %name, "function lookup miss");
                    Err(Error::unknown_name(name.clone()))
                }
            }
            _ => self.id_of(v.ty()),
        }
    }

    /// Resolve an id back to its entry. Id 0 is the nil type.
    pub fn lookup(&self, id: u64) -> Result<Registered> {
        if id == 0 {
            return Ok(Registered::Type(ty::primitive(Kind::Nil)));
        }
        self.inner
            .read()
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::unknown_id(id))
    }

    /// Id of a registered name, if any. Mostly useful to tests.
    pub fn id_of_name(&self, name: &str) -> Option<u64> {
        self.inner.read().by_name.get(name).copied()
    }

    /// Number of registered entries (builtins included).
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("auto_register", &self.auto_register)
            .field("entries", &self.len())
            .finish()
    }
}
