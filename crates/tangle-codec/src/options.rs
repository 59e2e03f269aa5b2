//! Encode/decode options and process-global defaults.

use std::sync::Arc;

use parking_lot::RwLock;

use tangle_error::{Error, Result};
use tangle_types::TypeRegistry;

/// How struct fields are laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StructEncoding {
    /// Fields in declared order, no per-field prefix (the default).
    #[default]
    Positional,
    /// Each field's emission is prefixed with its index.
    Indexed,
    /// Each field's emission is prefixed with its name; blank and
    /// anonymous fields append an index sentinel after the name.
    Named,
}

/// An option accepted by both `encode` and `decode`.
#[derive(Clone)]
pub enum CodecOption {
    /// Use this registry instead of the process-wide default.
    TypeRegistry(Arc<TypeRegistry>),
    /// Struct field layout mode.
    StructEncoding(StructEncoding),
}

impl std::fmt::Debug for CodecOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeRegistry(_) => f.write_str("TypeRegistry(..)"),
            Self::StructEncoding(m) => write!(f, "StructEncoding({m:?})"),
        }
    }
}

static DEFAULT_STRUCT_ENCODING: RwLock<StructEncoding> =
    RwLock::new(StructEncoding::Positional);

/// Set the process-wide default struct field layout.
pub fn set_default_struct_encoding(mode: StructEncoding) {
    *DEFAULT_STRUCT_ENCODING.write() = mode;
}

/// The process-wide default struct field layout.
pub fn default_struct_encoding() -> StructEncoding {
    *DEFAULT_STRUCT_ENCODING.read()
}

/// Resolved configuration for one encode/decode call.
#[derive(Clone, Debug)]
pub(crate) struct Config {
    pub registry: Arc<TypeRegistry>,
    pub struct_mode: StructEncoding,
}

impl Config {
    /// Fold an option list over the process defaults. Passing the same
    /// option kind twice is ambiguous and rejected.
    pub fn from_options(options: &[CodecOption]) -> Result<Self> {
        let mut registry = None;
        let mut struct_mode = None;
        for opt in options {
            match opt {
                CodecOption::TypeRegistry(r) => {
                    if registry.replace(Arc::clone(r)).is_some() {
                        return Err(Error::bad_option("type registry given twice"));
                    }
                }
                CodecOption::StructEncoding(m) => {
                    if struct_mode.replace(*m).is_some() {
                        return Err(Error::bad_option("struct encoding given twice"));
                    }
                }
            }
        }
        Ok(Self {
            registry: registry.unwrap_or_else(TypeRegistry::global),
            struct_mode: struct_mode.unwrap_or_else(default_struct_encoding),
        })
    }
}
