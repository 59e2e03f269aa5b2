//! Shared fixtures for the codec integration suites.
#![allow(dead_code)] // each suite uses a different subset

use std::sync::{Arc, Once};

use tangle_codec::{bits, wire, CodecOption};
use tangle_types::{ty, Kind, StructField, Type, TypeRegistry, Value};

/// Route codec debug events into the test harness output.
fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// A fresh auto-registering registry plus the option list wiring it in.
pub fn registry() -> (Arc<TypeRegistry>, Vec<CodecOption>) {
    init_tracing();
    let reg = Arc::new(TypeRegistry::new(true));
    let opts = vec![CodecOption::TypeRegistry(Arc::clone(&reg))];
    (reg, opts)
}

/// The single-byte type token for a value (all test ids stay below 32).
pub fn tid(reg: &TypeRegistry, v: &Value) -> u8 {
    let id = reg.id_for_value(v).expect("token id");
    packed(id)
}

/// The single-byte type token for a type.
pub fn tid_ty(reg: &TypeRegistry, t: &Type) -> u8 {
    let id = reg.id_of(t).expect("type id");
    packed(id)
}

fn packed(id: u64) -> u8 {
    let mut buf = Vec::new();
    bits::put_uint_with_header(&mut buf, id, 3);
    assert_eq!(buf.len(), 1, "test type id {id} must pack to one byte");
    buf[0]
}

/// A reference token to a (small) node id.
pub fn rf(node: u64) -> [u8; 2] {
    let mut buf = Vec::new();
    bits::put_uint_with_header(&mut buf, node, 3);
    assert_eq!(buf.len(), 1, "test node id {node} must pack to one byte");
    [wire::META_REF, buf[0]]
}

pub fn any() -> Type {
    ty::primitive(Kind::Interface)
}

/// struct Plain { f1 int; f2 bool; f3 string; f4 u8; f5 string }
pub fn plain_struct() -> Type {
    ty::struct_of(
        Some("tst.Plain"),
        vec![
            StructField::new("f1", ty::primitive(Kind::Int)),
            StructField::new("f2", ty::primitive(Kind::Bool)),
            StructField::new("f3", ty::primitive(Kind::String)),
            StructField::new("f4", ty::primitive(Kind::Uint8)),
            StructField::new("f5", ty::primitive(Kind::String)),
        ],
    )
}

/// struct Box3 { f1 any; f2 any; f3 any }
pub fn box3_struct() -> Type {
    ty::struct_of(
        Some("tst.Box3"),
        vec![
            StructField::new("f1", any()),
            StructField::new("f2", any()),
            StructField::new("f3", any()),
        ],
    )
}

/// Mutually recursive list types:
/// struct List { root Node } / struct Node { next *Node; prev *Node; lst *List }
pub fn list_types() -> (Type, Type) {
    let list = ty::recursive("tst.List", |list_t| {
        let node = ty::recursive("tst.Node", |node_t| {
            ty::struct_of(
                Some("tst.Node"),
                vec![
                    StructField::new("next", ty::pointer_to(node_t.clone())),
                    StructField::new("prev", ty::pointer_to(node_t.clone())),
                    StructField::new("lst", ty::pointer_to(list_t.clone())),
                ],
            )
        });
        ty::struct_of(Some("tst.List"), vec![StructField::new("root", node)])
    });
    let node = list.fields().expect("list fields")[0].ty.clone();
    (list, node)
}
