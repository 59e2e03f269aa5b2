//! Byte-level golden vectors and round-trips for every scalar kind.
//!
//! Expected bytes list the version, the type token, then the body.

mod common;

use std::sync::Arc;

use common::{registry, tid};
use tangle_codec::{decode, encode, wire};
use tangle_types::{structural_eq, ty, ChanDir, ChanVal, FuncVal, Heap, Kind, Value};

/// Encode, compare bytes when given, decode, compare structurally.
fn check(cases: Vec<(Value, Option<Vec<u8>>)>) {
    let (reg, opts) = registry();
    for (i, (value, expected)) in cases.into_iter().enumerate() {
        let heap = Heap::new();
        let data = encode(&heap, &value, &opts).unwrap_or_else(|e| {
            panic!("case #{i}: encode failed: {e}");
        });
        if let Some(expected) = expected {
            assert_eq!(data, expected, "case #{i}: wire bytes");
        }
        let mut out = Heap::new();
        let back = decode(&mut out, &data, &opts)
            .unwrap_or_else(|e| panic!("case #{i}: decode failed: {e}"));
        assert!(
            structural_eq(&heap, &value, &out, &back),
            "case #{i}: decoded value differs ({value:?} vs {back:?})"
        );
        // Encoding is deterministic.
        assert_eq!(data, encode(&heap, &value, &opts).unwrap(), "case #{i}");
    }
    drop(reg);
}

#[test]
fn nil_value() {
    let (reg, _) = registry();
    let t = tid(&reg, &Value::nil());
    check(vec![(Value::nil(), Some(vec![1, t, wire::META_NIL]))]);
    assert_eq!(t, 0b0010_0000); // id 0
}

#[test]
fn booleans() {
    let (reg, _) = registry();
    let t = tid(&reg, &Value::bool(false));
    check(vec![
        (Value::bool(false), Some(vec![1, t, 1])),
        (Value::bool(true), Some(vec![1, t, 3])),
    ]);

    let flag = ty::named("tst.Flag", ty::primitive(Kind::Bool));
    let (reg2, opts) = registry();
    let v = Value::bool(true).with_type(flag);
    let t2 = tid(&reg2, &v);
    let data = encode(&Heap::new(), &v, &opts).unwrap();
    assert_eq!(data, vec![1, t2, 3]);
    let mut out = Heap::new();
    let back = decode(&mut out, &data, &opts).unwrap();
    assert_eq!(back.ty().name(), "tst.Flag");
}

#[test]
fn strings() {
    let (reg, _) = registry();
    let t = tid(&reg, &Value::string(""));
    let mut long255 = vec![1, t, 0b0010_0000, 255];
    long255.extend(std::iter::repeat(b'a').take(255));
    let mut long64k = vec![1, t, 0b0011_0001, 0, 0];
    long64k.extend(std::iter::repeat(b'a').take(65_536));
    check(vec![
        (Value::string(""), Some(vec![1, t, 0b0001_0000])),
        (
            Value::string("0123456789"),
            Some(vec![
                1, t, 0b0001_1010, b'0', b'1', b'2', b'3', b'4', b'5', b'6', b'7', b'8', b'9',
            ]),
        ),
        (Value::string(&"a".repeat(255)), Some(long255)),
        (Value::string(&"a".repeat(65_536)), Some(long64k)),
        // One past what a 3-byte length frame can carry.
        (Value::string(&"a".repeat(1 << 20)), None),
    ]);
}

#[test]
fn uint8_int8() {
    let (reg, _) = registry();
    let tu = tid(&reg, &Value::uint8(0));
    let ti = tid(&reg, &Value::int8(0));
    check(vec![
        (Value::uint8(0), Some(vec![1, tu, 0])),
        (Value::uint8(1), Some(vec![1, tu, 1])),
        (Value::uint8(255), Some(vec![1, tu, 255])),
        (Value::int8(0), Some(vec![1, ti, 0])),
        (Value::int8(1), Some(vec![1, ti, 2])),
        (Value::int8(-1), Some(vec![1, ti, 1])),
        (Value::int8(127), Some(vec![1, ti, 254])),
        (Value::int8(-128), Some(vec![1, ti, 255])),
    ]);
}

#[test]
fn uint16_int16() {
    let (reg, _) = registry();
    let tu = tid(&reg, &Value::uint16(0));
    let ti = tid(&reg, &Value::int16(0));
    check(vec![
        (Value::uint16(0), Some(vec![1, tu, 0b0100_0000])),
        (Value::uint16(1), Some(vec![1, tu, 0b0100_0001])),
        (Value::uint16(256), Some(vec![1, tu, 0b1000_0001, 0])),
        (Value::uint16(65535), Some(vec![1, tu, 0b1100_0000, 255, 255])),
        (Value::int16(1), Some(vec![1, ti, 0b0100_0010])),
        (Value::int16(-1), Some(vec![1, ti, 0b0100_0001])),
        (Value::int16(256), Some(vec![1, ti, 0b1000_0010, 0])),
        (Value::int16(-256), Some(vec![1, ti, 0b1000_0001, 255])),
        (Value::int16(32767), Some(vec![1, ti, 0b1100_0000, 255, 254])),
        (Value::int16(-32768), Some(vec![1, ti, 0b1100_0000, 255, 255])),
    ]);
}

#[test]
fn uint32_int32() {
    let (reg, _) = registry();
    let tu = tid(&reg, &Value::uint32(0));
    let ti = tid(&reg, &Value::int32(0));
    check(vec![
        (Value::uint32(0), Some(vec![1, tu, 0b0010_0000])),
        (Value::uint32(256), Some(vec![1, tu, 0b0100_0001, 0])),
        (Value::uint32(123_456), Some(vec![1, tu, 0b0110_0001, 226, 64])),
        (
            Value::uint32(u32::MAX),
            Some(vec![1, tu, 0b1010_0000, 255, 255, 255, 255]),
        ),
        (Value::int32(123_456), Some(vec![1, ti, 0b0110_0011, 196, 128])),
        (Value::int32(-123_456), Some(vec![1, ti, 0b0110_0011, 196, 127])),
        (
            Value::int32(i32::MAX),
            Some(vec![1, ti, 0b1010_0000, 255, 255, 255, 254]),
        ),
        (
            Value::int32(i32::MIN),
            Some(vec![1, ti, 0b1010_0000, 255, 255, 255, 255]),
        ),
    ]);
}

#[test]
fn uint64_int64() {
    let (reg, _) = registry();
    let tu = tid(&reg, &Value::uint64(0));
    let ti = tid(&reg, &Value::int64(0));
    check(vec![
        (Value::uint64(0), Some(vec![1, tu, 0b0001_0000])),
        (Value::uint64(1 << 8), Some(vec![1, tu, 0b0010_0001, 0])),
        (Value::uint64(1 << 56), Some(vec![1, tu, 0b1000_0001, 0, 0, 0, 0, 0, 0, 0])),
        (
            Value::uint64(u64::MAX),
            Some(vec![1, tu, 0b1001_0000, 255, 255, 255, 255, 255, 255, 255, 255]),
        ),
        (Value::int64(1), Some(vec![1, ti, 0b0001_0010])),
        (Value::int64(-1), Some(vec![1, ti, 0b0001_0001])),
        (
            Value::int64(i64::MAX),
            Some(vec![1, ti, 0b1001_0000, 255, 255, 255, 255, 255, 255, 255, 254]),
        ),
        (
            Value::int64(i64::MIN),
            Some(vec![1, ti, 0b1001_0000, 255, 255, 255, 255, 255, 255, 255, 255]),
        ),
    ]);
}

#[test]
fn machine_word_integers() {
    let (reg, _) = registry();
    let tu = tid(&reg, &Value::uint(0));
    let ti = tid(&reg, &Value::int(0));
    let tp = tid(&reg, &Value::uintptr(0));
    check(vec![
        (Value::uint(0), Some(vec![1, tu, 0b0001_0000])),
        (Value::uint(255), Some(vec![1, tu, 0b0010_0000, 255])),
        (Value::uint(1 << 16), Some(vec![1, tu, 0b0011_0001, 0, 0])),
        (Value::int(127), Some(vec![1, ti, 0b0010_0000, 254])),
        (Value::int(-128), Some(vec![1, ti, 0b0010_0000, 255])),
        (Value::int(128), Some(vec![1, ti, 0b0010_0001, 0])),
        (Value::int(-129), Some(vec![1, ti, 0b0010_0001, 1])),
        (Value::uintptr(123_456), Some(vec![1, tp, 0b0011_0001, 226, 64])),
    ]);
}

#[test]
fn raw_pointers() {
    let (reg, _) = registry();
    let t = tid(&reg, &Value::raw_ptr(0));
    check(vec![
        (Value::raw_ptr(0), Some(vec![1, t, wire::META_NIL])),
        (Value::raw_ptr(123_456), Some(vec![1, t, 0b0011_0001, 226, 64])),
    ]);
}

#[test]
fn floats() {
    let (reg, _) = registry();
    let t32 = tid(&reg, &Value::float32(0.0));
    let t64 = tid(&reg, &Value::float64(0.0));
    check(vec![
        (Value::float32(0.0), Some(vec![1, t32, 0b0010_0000])),
        (Value::float32(1.0), Some(vec![1, t32, 0b0110_0000, 128, 63])),
        (Value::float32(10.0), Some(vec![1, t32, 0b0110_0000, 32, 65])),
        (Value::float32(-1.0), Some(vec![1, t32, 0b0110_0000, 128, 191])),
        (
            Value::float32(1.23),
            Some(vec![1, t32, 0b1010_0000, 164, 112, 157, 63]),
        ),
        (Value::float64(0.0), Some(vec![1, t64, 0b0001_0000])),
        (Value::float64(1.0), Some(vec![1, t64, 0b0011_0000, 240, 63])),
        (Value::float64(-10.0), Some(vec![1, t64, 0b0011_0000, 36, 192])),
        (
            Value::float64(1.23),
            Some(vec![1, t64, 0b1001_0000, 174, 71, 225, 122, 20, 174, 243, 63]),
        ),
        (
            Value::float64(-1.23),
            Some(vec![1, t64, 0b1001_0000, 174, 71, 225, 122, 20, 174, 243, 191]),
        ),
    ]);
}

#[test]
fn complex_numbers() {
    let (reg, _) = registry();
    let t64 = tid(&reg, &Value::complex64(0.0, 0.0));
    let t128 = tid(&reg, &Value::complex128(0.0, 0.0));
    check(vec![
        (
            Value::complex64(0.0, 0.0),
            Some(vec![1, t64, 0b0010_0000, 0b0010_0000]),
        ),
        (
            Value::complex64(1.0, 0.0),
            Some(vec![1, t64, 0b0110_0000, 128, 63, 0b0010_0000]),
        ),
        (
            Value::complex64(0.0, 1.0),
            Some(vec![1, t64, 0b0010_0000, 0b0110_0000, 128, 63]),
        ),
        (
            Value::complex128(0.0, 1.0),
            Some(vec![1, t128, 0b0001_0000, 0b0011_0000, 240, 63]),
        ),
        (
            Value::complex128(1.23, -1.23),
            Some(vec![
                1, t128, 0b1001_0000, 174, 71, 225, 122, 20, 174, 243, 63, 0b1001_0000, 174, 71,
                225, 122, 20, 174, 243, 191,
            ]),
        ),
    ]);
}

#[test]
fn channels() {
    let (reg, opts) = registry();
    let recv_ty = ty::chan_of(ChanDir::Recv, ty::primitive(Kind::Bool));
    let both_ty = ty::chan_of(ChanDir::Both, ty::primitive(Kind::Int));
    let send_ty = ty::chan_of(ChanDir::Send, ty::primitive(Kind::Bool));

    let nil_chan = Value::chan(recv_ty.clone(), None);
    let t_recv = tid(&reg, &nil_chan);
    let data = encode(&Heap::new(), &nil_chan, &opts).unwrap();
    assert_eq!(data, vec![1, t_recv, wire::META_NIL]);
    let mut out = Heap::new();
    let back = decode(&mut out, &data, &opts).unwrap();
    assert_eq!(back.ty().name(), "<-chan bool");
    assert!(back.is_nil());

    for (ty_, cap, cap_byte) in [
        (both_ty, 0usize, 0b0001_0000u8),
        (send_ty, 1, 0b0001_0001),
        (recv_ty, 10, 0b0001_1010),
    ] {
        let v = Value::chan(ty_, Some(Arc::new(ChanVal { cap })));
        let t = tid(&reg, &v);
        let data = encode(&Heap::new(), &v, &opts).unwrap();
        assert_eq!(data, vec![1, t, wire::META_NONNIL, cap_byte]);
        let mut out = Heap::new();
        let back = decode(&mut out, &data, &opts).unwrap();
        assert!(structural_eq(&Heap::new(), &v, &out, &back));
    }
}

#[test]
fn functions() {
    let (reg, opts) = registry();
    let fty = ty::func_sig("func(u8, bool) i8");

    let nil_fn = Value::func(fty.clone(), None);
    let t_type = tid(&reg, &nil_fn);
    let data = encode(&Heap::new(), &nil_fn, &opts).unwrap();
    assert_eq!(data, vec![1, t_type, wire::META_NIL]);

    let abs = FuncVal::new("tst.Abs");
    let v = Value::func(fty.clone(), Some(abs));
    let t_fn = tid(&reg, &v);
    assert_ne!(t_fn, t_type, "function identity and function type differ");
    let data = encode(&Heap::new(), &v, &opts).unwrap();
    assert_eq!(data, vec![1, t_fn, wire::META_NONNIL]);

    let mut out = Heap::new();
    let back = decode(&mut out, &data, &opts).unwrap();
    match back.data() {
        tangle_types::Data::Func(Some(h)) => assert_eq!(h.name, "tst.Abs"),
        other => panic!("expected a resolved function handle, got {other:?}"),
    }
    drop(reg);
}

#[test]
fn zero_values_are_byte_stable() {
    // Every primitive zero value encodes to the same bytes run over run.
    let (_, opts) = registry();
    let zeros = [
        Value::bool(false),
        Value::string(""),
        Value::uint8(0),
        Value::int8(0),
        Value::uint16(0),
        Value::int16(0),
        Value::uint32(0),
        Value::int32(0),
        Value::uint64(0),
        Value::int64(0),
        Value::uint(0),
        Value::int(0),
        Value::uintptr(0),
        Value::raw_ptr(0),
        Value::float32(0.0),
        Value::float64(0.0),
        Value::complex64(0.0, 0.0),
        Value::complex128(0.0, 0.0),
    ];
    let heap = Heap::new();
    for z in &zeros {
        let first = encode(&heap, z, &opts).unwrap();
        for _ in 0..3 {
            assert_eq!(first, encode(&heap, z, &opts).unwrap());
        }
    }
}

#[test]
fn interface_root_is_transparent() {
    // Encoding `any(true)` produces the same bytes as encoding `true`.
    let (_, opts) = registry();
    let heap = Heap::new();
    let plain = encode(&heap, &Value::bool(true), &opts).unwrap();
    let boxed = encode(&heap, &Value::interface(Some(Value::bool(true))), &opts).unwrap();
    assert_eq!(plain, boxed);

    let nil_any = encode(&heap, &Value::interface(None), &opts).unwrap();
    let nil_plain = encode(&heap, &Value::nil(), &opts).unwrap();
    assert_eq!(nil_any, nil_plain);
}
