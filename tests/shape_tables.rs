//! End-to-end exercises of the record model through the public API:
//! shapes built the way the compiler builds them, instances allocated
//! through the runtime, definition images round-tripped through files.

use std::io::{Read, Write};
use std::rc::Rc;

use merl::{
    ArenaAlloc, DefImage, Heap, HeapError, Method, RawValue, Runtime, RuntimeError, ShapeBuilder,
    StrId, Symbol, Value,
};

fn get_x(rec: merl::RecordRef, _args: &[RawValue]) -> RawValue {
    rec.slot(0)
}

#[test]
fn named_properties_resolve_across_many_shapes() {
    let mut rt = Runtime::new();
    let x = rt.symbols.intern("x");
    let y = rt.symbols.intern("y");
    let tag = rt.symbols.intern("tag");

    let point = Rc::new(
        ShapeBuilder::new("Point", 4, 0)
            .prop(x, 0)
            .and_then(|b| b.prop(y, 1))
            .and_then(ShapeBuilder::finish)
            .unwrap(),
    );
    // Different shape, different table capacity, overlapping symbols.
    let tagged = Rc::new(
        ShapeBuilder::new("Tagged", 3, 0)
            .prop(tag, 0)
            .and_then(|b| b.prop(x, 1))
            .and_then(ShapeBuilder::finish)
            .unwrap(),
    );

    let p = rt
        .heap
        .alloc_record(&point, &[RawValue::double(1.5), RawValue::double(2.5)])
        .unwrap();
    let t = rt
        .heap
        .alloc_record(&tagged, &[RawValue::string(StrId(9)), RawValue::double(8.0)])
        .unwrap();

    assert_eq!(p.try_property(x).unwrap().as_double(), 1.5);
    assert_eq!(p.try_property(y).unwrap().as_double(), 2.5);
    assert_eq!(t.try_property(x).unwrap().as_double(), 8.0);
    assert_eq!(t.try_property(tag).unwrap().as_str(), StrId(9));
    assert!(t.try_property(y).is_err());
}

#[test]
fn randomized_shapes_resolve_at_every_load_factor() {
    fastrand::seed(0x736861706573);
    for _ in 0..200 {
        let capacity = fastrand::usize(1..=12);
        let count = fastrand::usize(1..=capacity);
        let mut symbols: Vec<Symbol> = Vec::new();
        while symbols.len() < count {
            let s = Symbol::new(fastrand::u32(1..10_000));
            if !symbols.contains(&s) {
                symbols.push(s);
            }
        }
        let mut builder = ShapeBuilder::new("fuzz", capacity, 0);
        for (offset, &s) in symbols.iter().enumerate() {
            builder = builder.prop(s, offset as u32).unwrap();
        }
        let def = Rc::new(builder.finish().unwrap());

        let mut heap = Heap::with_arena();
        let init: Vec<RawValue> = (0..count).map(|i| RawValue::double(i as f64)).collect();
        let rec = heap.alloc_record(&def, &init).unwrap();
        for (offset, &s) in symbols.iter().enumerate() {
            assert_eq!(rec.try_property(s).unwrap().as_double(), offset as f64);
        }
        // An id no shape in this iteration uses must terminate with an error.
        let absent = Symbol::new(20_000 + fastrand::u32(1..100));
        assert!(rec.try_property(absent).is_err());
    }
}

#[test]
fn definition_image_survives_a_file_round_trip() {
    let registry: &[Method] = &[get_x];
    let mut symbols = merl::SymbolTable::new();
    let x = symbols.intern("x");
    let getter = symbols.intern("get_x");
    let def = ShapeBuilder::new("Boxed", 2, 2)
        .prop(x, 0)
        .and_then(|b| b.method(getter, get_x))
        .and_then(ShapeBuilder::finish)
        .unwrap();

    let image = DefImage::from_def(&def, registry).unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&image.encode()).unwrap();

    let mut bytes = Vec::new();
    std::fs::File::open(file.path()).unwrap().read_to_end(&mut bytes).unwrap();
    let loaded = DefImage::decode(&bytes).unwrap().to_def("Boxed", registry).unwrap();

    let mut heap = Heap::with_arena();
    let rec = heap
        .alloc_record(&Rc::new(loaded), &[RawValue::double(11.0)])
        .unwrap();
    let f = rec.try_method(getter).unwrap();
    assert_eq!(f as usize, get_x as usize);
    assert_eq!(f(rec, &[]).as_double(), 11.0);
}

#[test]
fn starved_runtime_reports_exhaustion_not_a_fake_record() {
    fn entry(rt: &mut Runtime) -> Result<Value, RuntimeError> {
        let x = rt.symbols.intern("x");
        let def = Rc::new(ShapeBuilder::new("Big", 8, 0).prop(x, 0)?.finish()?);
        let rec = rt.heap.alloc_record(&def, &[RawValue::double(1.0)])?;
        Ok(Value::unpack(rec.try_property(x)?))
    }

    let mut rt = Runtime::with_allocator(Box::new(ArenaAlloc::with_budget(1)));
    match rt.run(entry) {
        Err(RuntimeError::Heap(HeapError::Alloc(e))) => {
            assert_eq!(e.requested_words, 2);
        }
        other => panic!("expected allocation failure, got {:?}", other.map(|v| v.to_string())),
    }
}
