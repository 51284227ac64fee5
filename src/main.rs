use std::rc::Rc;

use merl::{
    DefImage, Method, RawValue, RecordDef, RecordRef, Runtime, RuntimeError, ShapeBuilder,
    SymbolTable, Value,
};

// What the compiler would emit for `Point { x, y; norm() }`: slot
// offsets are baked in, only the dispatch goes through the tables.
fn norm(rec: RecordRef, _args: &[RawValue]) -> RawValue {
    let x = rec.slot(0).as_double();
    let y = rec.slot(1).as_double();
    RawValue::double((x * x + y * y).sqrt())
}

const REGISTRY: &[Method] = &[norm];

fn point_shape(symbols: &mut SymbolTable) -> Result<RecordDef, RuntimeError> {
    let x = symbols.intern("x");
    let y = symbols.intern("y");
    let norm_sym = symbols.intern("norm");
    Ok(ShapeBuilder::new("Point", 4, 2)
        .prop(x, 0)?
        .prop(y, 1)?
        .method(norm_sym, norm)?
        .finish()?)
}

// Entry function of the demo "program": build Point(3, 4), dispatch
// norm through the method table.
fn entry(rt: &mut Runtime) -> Result<Value, RuntimeError> {
    let def = Rc::new(point_shape(&mut rt.symbols)?);
    let norm_sym = rt.symbols.intern("norm");
    let p = rt
        .heap
        .alloc_record(&def, &[RawValue::double(3.0), RawValue::double(4.0)])?;
    let f = p.try_method(norm_sym)?;
    println!("norm {}", Value::Record(p));
    Ok(Value::unpack(f(p, &[])))
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        None => {
            let mut rt = Runtime::new();
            match rt.run(entry) {
                Ok(value) => println!("{}", value),
                Err(e) => {
                    eprintln!("Runtime error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Some("--dump-shape") => {
            let mut symbols = SymbolTable::new();
            let image = point_shape(&mut symbols)
                .and_then(|def| Ok(DefImage::from_def(&def, REGISTRY)?));
            match image {
                Ok(image) => match serde_json::to_string_pretty(&image) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Serialization error: {}", e);
                        std::process::exit(1);
                    }
                },
                Err(e) => {
                    eprintln!("Shape error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Some(other) => {
            eprintln!("Usage: merl [--dump-shape]");
            eprintln!("unknown argument: {}", other);
            std::process::exit(1);
        }
    }
}
