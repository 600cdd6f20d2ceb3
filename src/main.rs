mod error;
mod module;
mod pe;
mod reader;
mod sink;

use std::{env, fs, process};

use module::{MemoryBlock, Module, ScanFlags};
use sink::MetadataSink;

/// A sink that just remembers everything it was handed, for the CLI's own
/// use. A real host would route these into its own object tree instead.
#[derive(Default)]
struct PrintingSink {
    integers: Vec<(String, i64)>,
    strings: Vec<(String, String)>,
}

impl MetadataSink for PrintingSink {
    fn set_integer(&mut self, path: &str, value: i64) {
        self.integers.push((path.to_string(), value));
    }

    fn set_string(&mut self, path: &str, value: &str) {
        self.strings.push((path.to_string(), value.to_string()));
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: {} FILE", args[0]);
        process::exit(1);
    }

    let data = match fs::read(&args[1]) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{}: {}", args[1], e);
            process::exit(1);
        }
    };

    let blocks = [MemoryBlock { base: 0, data: &data }];
    let mut sink = PrintingSink::default();

    let loaded = match Module::load(&blocks, ScanFlags::default(), &mut sink) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    let image = match &loaded.image {
        Some(image) => image,
        None => {
            println!("not a recognized PE image");
            return;
        }
    };

    for (path, value) in &sink.integers {
        println!("{} = {}", path, value);
    }
    for (path, value) in &sink.strings {
        println!("{} = {:?}", path, value);
    }

    println!("section_index(\".text\") = {}", sink::section_index(image, ".text"));

    loaded.unload();
}
