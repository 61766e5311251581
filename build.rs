//! Build script to generate the named color table.
//!
//! Reads `named_colors.txt` from the crate root and generates a static map of
//! CSS color names to their hex values.

use std::env;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use phf_codegen::Map;

fn main() {
    println!("cargo:rerun-if-changed=named_colors.txt");

    let path = Path::new(&env::var("OUT_DIR").unwrap()).join("colors.rs");
    let mut file = BufWriter::new(File::create(&path).unwrap());

    let source = fs::read_to_string("named_colors.txt").unwrap();

    // The map borrows its values, so they must outlive `build()`.
    let entries: Vec<(&str, String)> = source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            Some((parts.next()?, format!("\"{}\"", parts.next()?)))
        })
        .collect();

    let mut color_map = Map::new();
    for (name, value) in &entries {
        color_map.entry(*name, value);
    }

    writeln!(
        &mut file,
        "static COLORS: phf::Map<&'static str, &'static str> = \n{};\n",
        color_map.build()
    )
    .unwrap();
}
