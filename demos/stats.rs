use std::env;
use std::fs;
use std::process;

use inplacexml::{DecodeOptions, Document};

fn main() {
    let args: Vec<_> = env::args().collect();

    if args.len() != 2 {
        println!("Usage:\n\tcargo run --example stats -- input.xml");
        process::exit(1);
    }

    let data = fs::read(&args[1]).unwrap();
    let opt = DecodeOptions {
        decode_entities: false,
        ..DecodeOptions::default()
    };

    let doc = match Document::decode_with_options(data, opt) {
        Ok(v) => v,
        Err(e) => {
            println!("Error: {}.", e);
            process::exit(1);
        }
    };

    println!("Elements count: {}", doc.element_count());
    println!("Attributes count: {}", doc.attribute_count());
    println!("Element pool blocks: {}", doc.element_blocks());
    println!("Attribute pool blocks: {}", doc.attribute_blocks());

    let depth = doc.descendants().map(|e| e.ancestors().count()).max().unwrap_or(0);
    println!("Max depth: {}", depth + 1);

    println!("Elements with text: {}",
             doc.descendants().filter(|e| e.text().is_some()).count());
}
