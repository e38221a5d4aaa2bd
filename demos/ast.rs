fn main() {
    let args: Vec<_> = std::env::args().collect();

    if args.len() != 2 {
        println!("Usage:\n\tcargo run --example ast -- input.xml");
        std::process::exit(1);
    }

    let data = std::fs::read(&args[1]).unwrap();

    match inplacexml::Document::decode(data) {
        Ok(doc) => print!("{:?}", doc),
        Err(e) => println!("Error {}: {}.", e.code(), e),
    }
}
