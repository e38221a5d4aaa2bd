fn main() {
    let args: Vec<_> = std::env::args().collect();

    if args.len() != 2 {
        println!("Usage:\n\tcargo run --example print_pos -- input.xml");
        std::process::exit(1);
    }

    let data = std::fs::read(&args[1]).unwrap();
    let doc = match inplacexml::Document::decode(data) {
        Ok(doc) => doc,
        Err(e) => {
            println!("Error: {}.", e);
            return;
        },
    };

    for element in doc.descendants() {
        println!("{:?} at {}", element.name(), element.text_pos());
        for attr in element.attributes() {
            println!("  {:?} at {}", attr.name(), doc.text_pos_at(attr.pos()));
        }
    }
}
