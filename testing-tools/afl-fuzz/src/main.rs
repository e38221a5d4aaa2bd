use afl::fuzz;

fn main() {
    fuzz!(|data: &[u8]| {
        if let Ok(doc) = inplacexml::Document::decode(data.to_vec()) {
            for element in doc.descendants() {
                let _ = element.text();
                for attr in element.attributes() {
                    let _ = attr.value();
                }
            }
        }
    });
}
