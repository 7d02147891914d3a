#![no_main]
use car_archive::{AttributeList, Facet, Reader, Result};
use libfuzzer_sys::fuzz_target;

// Arbitrary images must load or fail cleanly, and a loaded reader must
// walk and search without panicking
fuzz_target!(|data: &[u8]| {
    let reader = match Reader::load(data) {
        Ok(reader) => reader,
        Err(_) => return,
    };

    let _ = reader.facet_iterate(|facet| -> Result<()> {
        let _ = reader.lookup_renditions(facet);
        Ok(())
    });
    let _ = reader.lookup_renditions(&Facet::new("any", AttributeList::new()));
    let _ = reader.info_json();
});
