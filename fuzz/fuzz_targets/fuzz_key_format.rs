#![no_main]
use car_archive::KeyFormat;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(format) = KeyFormat::from_bytes(data) {
        assert_eq!(KeyFormat::from_bytes(&format.to_bytes()).ok(), Some(format.clone()));

        let key = &data[data.len().min(12)..];
        if let Ok(attributes) = format.decode(key) {
            assert_eq!(format.encode(&attributes), key);
        }
    }
});
