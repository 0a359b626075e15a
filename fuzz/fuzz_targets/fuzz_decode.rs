#![no_main]

use libfuzzer_sys::fuzz_target;
use puncher_protocol::core::codec::{decode_from_slice, encode};

fuzz_target!(|data: &[u8]| {
    // Any frame that decodes must re-encode to the bytes it came from
    if let Ok((msg, used)) = decode_from_slice(data) {
        let bytes = encode(&msg).expect("decoded message re-encodes");
        assert_eq!(&bytes[..], &data[..used]);
    }
});
