//! Fuzz target for KAD datagram decoding
//!
//! Decoding arbitrary bytes must return Ok or Err, never panic. Search
//! responses that decode are also turned into file records and encoded back.

#![no_main]

use kadseek_proto::KadMessage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(KadMessage::Kad2SearchRes(res)) = KadMessage::decode(data) {
        let _ = res.files();
        let _ = KadMessage::Kad2SearchRes(res).encode();
    }
});
