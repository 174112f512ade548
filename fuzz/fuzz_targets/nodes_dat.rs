//! Fuzz target for nodes.dat parsing

#![no_main]

use kadseek_proto::parse_nodes_dat;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(contacts) = parse_nodes_dat(data) {
        assert!(contacts.iter().all(|c| c.is_routable()));
    }
});
