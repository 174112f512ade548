//! Fuzz target for ed2k link rendering from untrusted file names

#![no_main]

use kadseek_search::link::ed2k_link;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 24 {
        return;
    }
    let (head, name) = data.split_at(24);
    let mut hash = [0u8; 16];
    hash.copy_from_slice(&head[..16]);
    let mut size = [0u8; 8];
    size.copy_from_slice(&head[16..]);

    let link = ed2k_link(&String::from_utf8_lossy(name), u64::from_le_bytes(size), &hash);
    assert!(link.is_ascii());
    assert_eq!(link.matches('|').count(), 5);
});
