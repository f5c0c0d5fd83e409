#![no_main]
use libfuzzer_sys::fuzz_target;
use nxdeflate::dde::{DdeRecord, Fragment, describe};

fuzz_target!(|data: &[u8]| {
    for chunk in data.chunks_exact(16) {
        let rec = DdeRecord::decode(chunk);
        let mut buf = [0u8; 16];
        rec.encode(&mut buf);
        assert_eq!(DdeRecord::decode(&buf), rec);
    }

    // Fragment lengths from the input; the total must never wrap silently.
    let frags: Vec<Fragment> = data
        .chunks_exact(4)
        .enumerate()
        .map(|(i, c)| {
            let len = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
            Fragment::new(0x1000 * (i as u64 + 1), len)
        })
        .collect();
    if let Ok(d) = describe(&frags) {
        let total: u64 = frags.iter().map(|f| u64::from(f.length)).sum();
        assert_eq!(u64::from(d.total_len()), total);
    }
});
