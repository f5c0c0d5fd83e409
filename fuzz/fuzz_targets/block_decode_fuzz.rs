#![no_main]
use libfuzzer_sys::fuzz_target;
use nxdeflate::block::CrbCpb;
use nxdeflate::completion::Outcome;

fuzz_target!(|data: &[u8]| {
    // Whatever the device leaves in the block, decoding must not panic.
    let mut block = CrbCpb::new();
    let n = data.len().min(block.as_bytes().len());
    block.as_bytes_mut()[..n].copy_from_slice(&data[..n]);

    let _ = block.request();
    let _ = block.input();
    let _ = block.stamped_fault();
    let _ = format!("{block:?}");

    if let Ok(completion) = block.decode() {
        match completion.interpret() {
            Outcome::Fault(f) => {
                let _ = f.to_string();
            }
            Outcome::Suspended { resume, .. } => {
                let _ = resume.block_state();
                let _ = resume.unprocessed_bytes();
            }
            Outcome::Success { .. } => {}
        }
    }
});
