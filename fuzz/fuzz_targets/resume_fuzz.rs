#![no_main]
use libfuzzer_sys::fuzz_target;
use nxdeflate::block::{CrbCpb, ParamInput, ParamOutput, Request, ResumeFields};
use nxdeflate::dde::{Fragment, describe};
use nxdeflate::function::{FC_DECOMPRESS_RESUME, FunctionCode};

fuzz_target!(|data: &[u8]| {
    if data.len() < 6 {
        return;
    }
    let subc = u16::from_be_bytes([data[0], data[1]]);
    let resume_word = u32::from_be_bytes([data[2], data[3], data[4], data[5]]);
    let mut dht = Box::new([0u8; 288]);
    let rest = &data[6..];
    let n = rest.len().min(dht.len());
    dht[..n].copy_from_slice(&rest[..n]);

    let resume = ResumeFields::from_output(&ParamOutput {
        subc,
        resume_word,
        dht: Some(dht),
        ..Default::default()
    });
    let mut input = ParamInput::fresh();
    resume.apply(&mut input);
    assert!(input.subc < 8);
    assert_eq!(input.resume_word, resume_word);
    assert_eq!(input.dht.is_some(), resume.block_state().is_dynamic());

    // The threaded state survives a trip through the block.
    let src = [0u8; 16];
    let mut dst = [0u8; 16];
    let (Ok(source), Ok(target)) = (
        describe(&[Fragment::new(src.as_ptr() as u64, 16)]),
        describe(&[Fragment::new(dst.as_mut_ptr() as u64, 16)]),
    ) else {
        return;
    };
    let Some(fc) = FunctionCode::from_raw(FC_DECOMPRESS_RESUME) else {
        return;
    };
    let mut block = CrbCpb::new();
    let req = Request {
        fc,
        source: &source,
        target: &target,
        signal: None,
        address_type: false,
    };
    if block.encode(&req, &input).is_ok() {
        let back = block.input();
        assert_eq!(back.subc, input.subc);
        assert_eq!(back.resume_word, input.resume_word);
    }
});
