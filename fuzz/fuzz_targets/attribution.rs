#![no_main]

use libfuzzer_sys::fuzz_target;
use rastro::attribution::Attributor;
use rastro::frame::StackFrame;

fuzz_target!(|data: &[u8]| {
    // Decode bytes into a stack of frames: records of
    // (function bytes, file bytes, line), separated by 0xFF
    let mut frames = Vec::new();
    for record in data.split(|&b| b == 0xFF).take(256) {
        let mid = record.len() / 2;
        let function = String::from_utf8_lossy(&record[..mid]).into_owned();
        let file = String::from_utf8_lossy(&record[mid..]).into_owned();
        let line = record.len() as u32;
        frames.push(StackFrame::new(function, file, line));
    }

    // Attribution must not panic for any stack shape or content
    let attributor = Attributor::new();
    let quiet = attributor.attribute(&frames, false);
    let verbose = attributor.attribute(&frames, true);
    assert_eq!(quiet.owner, verbose.owner);
});
