#![no_main]

use std::path::Path;

use iovis::ScopeFile;
use iovis::discovery::suite_file::TestFile;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Convert bytes to UTF-8 string (ignore invalid UTF-8)
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = ScopeFile::parse(s, Path::new("iovis.toml"));
        let _ = TestFile::parse(s, Path::new("test_fuzz.toml"));
    }
});
