//! EML fuzz target: greedy header fields over arbitrary bytes.
//! Build with: cargo fuzz run eml_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let source = binmetal::SliceSource::new(data);
    let _ = binmetal::formats::eml::format().decode(&source);
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run eml_fuzz");
}
