//! PE fuzz target: feed arbitrary bytes to the PE grammar, resource tree included.
//! Decoding must not panic or recurse without bound; any input yields Ok or a ParseError.
//! Build with: cargo fuzz run pe_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let source = binmetal::SliceSource::new(data);
    let format = binmetal::formats::pe::format();
    if let Ok(env) = format.decode(&source) {
        let _ = binmetal::export::tree_json(env.history(), &binmetal::TreeOptions::default());
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run pe_fuzz");
}
