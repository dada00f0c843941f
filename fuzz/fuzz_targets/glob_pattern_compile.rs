#![no_main]

use agentwatch_core::{glob_matches, GlobPattern, MATCH_ALL_PATTERN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let (pattern, path) = raw.split_once('\n').unwrap_or((&*raw, "src/a.js"));

    let compiled = GlobPattern::compile(pattern);
    assert_eq!(compiled.as_str(), pattern);
    let matched = compiled.is_match(path);
    assert_eq!(matched, glob_matches(pattern, path));
    if !compiled.is_valid() {
        assert!(!matched);
    }
    assert!(glob_matches(MATCH_ALL_PATTERN, path));
});
