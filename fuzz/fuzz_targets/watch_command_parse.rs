#![no_main]

use agentwatch_core::{parse_watch_command, WatchCommand};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    match parse_watch_command(&raw) {
        None => {}
        Some(Ok(WatchCommand::Watch { pattern, agent, args })) => {
            assert!(!pattern.trim().is_empty());
            assert!(!agent.trim().is_empty());
            assert_eq!(args.trim(), args);
        }
        Some(Ok(WatchCommand::Unwatch { agent, pattern })) => {
            assert!(!agent.trim().is_empty());
            assert!(!pattern.trim().is_empty());
        }
        Some(Ok(WatchCommand::Run { agent, args })) => {
            assert!(!agent.trim().is_empty());
            assert_eq!(args.trim(), args);
        }
        Some(Ok(WatchCommand::List)) => {}
        Some(Err(error)) => {
            assert!(!error.message.trim().is_empty());
            assert!(!error.usage().is_empty());
        }
    }
});
