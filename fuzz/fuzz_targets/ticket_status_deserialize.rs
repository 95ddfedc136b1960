#![no_main]

use libfuzzer_sys::fuzz_target;
use sunat::ticket::TicketStatus;

fuzz_target!(|data: &[u8]| {
    if let Ok(json_str) = std::str::from_utf8(data) {
        if let Ok(status) = serde_json::from_str::<TicketStatus>(json_str) {
            // 1. Every status is either still processing or terminal, never both
            assert_ne!(status.is_processing(), status.is_terminal());

            // 2. At most one concrete classification holds
            let classified =
                status.is_success() as u8 + status.is_processing() as u8 + status.is_error() as u8;
            assert!(classified <= 1);

            // 3. Whatever decodes must survive a re-encode cycle
            if let Ok(roundtripped) = serde_json::to_string(&status) {
                if let Ok(parsed) = serde_json::from_str::<TicketStatus>(&roundtripped) {
                    assert_eq!(status, parsed);
                }
            }
        }
    }
});
