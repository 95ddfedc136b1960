#![no_main]

use libfuzzer_sys::fuzz_target;
use sunat::config::mask_secret;

fuzz_target!(|data: &[u8]| {
    if let Ok(secret) = std::str::from_utf8(data) {
        let masked = mask_secret(secret);
        let len = secret.chars().count();

        // 1. Short secrets are fully starred, longer ones keep a 4-char prefix
        if len <= 8 {
            assert_eq!(masked.chars().count(), len);
            assert!(masked.chars().all(|c| c == '*'));
        } else {
            assert_eq!(masked.chars().count(), 8);
            let prefix: String = secret.chars().take(4).collect();
            assert!(masked.starts_with(&prefix));
            assert!(masked.ends_with("****"));
        }

        // 2. Nothing beyond the prefix ever leaks: the tail of a long secret
        //    cannot appear in the masked form unless it is made of stars
        if len > 8 {
            let tail: String = secret.chars().skip(4).collect();
            if !tail.contains('*') {
                assert!(!masked.contains(&tail));
            }
        }
    }
});
