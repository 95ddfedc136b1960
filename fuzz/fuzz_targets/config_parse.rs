#![no_main]

use libfuzzer_sys::fuzz_target;
use sunat::config::SunatConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(config) = toml::from_str::<SunatConfig>(text) {
            // 1. Defaults fill the endpoint hosts even for sparse input
            assert!(!config.endpoints.auth_base_url.is_empty() || text.contains("auth_base_url"));

            // 2. Whatever parses must survive a save/load cycle unchanged
            if let Ok(rendered) = toml::to_string_pretty(&config) {
                if let Ok(reparsed) = toml::from_str::<SunatConfig>(&rendered) {
                    assert_eq!(config, reparsed);
                }
            }
        }
    }
});
