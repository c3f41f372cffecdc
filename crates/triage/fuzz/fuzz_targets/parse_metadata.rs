#![no_main]

use std::path::PathBuf;

use libfuzzer_sys::fuzz_target;
use triage::{ContentKey, ContentKeyConvention, MetadataRecord};

fuzz_target!(|data: &[u8]| {
    let convention = ContentKeyConvention::default();
    if let Ok(name) = std::str::from_utf8(data) {
        if let Some(key) = convention.derive(name) {
            assert!(!key.as_str().is_empty());
        }
    }

    if let Ok(parsed) =
        MetadataRecord::from_slice(data, PathBuf::from(".fuzz_0.metadata"), ContentKey::new("fuzz"))
    {
        if let Some(pointer) = parsed.record.misc_pointer {
            assert_eq!(pointer.full() as u32, pointer.lower);
        }
        for issue in &parsed.issues {
            let _ = issue.to_string();
        }
    }
});
