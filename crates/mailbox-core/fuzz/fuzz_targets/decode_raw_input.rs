#![no_main]

use libfuzzer_sys::fuzz_target;
use mailbox_core::{ByteOrder, MailboxWord, RawInputLayout, REGISTER_BYTES};

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let offset = usize::from(data[0] % 16);
    let order = if data[0] & 0x80 == 0 {
        ByteOrder::Little
    } else {
        ByteOrder::Big
    };
    let payload = &data[1..];

    match RawInputLayout::new(offset, order).parse(payload) {
        Ok(input) => {
            assert!(payload.len() >= offset + REGISTER_BYTES);
            assert_eq!(MailboxWord::decode(input.command.encode()), input.command);
            let _ = input.command.to_string();
        }
        Err(_) => assert!(payload.len() < offset + REGISTER_BYTES),
    }
});
