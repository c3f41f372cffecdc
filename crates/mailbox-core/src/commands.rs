/// A known BIOS-to-PSP mailbox command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MailboxCommand {
    /// Command identifier as carried in bits 23..16 of the mailbox word.
    pub id: u8,
    /// Symbolic name from the firmware interface.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
}

const fn command(id: u8, name: &'static str, description: &'static str) -> MailboxCommand {
    MailboxCommand {
        id,
        name,
        description,
    }
}

/// Known mailbox commands, sorted by identifier.
///
/// Identifiers missing from this table are not errors, they are simply unnamed.
pub const MAILBOX_COMMAND_TABLE: &[MailboxCommand] = &[
    command(
        0x02,
        "MboxBiosCmdSmmInfo",
        "Provides details on SMM memory area reserved for PSP. It includes the physical addresses of SMM Base and PSP SMM data region and the length of PSP SMM data region.",
    ),
    command(
        0x03,
        "MboxBiosCmdSxInfo",
        "Notification that the platform is entering S3-suspend state.",
    ),
    command(
        0x04,
        "MboxBiosCmdRsmInfo",
        "Information on BIOS Resume Module stored in SMM memory includes the BIOS resume vector and size of the resume code.",
    ),
    command(
        0x05,
        "MboxBiosCmdPspQuery",
        "Command to get the list of capabilities supported by PSP FW. This is used to communicate if fTPM is supported in PSP FW.",
    ),
    command(
        0x06,
        "MboxBiosCmdBootDone",
        "Notification that BIOS has completed BIOS POST.",
    ),
    command(
        0x14,
        "MboxBiosCmdHSTIQuery",
        "Command to get HSTI bit field representing the security state of the SOC from the PSP.",
    ),
    command(0x19, "MboxBiosCmdGetVersion", "Get FW version."),
    command(
        0x1A,
        "MboxBiosCmdSetFuse",
        "BIOS sends this command to set Field Programmable fuse; only enabled in special released FW.",
    ),
    command(
        0x1B,
        "MboxBiosCmdLockDFReg",
        "BIOS will send this command to lock DF registers.",
    ),
    command(
        0x1C,
        "MboxBiosCmdClrSmmLock",
        "Command to clear SMMLock register in C6 private memory region.",
    ),
    command(
        0x1D,
        "MboxBiosCmdSetApCsBase",
        "BIOS will send the CS BASE value for AP threads.",
    ),
    command(0x1E, "MboxBiosCmdKvmInfo", "KVM required information."),
    command(
        0x1F,
        "MboxBiosCmdLockSpi",
        "BIOS will send this command to lock SPI; X86 must be in SMM mode when sending this command.",
    ),
    command(
        0x20,
        "MboxBiosCmdScreenOnGpio",
        "Report the FCH GPIOs for early turn on eDP panel in S0i3.",
    ),
    command(
        0x21,
        "MboxBiosCmdSpiOpWhiteList",
        "BIOS sends SPI operation whitelist to lock SPI; X86 must be in SMM mode when sending this command; only used in server product.",
    ),
    command(
        0x22,
        "MboxBiosCmdPsbAutoFusing",
        "PSP will set the PSB related in the field; used only in non-server products.",
    ),
    command(
        0x24,
        "MboxBiosCmdRasEinj",
        "BIOS sends RAS Error Injection action.",
    ),
    command(0x25, "MboxBiosCmdStopArs", "Command to Stop ARS for RAS feature."),
    command(
        0x26,
        "MboxBiosCmdSetBootPartitionId",
        "BIOS sends this command to PSP to write the ACTIVE_BOOT_PARTITION_ID register.",
    ),
    command(0x27, "MboxBiosCmdPspCapsQuery", "BIOS checks PSP NVRAM health."),
    command(
        0x2D,
        "MboxBiosCmdLaterSplFuse",
        "BIOS sends this command to PSP for SPL fuse for anti-rollback feature.",
    ),
    command(
        0x2E,
        "MboxBiosCmdDtpmInfo",
        "BIOS-to-PSP: Command to get dTPM status and event log.",
    ),
    command(
        0x2F,
        "BIOS_CMD_VALIDATE_MAN_OS_SIGNATURE",
        "BIOS-to-PSP: Validate signature of manageability OS image based on header passed by BIOS.",
    ),
    command(
        0x30,
        "MboxBiosCmdLockFCHReg",
        "BIOS-to-PSP: BIOS sends this command to lock FCH PM and IOMux registers.",
    ),
    command(
        0x31,
        "BIOS_CMD_GET_DRTM_INFO",
        "BIOS-to-PSP: Queries updated dRTM information in post dRTM phase.",
    ),
    command(
        0x39,
        "MboxBiosCmdSetRpmcAddress",
        "BIOS-to-PSP: Bios sends this command to PSP to decide which RPMC address to use. Only used in product line.",
    ),
    command(
        0x3A,
        "MboxBiosCmdLockGPIO",
        "A warm reset should be issued after receiving BIOS_MBOX_OK (0) from PSP tOS, otherwise BIOS does nothing. BIOS-to-PSP: BIOS sends this command to PSP to lock GPIO.",
    ),
    command(
        0x3F,
        "MboxBiosCmdSendIvrsAcpiTable",
        "BIOS-to-PSP: BIOS sends IVRS buffer to PSP, PSP saves it, then AMDSL uses another command to retrieve it back to the buffer.",
    ),
    command(0x40, "MboxBiosCmdTa", "Send command to TA."),
    command(
        0x41,
        "BIOS_CMD_ACPI_RAS_EINJ",
        "BIOS-to-PSP: Enables/disables ACPI-based RAS EINJ feature.",
    ),
    command(
        0x42,
        "MboxBiosCmdQueryTCGLog",
        "BIOS-to-PSP: Queries TCG Log.",
    ),
    command(
        0x47,
        "MboxBiosCmdQuerySplFuse",
        "BIOS-to-PSP: Gets the current value of the SPL_F (FW_ROLLBACK_CNT) fuse value.",
    ),
];

/// Looks up a command identifier in [`MAILBOX_COMMAND_TABLE`].
#[must_use]
pub fn lookup_command(id: u8) -> Option<&'static MailboxCommand> {
    MAILBOX_COMMAND_TABLE
        .binary_search_by_key(&id, |entry| entry.id)
        .ok()
        .map(|index| &MAILBOX_COMMAND_TABLE[index])
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rstest::rstest;

    use super::{lookup_command, MAILBOX_COMMAND_TABLE};

    #[test]
    fn table_is_sorted_and_unique() {
        let ids: Vec<u8> = MAILBOX_COMMAND_TABLE.iter().map(|c| c.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        assert_eq!(ids, sorted);

        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), MAILBOX_COMMAND_TABLE.len());
    }

    #[test]
    fn table_spans_documented_range() {
        assert_eq!(MAILBOX_COMMAND_TABLE.first().map(|c| c.id), Some(0x02));
        assert_eq!(MAILBOX_COMMAND_TABLE.last().map(|c| c.id), Some(0x47));
    }

    #[rstest]
    #[case(0x05, "MboxBiosCmdPspQuery")]
    #[case(0x19, "MboxBiosCmdGetVersion")]
    #[case(0x2F, "BIOS_CMD_VALIDATE_MAN_OS_SIGNATURE")]
    #[case(0x47, "MboxBiosCmdQuerySplFuse")]
    fn known_ids_resolve(#[case] id: u8, #[case] name: &str) {
        let command = lookup_command(id).expect("known command");
        assert_eq!(command.id, id);
        assert_eq!(command.name, name);
    }

    #[rstest]
    #[case(0x00)]
    #[case(0x01)]
    #[case(0x07)]
    #[case(0x23)]
    #[case(0x48)]
    #[case(0xFF)]
    fn unknown_ids_have_no_entry(#[case] id: u8) {
        assert!(lookup_command(id).is_none());
    }
}
