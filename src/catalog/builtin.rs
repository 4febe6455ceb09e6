use super::ErrorCode;

/// Manufacturer fault codes the platform ships with. Admin tooling extends
/// the table at runtime; these cover the protocol stacks the integration
/// layer speaks out of the box.
pub fn builtin_error_codes() -> Vec<ErrorCode> {
    vec![
        ErrorCode {
            code: "S7-001".to_string(),
            manufacturer: "Siemens".to_string(),
            description: "PLC session rejected: connection resource limit reached".to_string(),
            plain_english: "The meter's controller refused a new connection because too many \
                            clients are already attached."
                .to_string(),
            support_url: Some("https://support.industry.siemens.com/cs/document/26096214".to_string()),
            is_active: true,
        },
        ErrorCode {
            code: "S7-006".to_string(),
            manufacturer: "Siemens".to_string(),
            description: "PDU size negotiation failed during session setup".to_string(),
            plain_english: "The monitoring gateway and the controller could not agree on a \
                            message size; the session never opened."
                .to_string(),
            support_url: Some("https://support.industry.siemens.com/cs/document/26096214".to_string()),
            is_active: true,
        },
        ErrorCode {
            code: "MB-02".to_string(),
            manufacturer: "Modbus".to_string(),
            description: "Illegal data address: polled register not mapped on device".to_string(),
            plain_english: "The device does not expose the measurement channel being polled. \
                            The channel map likely changed after a firmware update."
                .to_string(),
            support_url: Some("https://modbus.org/docs/PI_MBUS_300.pdf".to_string()),
            is_active: true,
        },
        ErrorCode {
            code: "MB-0B".to_string(),
            manufacturer: "Modbus".to_string(),
            description: "Gateway target device failed to respond".to_string(),
            plain_english: "The gateway is reachable but the meter behind it is silent. Check \
                            the meter's power and wiring."
                .to_string(),
            support_url: Some("https://modbus.org/docs/PI_MBUS_300.pdf".to_string()),
            is_active: true,
        },
        ErrorCode {
            code: "EV-100".to_string(),
            manufacturer: "Emporia".to_string(),
            description: "Vue cloud session token expired or revoked".to_string(),
            plain_english: "The link to the Emporia cloud needs to be re-authorized from the \
                            account settings page."
                .to_string(),
            support_url: Some("https://help.emporiaenergy.com".to_string()),
            is_active: true,
        },
        ErrorCode {
            code: "EV-210".to_string(),
            manufacturer: "Emporia".to_string(),
            description: "Vue reporting gap: device offline past upload deadline".to_string(),
            plain_english: "The Vue monitor has not uploaded readings recently. It is usually a \
                            WiFi drop at the panel; power-cycling the monitor reconnects it."
                .to_string(),
            support_url: Some("https://help.emporiaenergy.com".to_string()),
            is_active: true,
        },
        // Superseded by EV-210 in newer firmware; kept for historical
        // diagnoses.
        ErrorCode {
            code: "EV-200".to_string(),
            manufacturer: "Emporia".to_string(),
            description: "Vue reporting gap (legacy firmware)".to_string(),
            plain_english: "The Vue monitor stopped reporting. Applies to firmware before 1.4."
                .to_string(),
            support_url: Some("https://help.emporiaenergy.com".to_string()),
            is_active: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_codes_are_unique() {
        let codes = builtin_error_codes();
        for (i, a) in codes.iter().enumerate() {
            for b in codes.iter().skip(i + 1) {
                assert!(
                    !(a.code == b.code && a.manufacturer == b.manufacturer),
                    "duplicate builtin code {} / {}",
                    a.code,
                    a.manufacturer
                );
            }
        }
    }

    #[test]
    fn test_builtin_codes_have_explanations() {
        for entry in builtin_error_codes() {
            assert!(!entry.plain_english.is_empty());
            assert!(!entry.description.is_empty());
        }
    }

    #[test]
    fn test_legacy_code_is_inactive() {
        let codes = builtin_error_codes();
        let legacy = codes
            .iter()
            .find(|c| c.code == "EV-200")
            .expect("legacy code present");
        assert!(!legacy.is_active);
    }
}
