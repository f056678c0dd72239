//! File-stem sanitizing for log names

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
///
/// Log names such as `Microsoft-Windows-PowerShell/Operational` contain path
/// separators and spaces; the result is always safe as a single file stem.
pub fn sanitize_log_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_plain_names_unchanged() {
        assert_eq!(sanitize_log_name("Application"), "Application");
        assert_eq!(sanitize_log_name("Setup"), "Setup");
        assert_eq!(sanitize_log_name("a.b_c-d"), "a.b_c-d");
    }

    #[test]
    fn test_sanitize_channel_path() {
        assert_eq!(
            sanitize_log_name("Microsoft-Windows-PowerShell/Operational"),
            "Microsoft-Windows-PowerShell_Operational"
        );
        assert_eq!(sanitize_log_name("Windows PowerShell"), "Windows_PowerShell");
        assert_eq!(sanitize_log_name(r"..\..\evil"), ".._.._evil");
    }

    #[test]
    fn test_sanitize_non_ascii() {
        // 1文字につき1つの '_'
        assert_eq!(sanitize_log_name("Журнал"), "______");
        assert_eq!(sanitize_log_name(""), "");
    }

    proptest! {
        #[test]
        fn prop_output_is_filesystem_safe(input in ".*") {
            let out = sanitize_log_name(&input);
            prop_assert!(out
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')));
            prop_assert_eq!(out.chars().count(), input.chars().count());
        }

        #[test]
        fn prop_sanitize_is_idempotent(input in ".*") {
            let once = sanitize_log_name(&input);
            prop_assert_eq!(sanitize_log_name(&once), once);
        }

        #[test]
        fn prop_clean_input_unchanged(input in "[A-Za-z0-9._-]{0,40}") {
            prop_assert_eq!(sanitize_log_name(&input), input);
        }
    }
}
