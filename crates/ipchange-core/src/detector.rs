//! Change detection
//!
//! Addresses are compared as exact strings with no normalization. Both
//! sides have already been trimmed and parsed as IPv4 by
//! [`IpState`](crate::IpState), which rejects non-canonical forms such as
//! leading zeros.

/// What the pipeline should do with a discovered IP
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Run the pipeline
    Proceed,
    /// Nothing changed and the update is not forced
    Skip,
}

/// Decide whether to run the pipeline
///
/// Returns [`Decision::Skip`] only when `force_update` is false and
/// `new_ip` equals `old_ip`.
pub fn detect(old_ip: Option<&str>, new_ip: &str, force_update: bool) -> Decision {
    if !force_update && old_ip == Some(new_ip) {
        Decision::Skip
    } else {
        Decision::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_ip_is_skipped() {
        assert_eq!(detect(Some("10.0.0.1"), "10.0.0.1", false), Decision::Skip);
    }

    #[test]
    fn force_always_proceeds() {
        assert_eq!(detect(Some("10.0.0.1"), "10.0.0.1", true), Decision::Proceed);
        assert_eq!(detect(None, "10.0.0.1", true), Decision::Proceed);
    }

    #[test]
    fn first_run_and_changes_proceed() {
        assert_eq!(detect(None, "10.0.0.1", false), Decision::Proceed);
        assert_eq!(detect(Some("10.0.0.1"), "10.0.0.2", false), Decision::Proceed);
    }

    #[test]
    fn comparison_is_literal() {
        assert_eq!(detect(Some("10.0.0.01"), "10.0.0.1", false), Decision::Proceed);
    }
}
