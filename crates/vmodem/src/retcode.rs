/// Result code of an AT command, mirroring the classic Hayes response set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetCode {
    /// Command executed successfully.
    Ok,
    /// Command failed or was malformed.
    Error,
    /// The command already produced its own output; emit nothing.
    Silent,
    /// A connection has been established.
    Connect,
    /// The call went down or could not be placed.
    NoCarrier,
    /// No dial tone detected.
    NoDialtone,
    /// The remote end is busy.
    Busy,
    /// The remote end did not answer.
    NoAnswer,
    /// An incoming call is ringing.
    Ring,
    /// Hook declined the command; fall through to the built-in handler.
    Skip,
    /// Unrecognized textual result code.
    Unknown,
}

impl RetCode {
    /// Parses the verbose form of a result code, case-insensitively.
    ///
    /// `"SILENT"` and `"SKIP"` are recognized alongside the on-wire strings;
    /// anything else yields [`RetCode::Unknown`].
    pub fn from_verbose(s: &str) -> RetCode {
        match s.to_ascii_uppercase().as_str() {
            "OK" => RetCode::Ok,
            "ERROR" => RetCode::Error,
            "CONNECT" => RetCode::Connect,
            "NO CARRIER" => RetCode::NoCarrier,
            "NO DIALTONE" => RetCode::NoDialtone,
            "BUSY" => RetCode::Busy,
            "NO ANSWER" => RetCode::NoAnswer,
            "RING" => RetCode::Ring,
            "SILENT" => RetCode::Silent,
            "SKIP" => RetCode::Skip,
            _ => RetCode::Unknown,
        }
    }

    /// Numeric short-form code, or `None` for codes that emit nothing.
    pub(crate) fn short_code(self) -> Option<&'static str> {
        match self {
            RetCode::Silent | RetCode::Skip => None,
            RetCode::Ok => Some("0"),
            RetCode::Connect => Some("1"),
            RetCode::Ring => Some("2"),
            RetCode::NoCarrier => Some("3"),
            RetCode::Error => Some("4"),
            RetCode::NoDialtone => Some("6"),
            RetCode::Busy => Some("7"),
            RetCode::NoAnswer => Some("8"),
            RetCode::Unknown => Some(""),
        }
    }

    /// Verbose string, or `None` for codes that emit nothing.
    ///
    /// `Connect` is rendered by the caller, which substitutes the configured
    /// connect banner.
    pub(crate) fn verbose(self) -> Option<&'static str> {
        match self {
            RetCode::Silent | RetCode::Skip => None,
            RetCode::Ok => Some("OK"),
            RetCode::Error => Some("ERROR"),
            RetCode::Connect => Some("CONNECT"),
            RetCode::NoCarrier => Some("NO CARRIER"),
            RetCode::NoDialtone => Some("NO DIALTONE"),
            RetCode::Busy => Some("BUSY"),
            RetCode::NoAnswer => Some("NO ANSWER"),
            RetCode::Ring => Some("RING"),
            RetCode::Unknown => Some(""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_verbose_canonical_strings() {
        assert_eq!(RetCode::from_verbose("OK"), RetCode::Ok);
        assert_eq!(RetCode::from_verbose("ERROR"), RetCode::Error);
        assert_eq!(RetCode::from_verbose("CONNECT"), RetCode::Connect);
        assert_eq!(RetCode::from_verbose("NO CARRIER"), RetCode::NoCarrier);
        assert_eq!(RetCode::from_verbose("NO DIALTONE"), RetCode::NoDialtone);
        assert_eq!(RetCode::from_verbose("BUSY"), RetCode::Busy);
        assert_eq!(RetCode::from_verbose("NO ANSWER"), RetCode::NoAnswer);
        assert_eq!(RetCode::from_verbose("RING"), RetCode::Ring);
        assert_eq!(RetCode::from_verbose("SILENT"), RetCode::Silent);
        assert_eq!(RetCode::from_verbose("SKIP"), RetCode::Skip);
    }

    #[test]
    fn from_verbose_is_case_insensitive() {
        assert_eq!(RetCode::from_verbose("ok"), RetCode::Ok);
        assert_eq!(RetCode::from_verbose("No Carrier"), RetCode::NoCarrier);
        assert_eq!(RetCode::from_verbose("busy"), RetCode::Busy);
    }

    #[test]
    fn from_verbose_unknown() {
        assert_eq!(RetCode::from_verbose(""), RetCode::Unknown);
        assert_eq!(RetCode::from_verbose("CONNECT 9600"), RetCode::Unknown);
        assert_eq!(RetCode::from_verbose("NOPE"), RetCode::Unknown);
    }

    #[test]
    fn short_codes_match_hayes_numbering() {
        assert_eq!(RetCode::Ok.short_code(), Some("0"));
        assert_eq!(RetCode::Connect.short_code(), Some("1"));
        assert_eq!(RetCode::Ring.short_code(), Some("2"));
        assert_eq!(RetCode::NoCarrier.short_code(), Some("3"));
        assert_eq!(RetCode::Error.short_code(), Some("4"));
        assert_eq!(RetCode::NoDialtone.short_code(), Some("6"));
        assert_eq!(RetCode::Busy.short_code(), Some("7"));
        assert_eq!(RetCode::NoAnswer.short_code(), Some("8"));
        assert_eq!(RetCode::Silent.short_code(), None);
        assert_eq!(RetCode::Skip.short_code(), None);
    }
}
