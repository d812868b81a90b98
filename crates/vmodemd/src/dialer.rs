//! Phone-number translation and the TCP dialer.
//!
//! Dialed "numbers" are mapped to `host:port` targets through an ordered rule
//! list, first match wins. The built-in rules cover the classic star-encoded
//! IPv4 forms (`*192*168*1*10*2323`) and plain dotted addresses; `-T` appends
//! user rules behind the built-ins.

use async_trait::async_trait;
use regex::Regex;
use tokio::net::TcpStream;
use vmodem::{BoxedStream, Modem, ModemError, OutgoingCall};

use crate::Res;

/// Star-encoded IPv4 with an explicit port, star-encoded without, dotted with
/// a port, dotted without.
const BUILTIN_RULES: [(&str, &str); 4] = [
    (r"\*(\d{1,3})\*(\d{1,3})\*(\d{1,3})\*(\d{1,3})\*(\d{1,5})", "$1.$2.$3.$4:$5"),
    (r"\*(\d{1,3})\*(\d{1,3})\*(\d{1,3})\*(\d{1,3})", "$1.$2.$3.$4"),
    (r"(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3}):(\d{1,5})", "$1.$2.$3.$4:$5"),
    (r"(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})", "$1.$2.$3.$4"),
];

/// Ordered number-to-host rule list.
pub struct NumberTranslator {
    rules: Vec<(Regex, String)>,
    default_port: u16,
}

impl NumberTranslator {
    /// Builds the rule list: built-ins first, then each `-T regex->format`
    /// spec. Formats refer to capture groups as `$1`, `$2`, ...
    pub fn new(user_rules: &[String], default_port: u16) -> Res<Self> {
        let mut rules = Vec::new();
        for (pattern, format) in BUILTIN_RULES {
            rules.push((Regex::new(pattern)?, format.to_string()));
        }
        for spec in user_rules {
            let parts: Vec<&str> = spec.split("->").collect();
            let [pattern, format] = parts[..] else {
                return Err(format!("invalid translation {spec:?}, expected regex->format").into());
            };
            rules.push((Regex::new(pattern)?, format.to_string()));
        }
        Ok(Self {
            rules,
            default_port,
        })
    }

    /// Maps a dialed number to a connect target, appending the default port
    /// when the matched format did not produce one.
    pub fn translate(&self, number: &str) -> Option<String> {
        for (pattern, format) in &self.rules {
            let Some(caps) = pattern.captures(number) else {
                continue;
            };
            let mut host = String::new();
            caps.expand(format, &mut host);
            if host.is_empty() {
                continue;
            }
            if !host.contains(':') {
                host = format!("{host}:{}", self.default_port);
            }
            return Some(host);
        }
        None
    }
}

/// [`OutgoingCall`] implementation that resolves numbers through a
/// [`NumberTranslator`] and places the call over TCP.
pub struct TcpDialer {
    translator: NumberTranslator,
}

impl TcpDialer {
    pub fn new(translator: NumberTranslator) -> Self {
        Self { translator }
    }
}

#[async_trait]
impl OutgoingCall for TcpDialer {
    async fn dial(&self, modem: &Modem, number: &str) -> Result<BoxedStream, ModemError> {
        let Some(host) = self.translator.translate(number) else {
            log::info!("{}: no host for number {number:?}", modem.id());
            return Err(ModemError::NoCarrier);
        };
        log::info!("{}: dialing {number} -> {host}", modem.id());
        match TcpStream::connect(&host).await {
            Ok(stream) => Ok(Box::new(stream)),
            Err(err) => {
                log::info!("{}: connect to {host} failed: {err}", modem.id());
                Err(ModemError::NoCarrier)
            }
        }
    }
}
