//! AT command line tokenizer.
//!
//! A command line is the text between the `AT` prefix and the terminating CR
//! (the prefix itself never reaches this module). The tokenizer yields one
//! atomic command at a time so the dispatcher can stop at the first failing
//! atom, the way real modems abort the rest of a chained line.

/// One atomic command split out of an AT command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtCommand {
    /// Command characters, uppercased. A short command is one letter with an
    /// optional `&`/`%` prefix; an extended command starts with `+` or `#`.
    pub command: String,
    /// Trailing digit string of a short command (`"1"` in `E1`). Empty means
    /// an implicit zero.
    pub number: String,
    /// `=` was present.
    pub assign: bool,
    /// `?` was present.
    pub query: bool,
    /// Assignment payload. Digits only for short commands; arbitrary text for
    /// extended commands and for `D`, where it carries the dial string.
    pub value: String,
    /// Extended-form command (`+`/`#` prefix or `D`). These consume the rest
    /// of the line and never chain.
    pub long: bool,
}

/// Raised on a malformed command line; the dispatcher reports it as `ERROR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SyntaxError;

/// Splits a command line into [`AtCommand`] atoms.
pub(crate) struct Tokenizer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    pub(crate) fn new(line: &'a str) -> Self {
        Self {
            bytes: line.as_bytes(),
            pos: 0,
        }
    }

    fn next_byte(&mut self) -> Option<u8> {
        let b = self.bytes.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn unread(&mut self) {
        self.pos -= 1;
    }

    /// Returns the next atomic command, `None` at end of line, or a syntax
    /// error. Atoms already consumed stay consumed: chained commands before a
    /// malformed one have been dispatched by the time the error shows up.
    pub(crate) fn next_command(&mut self) -> Result<Option<AtCommand>, SyntaxError> {
        if self.pos >= self.bytes.len() {
            return Ok(None);
        }
        let mut cmd = AtCommand::default();

        while let Some(b) = self.next_byte() {
            if b == b'?' {
                if cmd.command.is_empty() {
                    return Err(SyntaxError);
                }
                cmd.query = true;
                break;
            }

            if cmd.assign {
                // Short-command assignments only take digits; anything else
                // starts the next chained atom.
                if !cmd.long && !b.is_ascii_digit() {
                    self.unread();
                    break;
                }
                cmd.value.push(b as char);
                continue;
            }

            if b == b'+' || b == b'#' {
                if !cmd.command.is_empty() {
                    return Err(SyntaxError);
                }
                cmd.long = true;
                cmd.command.push(b as char);
                continue;
            }

            if b == b'=' {
                if cmd.command.is_empty() {
                    return Err(SyntaxError);
                }
                cmd.assign = true;
                continue;
            }

            if cmd.long {
                if b.is_ascii_alphabetic() {
                    cmd.command.push(b as char);
                    continue;
                }
                return Err(SyntaxError);
            }

            if cmd.command.is_empty() || cmd.command == "&" || cmd.command == "%" {
                if (b == b'&' || b == b'%') && cmd.command.is_empty() && self.pos < self.bytes.len() {
                    cmd.command.push(b as char);
                    continue;
                }
                if b.is_ascii_alphabetic() {
                    cmd.command.push(b as char);
                    if cmd.command.eq_ignore_ascii_case("d") {
                        // Dial consumes the rest of the line as its payload.
                        cmd.long = true;
                        cmd.assign = true;
                    }
                } else {
                    return Err(SyntaxError);
                }
            } else if b.is_ascii_digit() {
                cmd.number.push(b as char);
            } else {
                self.unread();
                break;
            }
        }

        cmd.command.make_ascii_uppercase();
        Ok(Some(cmd))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all(line: &str) -> Result<Vec<AtCommand>, SyntaxError> {
        let mut tok = Tokenizer::new(line);
        let mut out = Vec::new();
        while let Some(cmd) = tok.next_command()? {
            out.push(cmd);
        }
        Ok(out)
    }

    #[test]
    fn empty_line_yields_nothing() {
        assert_eq!(all("").unwrap(), vec![]);
    }

    #[test]
    fn single_short_command() {
        let cmds = all("E1").unwrap();
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].command, "E");
        assert_eq!(cmds[0].number, "1");
        assert!(!cmds[0].assign && !cmds[0].query && !cmds[0].long);
    }

    #[test]
    fn lowercase_command_is_uppercased() {
        let cmds = all("e0v1").unwrap();
        assert_eq!(cmds[0].command, "E");
        assert_eq!(cmds[1].command, "V");
    }

    #[test]
    fn chained_short_commands() {
        let cmds = all("E0V1Q0").unwrap();
        let names: Vec<_> = cmds.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(names, ["E", "V", "Q"]);
        let nums: Vec<_> = cmds.iter().map(|c| c.number.as_str()).collect();
        assert_eq!(nums, ["0", "1", "0"]);
    }

    #[test]
    fn sregister_assignment() {
        let cmds = all("S0=5").unwrap();
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].command, "S");
        assert_eq!(cmds[0].number, "0");
        assert!(cmds[0].assign);
        assert_eq!(cmds[0].value, "5");
    }

    #[test]
    fn sregister_query() {
        let cmds = all("S12?").unwrap();
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].command, "S");
        assert_eq!(cmds[0].number, "12");
        assert!(cmds[0].query);
    }

    #[test]
    fn assignment_chains_after_non_digit() {
        let cmds = all("S0=5E1").unwrap();
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].value, "5");
        assert_eq!(cmds[1].command, "E");
    }

    #[test]
    fn ampersand_prefix_command() {
        let cmds = all("&F").unwrap();
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].command, "&F");
    }

    #[test]
    fn percent_prefix_command() {
        let cmds = all("%C0").unwrap();
        assert_eq!(cmds[0].command, "%C");
        assert_eq!(cmds[0].number, "0");
    }

    #[test]
    fn trailing_ampersand_is_an_error() {
        assert_eq!(all("&"), Err(SyntaxError));
    }

    #[test]
    fn ampersand_followed_by_digit_is_an_error() {
        assert_eq!(all("&1"), Err(SyntaxError));
    }

    #[test]
    fn dial_consumes_rest_of_line() {
        let cmds = all("DT555 1234E0").unwrap();
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].command, "D");
        assert!(cmds[0].long && cmds[0].assign);
        assert_eq!(cmds[0].value, "T555 1234E0");
    }

    #[test]
    fn dial_preserves_payload_case() {
        let cmds = all("dtbbs.example.com:23").unwrap();
        assert_eq!(cmds[0].command, "D");
        assert_eq!(cmds[0].value, "tbbs.example.com:23");
    }

    #[test]
    fn extended_command_with_value() {
        let cmds = all("+GMI=vendor 1.0").unwrap();
        assert_eq!(cmds.len(), 1);
        assert_eq!(cmds[0].command, "+GMI");
        assert!(cmds[0].long && cmds[0].assign);
        assert_eq!(cmds[0].value, "vendor 1.0");
    }

    #[test]
    fn extended_commands_do_not_chain() {
        // Everything after the '1' is swallowed into the error because a
        // digit cannot appear in an extended command name.
        assert_eq!(all("#X1E0"), Err(SyntaxError));
    }

    #[test]
    fn plus_after_letters_is_an_error() {
        assert_eq!(all("E+"), Err(SyntaxError));
    }

    #[test]
    fn bare_query_is_an_error() {
        assert_eq!(all("?"), Err(SyntaxError));
    }

    #[test]
    fn bare_equals_is_an_error() {
        assert_eq!(all("=1"), Err(SyntaxError));
    }

    #[test]
    fn query_terminates_atom_and_chains() {
        let cmds = all("S0?E1").unwrap();
        assert_eq!(cmds.len(), 2);
        assert!(cmds[0].query);
        assert_eq!(cmds[1].command, "E");
    }

    #[test]
    fn implicit_number_is_empty() {
        let cmds = all("H").unwrap();
        assert_eq!(cmds[0].command, "H");
        assert_eq!(cmds[0].number, "");
    }
}
