//! Regex-driven custom AT commands.
//!
//! Each `-C regex->output->result` flag becomes one rule. The regex is
//! matched against the canonical text of the atomic command
//! (`<CHAR><NUM>[=][?]<VALUE>`); on a hit the optional output is printed to
//! the terminal and the named result code is returned instead of running the
//! built-in handler.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use vmodem::{AtCommand, CommandHook, ModemLock, RetCode};

use crate::Res;

struct CommandRule {
    pattern: Regex,
    output: String,
    result: RetCode,
}

/// [`CommandHook`] that answers commands from a rule list and skips the rest.
pub struct RuleHook {
    rules: Vec<CommandRule>,
}

impl RuleHook {
    /// Parses the `-C` specs. Returns `None` when there are no rules so the
    /// modem can go without a hook entirely.
    pub fn parse(specs: &[String]) -> Res<Option<Arc<RuleHook>>> {
        if specs.is_empty() {
            return Ok(None);
        }
        let mut rules = Vec::new();
        for spec in specs {
            let parts: Vec<&str> = spec.split("->").collect();
            let [pattern, output, result] = parts[..] else {
                return Err(
                    format!("invalid command rule {spec:?}, expected regex->output->result").into(),
                );
            };
            let result = RetCode::from_verbose(result);
            if result == RetCode::Unknown {
                return Err(format!("unknown result code in command rule {spec:?}").into());
            }
            rules.push(CommandRule {
                pattern: Regex::new(pattern)?,
                output: output.to_string(),
                result,
            });
        }
        Ok(Some(Arc::new(RuleHook { rules })))
    }
}

/// Canonical text form of an atomic command, as the rules see it.
fn canonical(cmd: &AtCommand) -> String {
    let mut text = format!("{}{}", cmd.command, cmd.number);
    if cmd.assign {
        text.push('=');
    }
    if cmd.query {
        text.push('?');
    }
    text.push_str(&cmd.value);
    text
}

#[async_trait]
impl CommandHook for RuleHook {
    async fn on_command(&self, modem: &mut ModemLock<'_>, cmd: &AtCommand) -> RetCode {
        let text = canonical(cmd);
        for rule in &self.rules {
            if rule.pattern.is_match(&text) {
                log::debug!("{}: command {text:?} matched rule {}", modem.id(), rule.pattern);
                if !rule.output.is_empty() {
                    modem.tty_write_str(&format!("\r\n{}\r\n", rule.output)).await;
                }
                return rule.result;
            }
        }
        RetCode::Skip
    }
}
