//! Configuration validation

use super::Config;
use crate::protocol::lcp::{MAX_MRU, MIN_MRU};
use crate::telemetry::{LOG_FORMATS, LOG_LEVELS};

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn print_diagnostics(&self) {
        for warning in &self.warnings {
            println!("[WARN] {}", warning);
        }
        for error in &self.errors {
            println!("[ERROR] {}", error);
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate configuration and return warnings/errors
pub fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_link(config, &mut result);
    validate_lcp(config, &mut result);
    validate_ipcp(config, &mut result);
    validate_pap(config, &mut result);
    validate_log(config, &mut result);

    result
}

fn validate_link(config: &Config, result: &mut ValidationResult) {
    if !matches!(config.link.fcs, 16 | 32) {
        result.error(format!(
            "link.fcs: {} is not a supported FCS width (16 or 32)",
            config.link.fcs
        ));
    }
}

/// Restart parameters shared by LCP and IPCP
fn validate_restart(
    section: &str,
    restart_timer_ms: u64,
    max_configure: u8,
    max_terminate: u8,
    max_failure: u8,
    result: &mut ValidationResult,
) {
    if restart_timer_ms == 0 {
        result.error(format!("{}.restart_timer_ms: must be greater than 0", section));
    }
    if max_configure == 0 {
        result.error(format!("{}.max_configure: must be greater than 0", section));
    }
    if max_terminate == 0 {
        result.error(format!("{}.max_terminate: must be greater than 0", section));
    }
    if max_failure == 0 {
        result.warn(format!(
            "{}.max_failure: 0 rejects every unacceptable option without a Nak",
            section
        ));
    }
}

fn validate_lcp(config: &Config, result: &mut ValidationResult) {
    let lcp = &config.lcp;
    validate_restart(
        "lcp",
        lcp.restart_timer_ms,
        lcp.max_configure,
        lcp.max_terminate,
        lcp.max_failure,
        result,
    );

    if !(MIN_MRU..=MAX_MRU).contains(&lcp.mru) {
        result.error(format!(
            "lcp.mru: {} outside {}..={}",
            lcp.mru, MIN_MRU, MAX_MRU
        ));
    }

    if lcp.echo_interval_secs == 0 {
        result.warn("lcp.echo_interval_secs: 0 disables dead peer detection");
    } else if lcp.echo_failures == 0 {
        result.warn("lcp.echo_failures: 0 closes the link after the first unanswered Echo-Request");
    }
}

fn validate_ipcp(config: &Config, result: &mut ValidationResult) {
    let ipcp = &config.ipcp;
    validate_restart(
        "ipcp",
        ipcp.restart_timer_ms,
        ipcp.max_configure,
        ipcp.max_terminate,
        ipcp.max_failure,
        result,
    );

    match ipcp.peer_address {
        None if ipcp.require_peer_address => {
            result.warn(
                "ipcp.require_peer_address: no peer_address to suggest, a peer without an address cannot be configured",
            );
        }
        Some(addr) if addr == ipcp.address => {
            result.error(format!(
                "ipcp.peer_address: {} is the same as the local address",
                addr
            ));
        }
        _ => {}
    }
}

fn validate_pap(config: &Config, result: &mut ValidationResult) {
    let Some(pap) = &config.pap else {
        return;
    };
    if pap.username.len() > u8::MAX as usize {
        result.error("pap.username: longer than 255 bytes");
    }
    if pap.password.len() > u8::MAX as usize {
        result.error("pap.password: longer than 255 bytes");
    }
    if pap.username.is_empty() {
        result.warn("pap.username: empty");
    }
    if pap.retry_timer_ms == 0 {
        result.error("pap.retry_timer_ms: must be greater than 0");
    }
}

fn validate_log(config: &Config, result: &mut ValidationResult) {
    if !LOG_FORMATS.contains(&config.log.format.as_str()) {
        result.error(format!(
            "log.format: unknown format '{}' (expected one of {})",
            config.log.format,
            LOG_FORMATS.join(", ")
        ));
    }
    if !LOG_LEVELS.contains(&config.log.level.to_lowercase().as_str()) {
        result.warn(format!(
            "log.level: unknown level '{}', using info",
            config.log.level
        ));
    }
}
