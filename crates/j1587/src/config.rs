use j1587_frame::Mid;

/// Driver configuration, per spec §4.7.
///
/// Built with the `with_*` setters; construct via [`DriverConfig::new`] with
/// the local MID and layer in whichever options apply.
#[derive(Clone, Copy, Debug)]
pub struct DriverConfig {
    pub my_mid: Mid,
    pub suppress_fragments: bool,
    pub preempt_cts: bool,
    pub silent: bool,
    pub reassemble_others: bool,
    pub pass_invalid_messages: bool,
    pub loopback: bool,
    /// Gates the extended-page PID conformance bug kept byte-for-byte from
    /// the original source, per spec §9's Open Question. Defaults to `true`
    /// (the conformance-bug-compatible behavior); set `false` to opt out
    /// once a corrected extended-page PID encoding is agreed on upstream.
    pub request_pid_extended_page_compat: bool,
}

impl DriverConfig {
    #[must_use]
    pub fn new(my_mid: Mid) -> Self {
        Self {
            my_mid,
            suppress_fragments: true,
            preempt_cts: false,
            silent: false,
            reassemble_others: false,
            pass_invalid_messages: false,
            loopback: false,
            request_pid_extended_page_compat: true,
        }
    }

    #[must_use]
    pub fn with_suppress_fragments(mut self, value: bool) -> Self {
        self.suppress_fragments = value;
        self
    }

    #[must_use]
    pub fn with_preempt_cts(mut self, value: bool) -> Self {
        self.preempt_cts = value;
        self
    }

    #[must_use]
    pub fn with_silent(mut self, value: bool) -> Self {
        self.silent = value;
        self
    }

    #[must_use]
    pub fn with_reassemble_others(mut self, value: bool) -> Self {
        self.reassemble_others = value;
        self
    }

    #[must_use]
    pub fn with_pass_invalid_messages(mut self, value: bool) -> Self {
        self.pass_invalid_messages = value;
        self
    }

    #[must_use]
    pub fn with_loopback(mut self, value: bool) -> Self {
        self.loopback = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults_match_spec_4_7() {
        let config = DriverConfig::new(0xac);
        assert!(config.suppress_fragments);
        assert!(!config.preempt_cts);
        assert!(!config.silent);
        assert!(!config.reassemble_others);
        assert!(!config.pass_invalid_messages);
        assert!(!config.loopback);
        assert_eq!(config.my_mid, 0xac);
    }

    #[test]
    fn test_builder_chain() {
        let config = DriverConfig::new(0x80)
            .with_silent(true)
            .with_reassemble_others(true);
        assert!(config.silent);
        assert!(config.reassemble_others);
        assert!(config.suppress_fragments);
    }
}
