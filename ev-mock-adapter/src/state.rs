//! Per-connection ELM327 AT-command state, mirroring the handful of
//! settings the adapter driver actually toggles: echo, line feeds,
//! response spacing, headers, and the header/filter/flow-control ids the
//! driver programs via `ATSH`/`ATCRA`/`ATFCSH` before each request.

/// Simulated firmware identity. `Legacy` reproduces the v1.5
/// trailing-zero-stripping quirk so the adapter driver's quirk detection
/// can be exercised end-to-end against this mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Firmware {
    Current,
    Legacy,
}

impl Firmware {
    fn banner(self) -> &'static str {
        match self {
            Firmware::Current => "ELM327 v2.1",
            Firmware::Legacy => "ELM327 v1.5",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdapterState {
    pub echo_enabled: bool,
    pub linefeeds_enabled: bool,
    pub spaces_enabled: bool,
    pub headers_enabled: bool,
    /// Set by `ATSH`: the id the client claims requests are sent from.
    pub req_id: Option<u32>,
    /// Set by `ATCRA`: the id the client wants responses filtered to —
    /// also the id we stamp our own transmitted frames with.
    pub rsp_id: Option<u32>,
    firmware: Firmware,
}

impl AdapterState {
    #[must_use]
    pub fn new(firmware: Firmware) -> Self {
        Self {
            echo_enabled: true,
            linefeeds_enabled: true,
            spaces_enabled: true,
            headers_enabled: false,
            req_id: None,
            rsp_id: None,
            firmware,
        }
    }

    pub fn line_ending(&self) -> &'static str {
        if self.linefeeds_enabled {
            "\r\n"
        } else {
            "\r"
        }
    }

    /// Format a compact hex response, inserting byte-pair spaces and the
    /// stamped header when the corresponding settings are on.
    pub fn format_frame(&self, data: &[u8]) -> String {
        let hex = hex::encode_upper(data);
        let body = if self.spaces_enabled {
            hex.as_bytes()
                .chunks(2)
                .map(|c| std::str::from_utf8(c).unwrap())
                .collect::<Vec<_>>()
                .join(" ")
        } else {
            hex
        };
        match (self.headers_enabled, self.rsp_id) {
            (true, Some(id)) if self.spaces_enabled => format!("{id:03X} {body}"),
            (true, Some(id)) => format!("{id:03X}{body}"),
            _ => body,
        }
    }

    /// Handle one AT command, returning its response text (without line
    /// endings or prompt — the caller adds those).
    pub fn handle_at_command(&mut self, cmd: &str) -> String {
        match cmd {
            "ATZ" => {
                let firmware = self.firmware;
                *self = Self::new(firmware);
                return firmware.banner().to_string();
            }
            "ATE0" => self.echo_enabled = false,
            "ATE1" => self.echo_enabled = true,
            "ATL0" => self.linefeeds_enabled = false,
            "ATL1" => self.linefeeds_enabled = true,
            "ATS0" => self.spaces_enabled = false,
            "ATS1" => self.spaces_enabled = true,
            "ATH0" => self.headers_enabled = false,
            "ATH1" => self.headers_enabled = true,
            "ATI" => return self.firmware.banner().to_string(),
            c if c.starts_with("ATSH") => {
                if let Ok(id) = u32::from_str_radix(&c[4..], 16) {
                    self.req_id = Some(id);
                }
            }
            c if c.starts_with("ATCRA") => {
                if let Ok(id) = u32::from_str_radix(&c[5..], 16) {
                    self.rsp_id = Some(id);
                }
            }
            // Accepted but have no observable effect on this simulator:
            // flow-control parameters, the monitor/protocol/timeout
            // knobs, and the CAN-auto-format toggle the driver always
            // disables up front.
            c if c.starts_with("ATFCSH")
                || c.starts_with("ATFCSD")
                || c.starts_with("ATFCSM")
                || c.starts_with("ATCP")
                || c.starts_with("ATTP")
                || c.starts_with("ATSP")
                || c.starts_with("ATST")
                || c.starts_with("ATCAF")
                || c.starts_with("ATCFC")
                || c == "ATM0" =>
            {
                return "OK".to_string();
            }
            _ => return "?".to_string(),
        }
        "OK".to_string()
    }
}
