//! Channel mode bookkeeping and modestring parsing.

/// Per-channel mode flags.
///
/// `+k` and `+l` carry no separate bit: the key flag is set exactly when
/// `key` is `Some` and the limit flag exactly when `limit` is `Some`, so a
/// flag can never outlive its parameter.
#[derive(Debug, Clone, Default)]
pub struct ChannelModes {
    /// +i, joining requires an invitation
    pub invite_only: bool,
    /// +t, only operators may change the topic
    pub topic_locked: bool,
    /// +k, join key
    pub key: Option<String>,
    /// +l, member cap
    pub limit: Option<usize>,
}

impl ChannelModes {
    /// Render the flags for RPL_CHANNELMODEIS, e.g. `+tkl`.
    pub fn to_flag_string(&self) -> String {
        let mut flags = String::from("+");
        if self.invite_only {
            flags.push('i');
        }
        if self.topic_locked {
            flags.push('t');
        }
        if self.key.is_some() {
            flags.push('k');
        }
        if self.limit.is_some() {
            flags.push('l');
        }
        flags
    }

    /// Flags plus their parameters, e.g. `+tkl sesame 10`.
    pub fn to_mode_string(&self) -> String {
        let mut out = self.to_flag_string();
        if let Some(key) = &self.key {
            out.push(' ');
            out.push_str(key);
        }
        if let Some(limit) = self.limit {
            out.push(' ');
            out.push_str(&limit.to_string());
        }
        out
    }
}

/// One step of a MODE command: sign, letter, optional parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeChange {
    /// true when setting (+), false when unsetting (-)
    pub setting: bool,
    pub mode: char,
    pub param: Option<String>,
}

/// Split a modestring and its parameter list into individual changes,
/// consuming parameters left to right.
///
/// `k` takes a parameter on set, `l` on set, `o` always. A letter whose
/// parameter is exhausted is emitted with `param: None` and the caller skips
/// it; unknown letters are emitted so the caller can answer ERR_UNKNOWNMODE.
pub fn parse_mode_string(modes: &str, params: &[String]) -> Vec<ModeChange> {
    let mut changes = Vec::new();
    let mut setting = true;
    let mut next_param = 0;

    for ch in modes.chars() {
        match ch {
            '+' => setting = true,
            '-' => setting = false,
            'i' | 't' => changes.push(ModeChange {
                setting,
                mode: ch,
                param: None,
            }),
            'k' | 'l' | 'o' => {
                let wants_param = ch == 'o' || setting;
                let param = if wants_param {
                    let p = params.get(next_param).cloned();
                    if p.is_some() {
                        next_param += 1;
                    }
                    p
                } else {
                    None
                };
                changes.push(ModeChange {
                    setting,
                    mode: ch,
                    param,
                });
            }
            other => changes.push(ModeChange {
                setting,
                mode: other,
                param: None,
            }),
        }
    }

    changes
}

/// Accumulates the changes that actually took effect into the single MODE
/// broadcast a command produces.
#[derive(Debug, Default)]
pub struct ModeDelta {
    flags: String,
    params: Vec<String>,
    sign: Option<bool>,
}

impl ModeDelta {
    pub fn push(&mut self, setting: bool, mode: char, param: Option<&str>) {
        if self.sign != Some(setting) {
            self.flags.push(if setting { '+' } else { '-' });
            self.sign = Some(setting);
        }
        self.flags.push(mode);
        if let Some(param) = param {
            self.params.push(param.to_owned());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Parameters for the MODE broadcast: the signed flag run, then the
    /// consumed parameters in application order.
    pub fn into_params(self) -> Vec<String> {
        let mut out = vec![self.flags];
        out.extend(self.params);
        out
    }
}
