use std::collections::BTreeSet;

/// A set of task event type names, e.g. `Restarting` or `Restart Signaled`.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct EventTypeList(BTreeSet<String>);

impl EventTypeList {
    /// Parses a comma-separated list, trimming entries and ignoring empty ones.
    pub fn parse(raw: &str) -> Self {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.0.contains(event_type)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for EventTypeList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct FilterConfig {
    /// Empty means every type not denied is allowed.
    pub allowlist: EventTypeList,
    /// Takes precedence over `allowlist`.
    pub denylist: EventTypeList,
}

impl FilterConfig {
    pub fn permits(&self, event_type: &str) -> bool {
        if self.denylist.contains(event_type) {
            return false;
        }
        self.allowlist.is_empty() || self.allowlist.contains(event_type)
    }
}
