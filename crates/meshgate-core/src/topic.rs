//! Bus topic layout.
//!
//! Every topic the gateway touches hangs off one effective prefix derived
//! from up to three segments: base / country / region, e.g. `MESHCORE/AU/NSW`.
//! A gateway without a region also listens one and two levels below its
//! prefix so a country-level gateway sees traffic addressed to its regions.

use serde::{Deserialize, Serialize};

/// Base segment used when none is configured.
pub const DEFAULT_BASE_PREFIX: &str = "meshcore";

/// Marker that separates a command path from its suffix.
const COMMANDS_MARKER: &str = "commands";

// ── Segments ──────────────────────────────────────────────────────────────────

/// The configured inputs of the effective prefix.
///
/// `country` is an ISO-3166-1 alpha-2 code, `region` the ISO-3166-2 suffix.
/// Both may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSegments {
    pub base: String,
    pub country: String,
    pub region: String,
}

impl TopicSegments {
    pub fn new(
        base: impl Into<String>,
        country: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            base: base.into(),
            country: country.into(),
            region: region.into(),
        }
    }

    /// Split a legacy combined prefix `base[/country[/region]]`.
    pub fn from_legacy_prefix(prefix: &str) -> Self {
        let mut parts = prefix.splitn(3, '/');
        Self {
            base: parts.next().unwrap_or_default().to_string(),
            country: parts.next().unwrap_or_default().to_string(),
            region: parts.next().unwrap_or_default().to_string(),
        }
    }

    pub fn effective_prefix(&self) -> String {
        derive_prefix(&self.base, &self.country, &self.region)
    }

    /// True when the region segment normalizes to nothing.
    pub fn region_unset(&self) -> bool {
        normalize_segment(&self.region).is_empty()
    }
}

/// Keep `[A-Za-z0-9_-]`, uppercase ASCII letters, drop everything else.
///
/// Spaces are dropped rather than replaced: `"Base Name"` becomes `BASENAME`.
pub fn normalize_segment(segment: &str) -> String {
    segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Join the normalized non-empty segments with `/`.
///
/// A base that normalizes to nothing falls back to [`DEFAULT_BASE_PREFIX`].
pub fn derive_prefix(base: &str, country: &str, region: &str) -> String {
    let mut base = normalize_segment(base);
    if base.is_empty() {
        base = normalize_segment(DEFAULT_BASE_PREFIX);
    }
    [base, normalize_segment(country), normalize_segment(region)]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

// ── Classification ────────────────────────────────────────────────────────────

/// Bus paths mirrored between the radio and the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeKind {
    Raw,
    Messages,
    Status,
    Stats,
    Floods,
    Adverts,
}

impl BridgeKind {
    pub const ALL: [BridgeKind; 6] = [
        BridgeKind::Raw,
        BridgeKind::Messages,
        BridgeKind::Status,
        BridgeKind::Stats,
        BridgeKind::Floods,
        BridgeKind::Adverts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeKind::Raw => "raw",
            BridgeKind::Messages => "messages",
            BridgeKind::Status => "status",
            BridgeKind::Stats => "stats",
            BridgeKind::Floods => "floods",
            BridgeKind::Adverts => "adverts",
        }
    }

    pub fn from_segment(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == segment)
    }
}

/// What an inbound bus topic means to this gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicClass {
    /// Control command; carries everything after `/commands/`.
    Command(String),
    /// Mirror of a bridged path.
    BridgePayload(BridgeKind),
    Ignored,
}

/// Classify an inbound topic against the effective prefix.
///
/// Commands: `{prefix}/commands/<suffix>`, and with `region` unset also
/// `{prefix}/+/commands/<suffix>` and `{prefix}/+/+/commands/<suffix>`.
/// Bridge payloads: `{prefix}/<kind>` with the same optional wildcard levels.
pub fn classify(topic: &str, prefix: &str, region: &str) -> TopicClass {
    let Some(rest) = topic
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix('/'))
    else {
        return TopicClass::Ignored;
    };

    let max_levels = if normalize_segment(region).is_empty() { 2 } else { 0 };
    let segments: Vec<&str> = rest.split('/').collect();

    // Command marker at depth 0, 1 or 2 below the prefix.
    for depth in 0..=max_levels {
        if segments.len() > depth + 1 && segments[depth] == COMMANDS_MARKER {
            return TopicClass::Command(segments[depth + 1..].join("/"));
        }
    }

    if segments.len() <= max_levels + 1 {
        if let Some(kind) = segments.last().and_then(|s| BridgeKind::from_segment(s)) {
            return TopicClass::BridgePayload(kind);
        }
    }

    TopicClass::Ignored
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Owns the derived prefix and builds every topic the gateway publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRouter {
    segments: TopicSegments,
    prefix: String,
}

impl TopicRouter {
    pub fn new(segments: TopicSegments) -> Self {
        let prefix = segments.effective_prefix();
        Self { segments, prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn segments(&self) -> &TopicSegments {
        &self.segments
    }

    /// Replace the segments and recompute the prefix.
    pub fn set_segments(&mut self, segments: TopicSegments) {
        self.prefix = segments.effective_prefix();
        self.segments = segments;
    }

    pub fn classify(&self, topic: &str) -> TopicClass {
        classify(topic, &self.prefix, &self.segments.region)
    }

    pub fn bridge(&self, kind: BridgeKind) -> String {
        format!("{}/{}", self.prefix, kind.as_str())
    }

    pub fn gateway_status(&self, gateway_id: &str) -> String {
        format!("{}/gateway/{}/status", self.prefix, gateway_id)
    }

    pub fn gateway_stats(&self, gateway_id: &str) -> String {
        format!("{}/gateway/{}/stats", self.prefix, gateway_id)
    }

    pub fn gateway_neighbors(&self, gateway_id: &str) -> String {
        format!("{}/gateway/{}/neighbors", self.prefix, gateway_id)
    }

    pub fn node(&self, node_id: u32) -> String {
        format!("{}/nodes/{:08X}", self.prefix, node_id)
    }

    /// Subscription patterns for the enabled inbound surfaces.
    pub fn subscriptions(&self, commands: bool, bridge: bool) -> Vec<String> {
        let levels: &[&str] = if self.segments.region_unset() {
            &["", "+/", "+/+/"]
        } else {
            &[""]
        };

        let mut patterns = Vec::new();
        if commands {
            for level in levels {
                patterns.push(format!("{}/{}commands/#", self.prefix, level));
            }
        }
        if bridge {
            for kind in BridgeKind::ALL {
                for level in levels {
                    patterns.push(format!("{}/{}{}", self.prefix, level, kind.as_str()));
                }
            }
        }
        patterns
    }
}

/// MQTT-style filter match with `+` (one level) and `#` (rest, incl. parent).
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
