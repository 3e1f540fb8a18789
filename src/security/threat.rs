//! Threat Detection Module
//!
//! Pattern-based payload scanning (SQL injection, script injection, path
//! traversal), user-agent heuristics, and an append-only threat event
//! ledger with summary reporting.
//!
//! Signature matching is heuristic by nature. High/critical matches gate
//! requests at the gateway; everything else is recorded and surfaced as
//! warnings. The sanitized copy produced here is for logging/analytics
//! only and is never fed back into trusted operations.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Threat severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    /// Severities that short-circuit the request pipeline
    pub fn is_blocking(&self) -> bool {
        matches!(self, ThreatLevel::High | ThreatLevel::Critical)
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThreatLevel::Low => "low",
            ThreatLevel::Medium => "medium",
            ThreatLevel::High => "high",
            ThreatLevel::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Threat event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    SqlInjection,
    Xss,
    PathTraversal,
    RateLimitExceeded,
    SuspiciousPattern,
    UnauthorizedAccess,
    InvalidInput,
}

impl ThreatCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatCategory::SqlInjection => "sql_injection",
            ThreatCategory::Xss => "xss",
            ThreatCategory::PathTraversal => "path_traversal",
            ThreatCategory::RateLimitExceeded => "rate_limit_exceeded",
            ThreatCategory::SuspiciousPattern => "suspicious_pattern",
            ThreatCategory::UnauthorizedAccess => "unauthorized_access",
            ThreatCategory::InvalidInput => "invalid_input",
        }
    }
}

impl fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One signature match inside a payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub category: ThreatCategory,
    /// Dotted path of the offending field (`input.comment`, `items[2]`)
    pub field: String,
    pub severity: ThreatLevel,
}

/// Result of scanning one payload
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// No violations at any severity
    pub valid: bool,
    pub violations: Vec<Violation>,
    /// Best-effort copy with matched signatures stripped; for
    /// logging/analytics only
    pub sanitized: Value,
}

impl ScanReport {
    /// Whether any violation is severe enough to gate the request
    pub fn has_blocking(&self) -> bool {
        self.violations.iter().any(|v| v.severity.is_blocking())
    }

    /// Violations that should ride along as warnings (non-blocking)
    pub fn warnings(&self) -> Vec<Violation> {
        self.violations
            .iter()
            .filter(|v| !v.severity.is_blocking())
            .cloned()
            .collect()
    }
}

/// Append-only record of one detected threat
#[derive(Debug, Clone, Serialize)]
pub struct ThreatEvent {
    pub timestamp: DateTime<Utc>,
    pub category: ThreatCategory,
    pub severity: ThreatLevel,
    /// Opaque source identifier (IP, API key hash, ...)
    pub source: String,
    pub endpoint: String,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Aggregated view of recent threat activity
#[derive(Debug, Clone, Serialize)]
pub struct SecuritySummary {
    pub period_hours: i64,
    pub total_events: usize,
    pub event_types: HashMap<String, usize>,
    pub threat_levels: HashMap<String, usize>,
    pub top_sources: Vec<(String, usize)>,
    pub blocked_requests: usize,
}

/// One compiled signature family
struct SignatureFamily {
    category: ThreatCategory,
    severity: ThreatLevel,
    patterns: Vec<Regex>,
}

/// Threat monitor: compiled signatures + event ledger
pub struct ThreatMonitor {
    families: Vec<SignatureFamily>,
    agent_signatures: Vec<Regex>,
    events: RwLock<Vec<ThreatEvent>>,
}

impl Default for ThreatMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreatMonitor {
    pub fn new() -> Self {
        let compile = |patterns: &[&str]| -> Vec<Regex> {
            patterns
                .iter()
                .map(|p| Regex::new(p).expect("static signature pattern"))
                .collect()
        };

        let families = vec![
            SignatureFamily {
                category: ThreatCategory::SqlInjection,
                severity: ThreatLevel::High,
                patterns: compile(&[
                    r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|EXEC|UNION)\b",
                    r"(--|#|/\*|\*/)",
                    r#"(?i)\b(OR|AND)\s+\d+\s*=\s*\d+"#,
                    r#"(?i)\b(OR|AND)\s+['"][^'"]*['"]"#,
                    r"[;|&]",
                ]),
            },
            SignatureFamily {
                category: ThreatCategory::Xss,
                severity: ThreatLevel::High,
                patterns: compile(&[
                    r"(?is)<script[^>]*>.*?</script>",
                    r"(?i)javascript:",
                    r"(?i)\bon\w+\s*=",
                    r"(?i)<(iframe|object|embed|link|meta)[^>]*>",
                ]),
            },
            SignatureFamily {
                category: ThreatCategory::PathTraversal,
                severity: ThreatLevel::Medium,
                patterns: compile(&[
                    r"\.\./",
                    r"\.\.\\",
                    r"(?i)%2e%2e%2f",
                    r"(?i)%2e%2e/",
                    r"(?i)\.\.%2f",
                    r"(?i)%2e%2e%5c",
                ]),
            },
        ];

        let agent_signatures = compile(&[
            r"(?i)bot",
            r"(?i)crawler",
            r"(?i)spider",
            r"(?i)scraper",
            r"(?i)python-requests",
            r"(?i)curl",
            r"(?i)wget",
            r"(?i)sqlmap",
            r"(?i)nikto",
            r"(?i)nmap",
        ]);

        Self {
            families,
            agent_signatures,
            events: RwLock::new(Vec::new()),
        }
    }

    /// Recursively scan a payload against every signature family.
    ///
    /// Strings are matched directly; maps and sequences are walked with
    /// dotted/indexed field paths. Pure with respect to the ledger.
    pub fn scan_payload(&self, payload: &Value) -> ScanReport {
        let mut violations = Vec::new();
        self.scan_value(payload, "input", &mut violations);
        let sanitized = self.sanitize_value(payload);

        ScanReport {
            valid: violations.is_empty(),
            violations,
            sanitized,
        }
    }

    fn scan_value(&self, value: &Value, path: &str, violations: &mut Vec<Violation>) {
        match value {
            Value::String(s) => {
                for family in &self.families {
                    if family.patterns.iter().any(|p| p.is_match(s)) {
                        violations.push(Violation {
                            category: family.category,
                            field: path.to_string(),
                            severity: family.severity,
                        });
                    }
                }
            }
            Value::Object(map) => {
                for (key, nested) in map {
                    self.scan_value(nested, &format!("{}.{}", path, key), violations);
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.scan_value(item, &format!("{}[{}]", path, i), violations);
                }
            }
            _ => {}
        }
    }

    fn sanitize_value(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => {
                let mut out = s.clone();
                for family in &self.families {
                    for pattern in &family.patterns {
                        out = pattern.replace_all(&out, "").into_owned();
                    }
                }
                Value::String(out.trim().to_string())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.sanitize_value(v)))
                    .collect(),
            ),
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.sanitize_value(v)).collect())
            }
            other => other.clone(),
        }
    }

    /// Heuristic user-agent scoring. Matches are informational: an event
    /// is recorded but the request is never blocked on this signal alone.
    pub fn analyze_user_agent(&self, source: &str, user_agent: &str, endpoint: &str) {
        if user_agent.is_empty() {
            return;
        }

        if self
            .agent_signatures
            .iter()
            .any(|p| p.is_match(user_agent))
        {
            self.record_event(ThreatEvent {
                timestamp: Utc::now(),
                category: ThreatCategory::SuspiciousPattern,
                severity: ThreatLevel::Medium,
                source: source.to_string(),
                endpoint: endpoint.to_string(),
                blocked: false,
                detail: Some(format!("automation user agent: {}", user_agent)),
            });
        }
    }

    /// Append an event to the ledger. Entries are never edited or removed.
    pub fn record_event(&self, event: ThreatEvent) {
        if event.blocked {
            warn!(
                category = event.category.as_str(),
                severity = %event.severity,
                source = %event.source,
                endpoint = %event.endpoint,
                "security threat blocked"
            );
        }
        self.events.write().push(event);
    }

    /// Most recent events, newest last
    pub fn recent_events(&self, limit: usize) -> Vec<ThreatEvent> {
        let events = self.events.read();
        let start = events.len().saturating_sub(limit);
        events[start..].to_vec()
    }

    /// Aggregate events over the trailing window
    pub fn security_summary(&self, hours: i64) -> SecuritySummary {
        let cutoff = Utc::now() - Duration::hours(hours);
        let events = self.events.read();

        let mut event_types: HashMap<String, usize> = HashMap::new();
        let mut threat_levels: HashMap<String, usize> = HashMap::new();
        let mut sources: HashMap<String, usize> = HashMap::new();
        let mut total = 0usize;
        let mut blocked = 0usize;

        for event in events.iter().filter(|e| e.timestamp > cutoff) {
            total += 1;
            *event_types.entry(event.category.as_str().to_string()).or_default() += 1;
            *threat_levels.entry(event.severity.to_string()).or_default() += 1;
            *sources.entry(event.source.clone()).or_default() += 1;
            if event.blocked {
                blocked += 1;
            }
        }

        let mut top_sources: Vec<(String, usize)> = sources.into_iter().collect();
        top_sources.sort_by(|a, b| b.1.cmp(&a.1));
        top_sources.truncate(10);

        SecuritySummary {
            period_hours: hours,
            total_events: total,
            event_types,
            threat_levels,
            top_sources,
            blocked_requests: blocked,
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.read().len()
    }
}
