use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// Performance data reported on the terminal frame.
///
/// Every field is optional: absence means "not reported", never zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_per_second: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_first_token_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_response_time_ms: Option<f64>,
}

impl ResponseMetrics {
    pub fn is_empty(&self) -> bool {
        self.model.is_none()
            && self.tokens_per_second.is_none()
            && self.time_to_first_token_ms.is_none()
            && self.total_response_time_ms.is_none()
    }

    /// Human-readable side annotation listing only the reported values.
    pub fn annotation(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        if let Some(model) = &self.model {
            parts.push(model.clone());
        }
        if let Some(rate) = self.tokens_per_second {
            parts.push(format!("{rate:.1} tok/s"));
        }
        if let Some(ttft) = self.time_to_first_token_ms {
            parts.push(format!("first token {ttft:.0} ms"));
        }
        if let Some(total) = self.total_response_time_ms {
            let mut part = String::from("total ");
            if total >= 1000.0 {
                let _ = write!(part, "{:.2} s", total / 1000.0);
            } else {
                let _ = write!(part, "{total:.0} ms");
            }
            parts.push(part);
        }

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" · "))
        }
    }
}

/// Terminal frame contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub final_text: Option<String>,
    pub html_final_text: Option<String>,
    pub conversation_id: Option<String>,
    #[serde(flatten)]
    pub metrics: ResponseMetrics,
}

/// Typed interpretation of one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental chunk of assistant output.
    ContentDelta {
        text: String,
        conversation_id: Option<String>,
    },
    /// Terminal frame; at most one is honored per session.
    Completion(Completion),
    /// Payload that could not be classified. Never fatal.
    Malformed { raw: String },
}

impl StreamEvent {
    pub fn delta(text: impl Into<String>) -> Self {
        Self::ContentDelta {
            text: text.into(),
            conversation_id: None,
        }
    }

    pub fn malformed(raw: impl Into<String>) -> Self {
        Self::Malformed { raw: raw.into() }
    }

    /// Conversation identifier carried by this frame, if any.
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            Self::ContentDelta {
                conversation_id, ..
            } => conversation_id.as_deref(),
            Self::Completion(completion) => completion.conversation_id.as_deref(),
            Self::Malformed { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completion(_))
    }
}

#[cfg(test)]
mod tests {
    use super::{Completion, ResponseMetrics, StreamEvent};

    #[test]
    fn annotation_skips_unreported_metrics() {
        let metrics = ResponseMetrics {
            tokens_per_second: Some(12.34),
            ..ResponseMetrics::default()
        };
        assert_eq!(metrics.annotation().as_deref(), Some("12.3 tok/s"));
    }

    #[test]
    fn annotation_is_none_when_nothing_reported() {
        let metrics = ResponseMetrics::default();
        assert!(metrics.is_empty());
        assert_eq!(metrics.annotation(), None);
    }

    #[test]
    fn annotation_lists_all_reported_metrics_in_order() {
        let metrics = ResponseMetrics {
            model: Some("m-1".to_owned()),
            tokens_per_second: Some(40.0),
            time_to_first_token_ms: Some(120.0),
            total_response_time_ms: Some(2400.0),
        };
        assert_eq!(
            metrics.annotation().as_deref(),
            Some("m-1 · 40.0 tok/s · first token 120 ms · total 2.40 s")
        );
    }

    #[test]
    fn reported_zero_is_kept_distinct_from_absent() {
        let metrics = ResponseMetrics {
            time_to_first_token_ms: Some(0.0),
            ..ResponseMetrics::default()
        };
        assert!(!metrics.is_empty());
        assert_eq!(metrics.annotation().as_deref(), Some("first token 0 ms"));
    }

    #[test]
    fn conversation_id_is_read_from_any_carrying_variant() {
        let delta = StreamEvent::ContentDelta {
            text: "a".to_owned(),
            conversation_id: Some("c1".to_owned()),
        };
        let completion = StreamEvent::Completion(Completion {
            conversation_id: Some("c2".to_owned()),
            ..Completion::default()
        });
        assert_eq!(delta.conversation_id(), Some("c1"));
        assert_eq!(completion.conversation_id(), Some("c2"));
        assert_eq!(StreamEvent::malformed("x").conversation_id(), None);
        assert!(completion.is_terminal());
        assert!(!delta.is_terminal());
    }
}
