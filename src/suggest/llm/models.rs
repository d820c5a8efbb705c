use serde::Deserialize;

/// Model tiers used by the analysis branches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    /// Speed tier - short text answers (component and style suggestions)
    Speed,
    /// Smart tier - whole-file code generation (project layout, enhancements)
    Smart,
}

/// Component and style answers are short; keep their budget small.
const SPEED_MAX_TOKENS: u32 = 4096;
/// Generated projects and rewritten files can be long.
const SMART_MAX_TOKENS: u32 = 16384;

impl Model {
    pub fn id(&self) -> &'static str {
        match self {
            Model::Speed => "google/gemini-2.0-flash-001",
            Model::Smart => "anthropic/claude-sonnet-4.5",
        }
    }

    pub fn max_tokens(&self) -> u32 {
        match self {
            Model::Speed => SPEED_MAX_TOKENS,
            Model::Smart => SMART_MAX_TOKENS,
        }
    }

    /// Resolve the model id to send, honouring a configured override.
    pub fn resolve<'a>(&'a self, override_id: Option<&'a str>) -> &'a str {
        override_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.id())
    }
}

/// API usage information from OpenRouter
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
    /// Actual cost in USD as reported by OpenRouter (`total_cost` in the usage object).
    #[serde(default, alias = "total_cost")]
    pub cost: Option<f64>,
}

impl Usage {
    /// Cost reported by OpenRouter, or 0.0 when absent. Costs are never estimated.
    pub fn cost(&self) -> f64 {
        self.cost.unwrap_or(0.0)
    }

    /// Sum two usage records, keeping cost only when either side reported one.
    pub fn merge(self, other: &Usage) -> Usage {
        let cost = match (self.cost, other.cost) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
        };
        Usage {
            prompt_tokens: self.prompt_tokens.saturating_add(other.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(other.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(other.total_tokens),
            cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_ids() {
        assert!(Model::Speed.id().contains("gemini"));
        assert!(Model::Smart.id().contains("claude"));
    }

    #[test]
    fn test_model_max_tokens() {
        assert_eq!(Model::Speed.max_tokens(), SPEED_MAX_TOKENS);
        assert_eq!(Model::Smart.max_tokens(), SMART_MAX_TOKENS);
    }

    #[test]
    fn test_resolve_prefers_non_blank_override() {
        assert_eq!(Model::Speed.resolve(Some("openai/gpt-4o")), "openai/gpt-4o");
        assert_eq!(Model::Speed.resolve(Some("   ")), Model::Speed.id());
        assert_eq!(Model::Smart.resolve(None), Model::Smart.id());
    }

    #[test]
    fn test_usage_returns_zero_when_no_cost() {
        let usage = Usage {
            prompt_tokens: 1000,
            completion_tokens: 1000,
            total_tokens: 2000,
            cost: None,
        };
        assert_eq!(usage.cost(), 0.0);
    }

    #[test]
    fn test_usage_deserialize_with_total_cost() {
        let json = r#"{"prompt_tokens": 100, "completion_tokens": 50, "total_tokens": 150, "total_cost": 0.0025}"#;
        let usage: Usage = serde_json::from_str(json).unwrap();
        assert_eq!(usage.prompt_tokens, 100);
        assert_eq!(usage.total_tokens, 150);
        assert_eq!(usage.cost(), 0.0025);
    }

    #[test]
    fn test_usage_merge() {
        let a = Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
            cost: Some(0.01),
        };
        let b = Usage {
            prompt_tokens: 1,
            completion_tokens: 2,
            total_tokens: 3,
            cost: None,
        };
        let merged = a.merge(&b);
        assert_eq!(merged.total_tokens, 18);
        assert_eq!(merged.cost, Some(0.01));
        assert_eq!(Usage::default().merge(&Usage::default()).cost, None);
    }
}
