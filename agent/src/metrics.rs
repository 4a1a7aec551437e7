use std::fmt;
use std::time::Duration;

use crate::trace::TokenUsage;

/// 1 回の呼び出しのレイテンシとトークン使用量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvokeMetrics {
    pub latency_ms: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl InvokeMetrics {
    pub fn new(elapsed: Duration, usage: TokenUsage) -> Self {
        Self {
            latency_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
        }
    }
}

impl fmt::Display for InvokeMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invoke Latency: {}ms, Input Tokens: {}, OutputTokens: {}",
            self.latency_ms, self.input_tokens, self.output_tokens
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let metrics = InvokeMetrics::new(
            Duration::from_millis(1534),
            TokenUsage {
                input_tokens: 812,
                output_tokens: 97,
            },
        );
        assert_eq!(
            metrics.to_string(),
            "Invoke Latency: 1534ms, Input Tokens: 812, OutputTokens: 97"
        );
    }
}
