//! Monetary estimates for model calls.

use super::Usage;

/// Per-million-token rates (input, output) in USD. Approximate, for display.
fn rates(model: &str) -> (f64, f64) {
    match model {
        "meta-llama/llama-3.1-405b-instruct" => (0.6, 0.6),
        "Meta-Llama-3.1-405B-Instruct" => (0.6, 0.6),
        "anthropic/claude-3-opus" => (15.0, 75.0),
        "openai/gpt-4" => (30.0, 60.0),
        // Unrecognized models fall back to the default pair.
        _ => (0.6, 0.6),
    }
}

/// Convert token usage into an estimated cost for the given model.
pub fn model_cost(usage: &Usage, model: &str) -> f64 {
    let (input_rate, output_rate) = rates(model);

    let input_cost = (usage.prompt_tokens as f64 / 1_000_000.0) * input_rate;
    let output_cost = (usage.completion_tokens as f64 / 1_000_000.0) * output_rate;

    input_cost + output_cost
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(prompt: u64, completion: u64) -> Usage {
        Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: prompt + completion,
        }
    }

    #[test]
    fn known_model_uses_its_rate_pair() {
        let cost = model_cost(&usage(1_000_000, 1_000_000), "openai/gpt-4");
        assert!((cost - 90.0).abs() < 1e-9);
    }

    #[test]
    fn asymmetric_rates_weight_output_tokens() {
        let cost = model_cost(&usage(0, 2_000_000), "anthropic/claude-3-opus");
        assert!((cost - 150.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_model_falls_back_to_default_rates() {
        let cost = model_cost(&usage(500_000, 500_000), "acme/novel-model");
        assert!((cost - 0.6).abs() < 1e-9);
    }
}
