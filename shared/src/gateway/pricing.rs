//! Static on-demand pricing for cost accounting.

use serde::Serialize;

use super::FoundationModel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub input_cost_usd: f64,
    pub output_cost_usd: f64,
    pub total_cost_usd: f64,
}

impl FoundationModel {
    /// USD per 1000 (input, output) tokens.
    fn rate_per_1k(&self) -> (f64, f64) {
        match self {
            FoundationModel::ClaudeSonnet35 => (0.003, 0.015),
            FoundationModel::ClaudeHaiku3 => (0.00025, 0.00125),
            FoundationModel::Llama3Instruct70b => (0.00265, 0.0035),
            FoundationModel::Llama3Instruct8b => (0.0003, 0.0006),
            FoundationModel::TitanEmbedTextV2 => (0.00002, 0.0),
        }
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Estimate the cost of one call. Pure; every component is rounded to six
/// decimal places.
pub fn estimate_cost(model: FoundationModel, input_tokens: u32, output_tokens: u32) -> CostEstimate {
    let (input_rate, output_rate) = model.rate_per_1k();
    let input_cost_usd = round6(f64::from(input_tokens) / 1000.0 * input_rate);
    let output_cost_usd = round6(f64::from(output_tokens) / 1000.0 * output_rate);

    CostEstimate {
        input_cost_usd,
        output_cost_usd,
        total_cost_usd: round6(input_cost_usd + output_cost_usd),
    }
}
