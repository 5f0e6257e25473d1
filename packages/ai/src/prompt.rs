//! Prompt text for forecast narratives.

use crime_forecast_forecast_models::NarrativeSummary;

use crate::AiError;

pub const SYSTEM_PROMPT: &str =
    "You are an analytical assistant providing insights based on crime data trends.";

/// Embeds both series as JSON followed by the analysis instructions.
///
/// # Errors
///
/// * [`AiError::Json`] if the summary cannot be serialized
pub fn user_prompt(summary: &NarrativeSummary) -> Result<String, AiError> {
    let historical = serde_json::to_string(&summary.historical)?;
    let predicted = serde_json::to_string(&summary.predicted)?;

    Ok(format!(
        "The following is a set of historical and predicted crime data points for analysis \
         and recommendations:\n\
         - **Historical Crime Data Points:** {historical}\n\
         - **Predicted Crime Data Points:** {predicted}\n\
         \n\
         Analyze the historical data and provide insights.\n\
         Analyze the predicted data and provide insights.\n\
         Explain the prediction basis, describe observed patterns, differences, and trends, \
         and provide significant findings or potential reasons behind these patterns.\n\
         Additionally, provide actionable insights and recommendations for stakeholders \
         based on this analysis.\n"
    ))
}

#[cfg(test)]
mod tests {
    use crime_forecast_forecast_models::DataPoint;

    use super::*;

    #[test]
    fn prompt_embeds_both_series_as_json() {
        let summary = NarrativeSummary {
            historical: vec![DataPoint {
                date: "2024-01".to_string(),
                value: 12.0,
            }],
            predicted: vec![DataPoint {
                date: "2024-02".to_string(),
                value: 13.5,
            }],
        };

        let prompt = user_prompt(&summary).unwrap();

        assert!(prompt.contains(r#"[{"date":"2024-01","value":12.0}]"#));
        assert!(prompt.contains(r#"[{"date":"2024-02","value":13.5}]"#));
        assert!(prompt.contains("recommendations for stakeholders"));
    }
}
