//! Argument extractors
//!
//! One extractor per intent. Each grounds its instruction in the live column
//! list and demands a bare JSON object with a fixed key set, so the reply can
//! be parsed mechanically. Parsing here is structural only; semantic checks
//! against the schema happen in the tool argument types.

use crate::error::{AgentError, Result};
use crate::intent::IntentTag;
use crate::llm::{clean_json_response, TextGenerator};
use serde_json::{Map, Value};
use tracing::debug;

struct FieldSpec {
    key: &'static str,
    required: bool,
    description: &'static str,
}

struct ExtractorSpec {
    purpose: &'static str,
    preamble: &'static str,
    fields: &'static [FieldSpec],
}

const QUERY_SPEC: ExtractorSpec = ExtractorSpec {
    purpose: "SQL queries",
    preamble: "The table name is: `data`. Use only the table name `data` in the query.\n\
Write a single read-only SELECT statement. Do not invent or hallucinate column or table names.\n\
Refer to columns by name in ORDER BY and GROUP BY, never by position. Do not use HAVING.",
    fields: &[FieldSpec {
        key: "query",
        required: true,
        description: "the SQL SELECT statement to execute",
    }],
};

const DISTRIBUTION_SPEC: ExtractorSpec = ExtractorSpec {
    purpose: "distribution plots",
    preamble: "Pick a column holding numeric values.",
    fields: &[FieldSpec {
        key: "column",
        required: true,
        description: "the column to plot",
    }],
};

const TREND_SPEC: ExtractorSpec = ExtractorSpec {
    purpose: "plotting trends in tabular data",
    preamble: "Use null for 'x' when the question does not name an X-axis column.",
    fields: &[
        FieldSpec {
            key: "y",
            required: true,
            description: "the column to plot on the Y-axis",
        },
        FieldSpec {
            key: "x",
            required: false,
            description: "the column to plot on the X-axis",
        },
    ],
};

const SUMMARY_SPEC: ExtractorSpec = ExtractorSpec {
    purpose: "computing summary statistics on a dataset",
    preamble: "Supported metrics include: mean, median, min, max, std (standard deviation).\n\
If the question asks for results per category (\"by region\"), list those categories in 'group_by'.",
    fields: &[
        FieldSpec {
            key: "columns",
            required: true,
            description: "list of relevant columns",
        },
        FieldSpec {
            key: "metrics",
            required: false,
            description: "list of metrics to compute",
        },
        FieldSpec {
            key: "group_by",
            required: false,
            description: "list of columns the question groups by",
        },
    ],
};

fn spec_for(intent: IntentTag) -> &'static ExtractorSpec {
    match intent {
        IntentTag::Query => &QUERY_SPEC,
        IntentTag::Distribution => &DISTRIBUTION_SPEC,
        IntentTag::Trend => &TREND_SPEC,
        IntentTag::Summary => &SUMMARY_SPEC,
    }
}

/// System instruction for `intent`'s extractor, grounded in `known_columns`.
pub fn extraction_instruction(intent: IntentTag, known_columns: &[String]) -> String {
    let spec = spec_for(intent);
    let fields: Vec<String> = spec
        .fields
        .iter()
        .map(|f| {
            format!(
                "- '{}': {} ({})",
                f.key,
                f.description,
                if f.required { "required" } else { "optional" }
            )
        })
        .collect();
    let keys: Vec<String> = spec.fields.iter().map(|f| format!("'{}'", f.key)).collect();

    format!(
        "You are a helpful assistant that extracts structured arguments for {}.\n\
The column names in the dataset are: {}.\n\
{}\n\
Based on the user's input, extract:\n{}\n\n\
Respond ONLY as a JSON object with keys: {}. Do not include any explanation.",
        spec.purpose,
        known_columns.join(", "),
        spec.preamble,
        fields.join("\n"),
        keys.join(", ")
    )
}

pub struct ArgumentExtractor<'a> {
    llm: &'a dyn TextGenerator,
}

impl<'a> ArgumentExtractor<'a> {
    pub fn new(llm: &'a dyn TextGenerator) -> Self {
        Self { llm }
    }

    /// Ask the model for `intent`'s arguments and parse the reply as a JSON object.
    pub async fn extract(
        &self,
        intent: IntentTag,
        question: &str,
        known_columns: &[String],
    ) -> Result<Map<String, Value>> {
        let instruction = extraction_instruction(intent, known_columns);
        let raw = self.llm.generate(&instruction, question).await?;
        let parsed = parse_json_object(&raw)?;
        let shown = serde_json::Value::Object(parsed.clone());
        debug!("Extracted {} arguments: {}", intent, shown);
        Ok(parsed)
    }
}

pub fn parse_json_object(raw: &str) -> Result<Map<String, Value>> {
    let cleaned = clean_json_response(raw);
    match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AgentError::Parse(format!(
            "expected a JSON object, got: {}",
            other
        ))),
        Err(e) => Err(AgentError::Parse(format!("{}. Response: {}", e, cleaned))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<String> {
        vec!["revenue".to_string(), "region".to_string(), "date".to_string()]
    }

    #[test]
    fn test_instruction_grounds_columns_and_keys() {
        for intent in IntentTag::ALL {
            let instruction = extraction_instruction(intent, &columns());
            assert!(instruction.contains("revenue, region, date"));
            assert!(instruction.contains("Respond ONLY as a JSON object"));
        }
        let trend = extraction_instruction(IntentTag::Trend, &columns());
        assert!(trend.contains("keys: 'y', 'x'"));
        let query = extraction_instruction(IntentTag::Query, &columns());
        assert!(query.contains("`data`"));
    }

    struct Reply(&'static str);

    #[async_trait::async_trait]
    impl TextGenerator for Reply {
        async fn generate(&self, _system_instruction: &str, _user_text: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_extract_parses_reply() {
        let llm = Reply("```json\n{\"y\": \"revenue\", \"x\": null}\n```");
        let args = ArgumentExtractor::new(&llm)
            .extract(IntentTag::Trend, "revenue over time", &columns())
            .await
            .unwrap();
        assert_eq!(args["y"], "revenue");
        assert!(args["x"].is_null());
    }

    #[test]
    fn test_parse_json_object() {
        let map = parse_json_object("```json\n{\"column\": \"price\"}\n```").unwrap();
        assert_eq!(map["column"], "price");
    }

    #[test]
    fn test_parse_rejects_prose_and_non_objects() {
        assert!(matches!(
            parse_json_object("The column is price"),
            Err(AgentError::Parse(_))
        ));
        assert!(matches!(parse_json_object("[\"price\"]"), Err(AgentError::Parse(_))));
    }
}
