use anyhow::Result;
use std::path::PathBuf;

mod formatter;
mod writer;

pub use formatter::*;
pub use writer::*;

use crate::assessment::PropertyAssessment;

pub trait Outputter: Send + Sync {
    fn format(&self, assessment: &PropertyAssessment, is_last: bool) -> String;
    fn output(
        &self,
        assessments: &[PropertyAssessment],
        output_path: Option<PathBuf>,
        silent: bool,
    ) -> Result<()>;
}

pub fn create_outputter(format: &str) -> Box<dyn Outputter> {
    match format.to_lowercase().as_str() {
        "json" => Box::new(JsonOutputter::new()),
        "csv" => Box::new(CsvOutputter::new()),
        _ => Box::new(PlainOutputter::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::PropertyQuery;

    fn assessment() -> PropertyAssessment {
        PropertyAssessment::from_results(PropertyQuery::new("SW1A 2AA"), vec![])
    }

    #[test]
    fn test_create_outputter_json() {
        let outputter = create_outputter("json");
        let formatted = outputter.format(&assessment(), true);
        assert!(formatted.contains("\"address\":\"SW1A 2AA\""));
    }

    #[test]
    fn test_create_outputter_csv() {
        let outputter = create_outputter("csv");
        let formatted = outputter.format(&assessment(), false);
        assert!(formatted.starts_with("\"SW1A 2AA\","));
    }

    #[test]
    fn test_create_outputter_default_for_unknown() {
        let outputter = create_outputter("unknown");
        let formatted = outputter.format(&assessment(), false);
        assert!(formatted.contains("SW1A 2AA"));
    }

    #[test]
    fn test_create_outputter_case_insensitive() {
        let outputter = create_outputter("JSON");
        let formatted = outputter.format(&assessment(), true);
        assert!(formatted.starts_with('{'));
    }
}
