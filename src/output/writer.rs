use crate::output::Formatter;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

// Outputter implementations for different formats
use super::Outputter;
use crate::assessment::PropertyAssessment;

#[derive(Debug, Clone)]
pub struct PlainOutputter {
    formatter: Box<dyn Formatter>,
}

impl PlainOutputter {
    pub fn new() -> Self {
        PlainOutputter {
            formatter: Box::new(super::PlainFormatter::new()),
        }
    }
}

impl Default for PlainOutputter {
    fn default() -> Self {
        Self::new()
    }
}

impl Outputter for PlainOutputter {
    fn format(&self, assessment: &PropertyAssessment, is_last: bool) -> String {
        self.formatter.format(assessment, is_last)
    }

    fn output(
        &self,
        assessments: &[PropertyAssessment],
        output_path: Option<PathBuf>,
        silent: bool,
    ) -> Result<()> {
        match output_path {
            Some(path) => {
                let mut file = File::create(&path).context("Failed to create output file")?;

                for (i, assessment) in assessments.iter().enumerate() {
                    let formatted = self.format(assessment, i == assessments.len() - 1);
                    file.write_all(formatted.as_bytes())
                        .context("Failed to write to output file")?;
                }
                Ok(())
            }
            None => {
                if silent {
                    return Ok(());
                };

                for (i, assessment) in assessments.iter().enumerate() {
                    let formatted = self.format(assessment, i == assessments.len() - 1);
                    print!("{}", formatted);
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct JsonOutputter {
    formatter: Box<dyn Formatter>,
}

impl JsonOutputter {
    pub fn new() -> Self {
        JsonOutputter {
            formatter: Box::new(super::JsonFormatter::new()),
        }
    }
}

impl Default for JsonOutputter {
    fn default() -> Self {
        Self::new()
    }
}

impl Outputter for JsonOutputter {
    fn format(&self, assessment: &PropertyAssessment, is_last: bool) -> String {
        self.formatter.format(assessment, is_last)
    }

    fn output(
        &self,
        assessments: &[PropertyAssessment],
        output_path: Option<PathBuf>,
        silent: bool,
    ) -> Result<()> {
        match output_path {
            Some(path) => {
                let mut file = File::create(&path).context("Failed to create output file")?;

                file.write_all(b"[")
                    .context("Failed to write JSON opening bracket")?;

                for (i, assessment) in assessments.iter().enumerate() {
                    let formatted = self.format(assessment, i == assessments.len() - 1);
                    file.write_all(formatted.as_bytes())
                        .context("Failed to write to output file")?;
                }

                file.write_all(b"]")
                    .context("Failed to write JSON closing bracket")?;
                Ok(())
            }
            None => {
                if silent {
                    return Ok(());
                };

                print!("[");

                for (i, assessment) in assessments.iter().enumerate() {
                    let formatted = self.format(assessment, i == assessments.len() - 1);
                    print!("{}", formatted);
                }

                println!("]");
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvOutputter {
    formatter: Box<dyn Formatter>,
}

impl CsvOutputter {
    pub fn new() -> Self {
        CsvOutputter {
            formatter: Box::new(super::CsvFormatter::new()),
        }
    }
}

impl Default for CsvOutputter {
    fn default() -> Self {
        Self::new()
    }
}

impl Outputter for CsvOutputter {
    fn format(&self, assessment: &PropertyAssessment, is_last: bool) -> String {
        self.formatter.format(assessment, is_last)
    }

    fn output(
        &self,
        assessments: &[PropertyAssessment],
        output_path: Option<PathBuf>,
        silent: bool,
    ) -> Result<()> {
        match output_path {
            Some(path) => {
                let mut file = File::create(&path).context("Failed to create output file")?;

                file.write_all(super::CSV_HEADER.as_bytes())
                    .context("Failed to write CSV header")?;

                for (i, assessment) in assessments.iter().enumerate() {
                    let formatted = self.format(assessment, i == assessments.len() - 1);
                    file.write_all(formatted.as_bytes())
                        .context("Failed to write to output file")?;
                }

                Ok(())
            }
            None => {
                if silent {
                    return Ok(());
                };

                print!("{}", super::CSV_HEADER);

                for (i, assessment) in assessments.iter().enumerate() {
                    let formatted = self.format(assessment, i == assessments.len() - 1);
                    print!("{}", formatted);
                }

                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::PropertyQuery;
    use std::io::Read;
    use tempfile::NamedTempFile;

    fn assessments() -> Vec<PropertyAssessment> {
        vec![
            PropertyAssessment::from_results(PropertyQuery::new("SW1A 2AA"), vec![]),
            PropertyAssessment::from_results(PropertyQuery::new("M1 1AE"), vec![]),
        ]
    }

    #[test]
    fn test_plain_outputter_file_output() -> Result<()> {
        colored::control::set_override(false);
        let outputter = PlainOutputter::new();

        let temp_file = NamedTempFile::new()?;
        let temp_path = temp_file.path().to_path_buf();

        outputter.output(&assessments(), Some(temp_path.clone()), false)?;

        let mut content = String::new();
        File::open(&temp_path)?.read_to_string(&mut content)?;

        assert!(content.contains("SW1A 2AA"));
        assert!(content.contains("M1 1AE"));

        Ok(())
    }

    #[test]
    fn test_json_outputter_file_output_is_valid_array() -> Result<()> {
        let outputter = JsonOutputter::new();

        let temp_file = NamedTempFile::new()?;
        let temp_path = temp_file.path().to_path_buf();

        outputter.output(&assessments(), Some(temp_path.clone()), false)?;

        let mut content = String::new();
        File::open(&temp_path)?.read_to_string(&mut content)?;

        let parsed: serde_json::Value = serde_json::from_str(&content)?;
        assert_eq!(parsed.as_array().map(|a| a.len()), Some(2));

        Ok(())
    }

    #[test]
    fn test_csv_outputter_file_output_has_header() -> Result<()> {
        let outputter = CsvOutputter::new();

        let temp_file = NamedTempFile::new()?;
        let temp_path = temp_file.path().to_path_buf();

        outputter.output(&assessments(), Some(temp_path.clone()), false)?;

        let mut content = String::new();
        File::open(&temp_path)?.read_to_string(&mut content)?;

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("address,postcode"));

        Ok(())
    }

    #[test]
    fn test_empty_assessments() -> Result<()> {
        let outputter = PlainOutputter::new();

        let temp_file = NamedTempFile::new()?;
        let temp_path = temp_file.path().to_path_buf();

        outputter.output(&[], Some(temp_path.clone()), false)?;

        let mut content = String::new();
        File::open(&temp_path)?.read_to_string(&mut content)?;
        assert_eq!(content, "");

        Ok(())
    }
}
