use log::debug;
use snafu::prelude::*;
use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

use survey_scoring::columns::index_of;
use survey_scoring::{ModalityDefinition, ScaleRange, SemaphoreThresholds};

use crate::report::{
    BReportResult, OpeningJsonSnafu, ParsingJsonNumberSnafu, ParsingJsonSnafu, ReportResult,
    UnknownScaleSnafu,
};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "reportName")]
    pub report_name: String,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "auditFile")]
    pub audit_file: Option<String>,
    #[serde(rename = "decimalPlaces")]
    pub decimal_places: Option<u32>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct FileSource {
    pub modality: String,
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    /// Other names the worksheet had in earlier versions of the workbook.
    #[serde(rename = "excelWorksheetAliases")]
    pub excel_worksheet_aliases: Option<Vec<String>>,
    #[serde(rename = "timestampColumn")]
    pub timestamp_column: Option<String>,
    #[serde(rename = "programColumn")]
    pub program_column: Option<String>,
    /// The name of the form in the applications sheet.
    pub form: Option<String>,
}

impl FileSource {
    /// Identifies the loaded table: two sources with the same key share it.
    pub fn cache_key(&self, resolved_path: &str) -> String {
        format!(
            "{}|{}|{:?}|{:?}|{:?}|{:?}",
            self.provider,
            resolved_path,
            self.excel_worksheet_name,
            self.excel_worksheet_aliases,
            self.timestamp_column,
            self.program_column
        )
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SectionConfig {
    pub name: String,
    pub start: String,
    pub end: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ModalityConfig {
    pub key: String,
    pub label: Option<String>,
    #[serde(rename = "schemaVersion")]
    pub schema_version: Option<u32>,
    #[serde(rename = "minColumns")]
    _min_columns: Option<JSValue>,
    pub scale: Option<String>,
    pub sections: Vec<SectionConfig>,
}

impl ModalityConfig {
    pub fn min_columns(&self) -> ReportResult<Option<usize>> {
        match self._min_columns {
            None | Some(JSValue::Null) => Ok(None),
            Some(_) => read_js_int("minColumns", &self._min_columns).map(Some),
        }
    }

    pub fn scale_range(&self) -> ReportResult<ScaleRange> {
        match self.scale.as_deref() {
            None | Some("zeroToFive") => Ok(ScaleRange::ZeroToFive),
            Some("oneToFive") => Ok(ScaleRange::OneToFive),
            Some(x) => UnknownScaleSnafu { scale: x }.fail(),
        }
    }

    pub fn to_definition(&self) -> ReportResult<ModalityDefinition> {
        let label = self.label.clone().unwrap_or_else(|| self.key.clone());
        let mut res = ModalityDefinition::new(&self.key, &label)
            .schema(self.schema_version.unwrap_or(1), self.min_columns()?)
            .scale(self.scale_range()?);
        for s in self.sections.iter() {
            res = res.section(&s.name, &s.start, &s.end);
        }
        debug!("to_definition: {:?}", res);
        Ok(res)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationsSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
}

impl ApplicationsSource {
    pub fn to_file_source(&self) -> FileSource {
        FileSource {
            modality: "aplicaciones".to_string(),
            provider: self.provider.clone(),
            file_path: self.file_path.clone(),
            excel_worksheet_name: self.excel_worksheet_name.clone(),
            excel_worksheet_aliases: None,
            timestamp_column: None,
            program_column: None,
            form: None,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub view: Option<String>,
    pub program: Option<String>,
    #[serde(rename = "dateStart")]
    pub date_start: Option<String>,
    #[serde(rename = "dateEnd")]
    pub date_end: Option<String>,
    #[serde(rename = "applicationId")]
    pub application_id: Option<String>,
    pub year: Option<i32>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    pub high: f64,
    pub medium: f64,
}

impl Thresholds {
    pub fn to_semaphore(&self) -> SemaphoreThresholds {
        SemaphoreThresholds {
            high: self.high,
            medium: self.medium,
        }
    }
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    pub sources: Vec<FileSource>,
    pub modalities: Option<Vec<ModalityConfig>>,
    pub applications: Option<ApplicationsSource>,
    pub scope: Option<ScopeConfig>,
    pub thresholds: Option<Thresholds>,
}

pub fn read_config(path: &str) -> BReportResult<ReportConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: ReportConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(config)
}

pub fn read_summary(path: &str) -> BReportResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

// A count of columns, given either as a number or as the label of the last
// column ("BE" means 57 columns).
fn read_js_int(field: &str, x: &Option<JSValue>) -> ReportResult<usize> {
    let value = format!("{:?}", x);
    match x {
        Some(JSValue::Number(n)) => n
            .as_u64()
            .map(|x| x as usize)
            .context(ParsingJsonNumberSnafu { field, value }),
        Some(JSValue::String(s)) if !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic()) => {
            index_of(s)
                .map(|idx| idx + 1)
                .context(ParsingJsonNumberSnafu { field, value })
        }
        Some(JSValue::String(s)) => s
            .trim()
            .parse::<usize>()
            .ok()
            .context(ParsingJsonNumberSnafu { field, value }),
        _ => None.context(ParsingJsonNumberSnafu { field, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn modality(min_columns: JSValue, scale: Option<&str>) -> ModalityConfig {
        ModalityConfig {
            key: "virtual".to_string(),
            label: None,
            schema_version: Some(2),
            _min_columns: Some(min_columns),
            scale: scale.map(|s| s.to_string()),
            sections: vec![SectionConfig {
                name: "Aprendizaje".to_string(),
                start: "H".to_string(),
                end: "P".to_string(),
            }],
        }
    }

    #[test]
    fn min_columns_as_number_or_label() {
        assert_eq!(modality(json!(57), None).min_columns().unwrap(), Some(57));
        assert_eq!(modality(json!("BE"), None).min_columns().unwrap(), Some(57));
        assert_eq!(modality(json!("12"), None).min_columns().unwrap(), Some(12));
        assert_eq!(modality(JSValue::Null, None).min_columns().unwrap(), None);
        assert!(modality(json!("B2"), None).min_columns().is_err());
        assert!(modality(json!(-3), None).min_columns().is_err());
    }

    #[test]
    fn modality_definition() {
        let def = modality(json!("Z"), Some("oneToFive")).to_definition().unwrap();
        assert_eq!(def.key, "virtual");
        assert_eq!(def.label, "virtual");
        assert_eq!(def.schema_version, 2);
        assert_eq!(def.min_columns, Some(26));
        assert_eq!(def.scale, ScaleRange::OneToFive);
        assert_eq!(def.sections.len(), 1);
        assert!(modality(json!(3), Some("tenPoints")).to_definition().is_err());
    }

    #[test]
    fn parse_config() {
        let js = r#"{
            "outputSettings": { "reportName": "Calidad" },
            "sources": [ { "modality": "prepa", "provider": "csv", "filePath": "prepa.csv" } ],
            "scope": { "view": "director", "program": "Derecho" }
        }"#;
        let config: ReportConfig = serde_json::from_str(js).unwrap();
        assert_eq!(config.output_settings.report_name, "Calidad");
        assert_eq!(config.sources[0].modality, "prepa");
        assert_eq!(config.sources[0].timestamp_column, None);
        assert_eq!(config.modalities, None);
        assert_eq!(
            config.scope.unwrap().program,
            Some("Derecho".to_string())
        );
    }
}
