//! Input collection and validation for an analysis submission.
//!
//! A submission needs a VCF file and at least one drug. Both conditions are
//! checked independently so every problem is reported at once, and a failed
//! check never discards the file or drugs collected so far.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::PharmGuardError;

pub const VARIANT_FILE_EXTENSION: &str = ".vcf";

/// Drugs offered as suggestions. Typed names outside this list are still accepted.
pub const SUGGESTED_DRUGS: &[&str] = &[
    "CODEINE",
    "WARFARIN",
    "CLOPIDOGREL",
    "SIMVASTATIN",
    "AZATHIOPRINE",
    "FLUOROURACIL",
];

/// Where the upload bytes live. Files chosen from disk stay on disk until the
/// request is built, so validation only ever looks at metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
enum VariantSource {
    Memory(Vec<u8>),
    Disk(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantFile {
    pub file_name: String,
    size: u64,
    source: VariantSource,
}

impl VariantFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            size: bytes.len() as u64,
            source: VariantSource::Memory(bytes),
        }
    }

    /// Records the file's name and size from metadata. The contents are read by [`VariantFile::read`].
    pub async fn from_path(path: &Path) -> Result<Self, PharmGuardError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PharmGuardError::InvalidArgument(format!("Not a file path: {}", path.display()))
            })?;
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(PharmGuardError::InvalidArgument(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }
        Ok(Self {
            file_name,
            size: metadata.len(),
            source: VariantSource::Disk(path.to_path_buf()),
        })
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn has_recognized_extension(&self) -> bool {
        self.file_name.ends_with(VARIANT_FILE_EXTENSION)
    }

    pub async fn read(&self) -> Result<Vec<u8>, PharmGuardError> {
        match &self.source {
            VariantSource::Memory(bytes) => Ok(bytes.clone()),
            VariantSource::Disk(path) => Ok(tokio::fs::read(path).await?),
        }
    }
}

fn normalize_drug_name(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// Ordered, de-duplicated set of uppercase drug names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrugSelection {
    drugs: Vec<String>,
}

impl DrugSelection {
    pub fn from_delimited(text: &str) -> Self {
        let mut out = Self::default();
        out.extend_delimited(text);
        out
    }

    /// Returns `true` when the drug was newly added.
    pub fn add(&mut self, name: &str) -> bool {
        let Some(name) = normalize_drug_name(name) else {
            return false;
        };
        if self.drugs.contains(&name) {
            return false;
        }
        self.drugs.push(name);
        true
    }

    /// Adds the drug when absent and removes it when present.
    pub fn toggle(&mut self, name: &str) {
        let Some(name) = normalize_drug_name(name) else {
            return;
        };
        if let Some(pos) = self.drugs.iter().position(|d| *d == name) {
            self.drugs.remove(pos);
        } else {
            self.drugs.push(name);
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let Some(name) = normalize_drug_name(name) else {
            return false;
        };
        let before = self.drugs.len();
        self.drugs.retain(|d| *d != name);
        before != self.drugs.len()
    }

    pub fn remove_last(&mut self) -> Option<String> {
        self.drugs.pop()
    }

    pub fn clear(&mut self) {
        self.drugs.clear();
    }

    /// Splits comma/newline separated free text and adds each entry.
    pub fn extend_delimited(&mut self, text: &str) {
        for part in text.split([',', '\n', '\r']) {
            self.add(part);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.drugs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.drugs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.drugs.iter().map(String::as_str)
    }

    pub fn joined(&self) -> String {
        self.drugs.join(",")
    }
}

/// Case-insensitive exact match against the suggestion vocabulary.
pub fn matches_known(typed: &str) -> Option<&'static str> {
    let typed = typed.trim();
    SUGGESTED_DRUGS
        .iter()
        .copied()
        .find(|drug| drug.eq_ignore_ascii_case(typed))
}

pub fn suggestions(query: &str) -> Vec<&'static str> {
    let query = query.trim().to_ascii_lowercase();
    SUGGESTED_DRUGS
        .iter()
        .copied()
        .filter(|drug| drug.to_ascii_lowercase().contains(&query))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationField {
    VariantFile,
    Drugs,
}

impl ValidationField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VariantFile => "vcf_file",
            Self::Drugs => "drugs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: ValidationField,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    issues: Vec<ValidationIssue>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: ValidationField, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn for_field(&self, field: ValidationField) -> Option<&str> {
        self.issues
            .iter()
            .find(|issue| issue.field == field)
            .map(|issue| issue.message.as_str())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "  {}: {}", issue.field.as_str(), issue.message)?;
        }
        Ok(())
    }
}

/// A submission that passed validation. Only [`InputCollector::validate`] builds one.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    variant_file: VariantFile,
    drugs: DrugSelection,
}

impl AnalysisRequest {
    pub fn variant_file(&self) -> &VariantFile {
        &self.variant_file
    }

    pub fn drugs(&self) -> &DrugSelection {
        &self.drugs
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputCollector {
    pub variant_file: Option<VariantFile>,
    pub drugs: DrugSelection,
}

impl InputCollector {
    pub fn set_variant_file(&mut self, file: VariantFile) {
        self.variant_file = Some(file);
    }

    pub fn validate(&self, settings: &Settings) -> Result<AnalysisRequest, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        match &self.variant_file {
            None => errors.push(ValidationField::VariantFile, "Please select a VCF file"),
            Some(file) if !file.has_recognized_extension() => errors.push(
                ValidationField::VariantFile,
                format!(
                    "Please upload a proper {VARIANT_FILE_EXTENSION} file (got '{}')",
                    file.file_name
                ),
            ),
            Some(file) => {
                if let Some(limit) = settings.max_upload_bytes.filter(|limit| file.size() > *limit) {
                    errors.push(
                        ValidationField::VariantFile,
                        format!(
                            "File size exceeds {} MiB. Please upload a proper file.",
                            limit / (1024 * 1024)
                        ),
                    );
                }
            }
        }

        if self.drugs.is_empty() {
            errors.push(ValidationField::Drugs, "Please enter at least one drug name");
        }

        let Some(file) = self.variant_file.as_ref().filter(|_| errors.is_empty()) else {
            return Err(errors);
        };

        Ok(AnalysisRequest {
            variant_file: file.clone(),
            drugs: self.drugs.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector(name: &str, bytes: usize, drugs: &str) -> InputCollector {
        InputCollector {
            variant_file: Some(VariantFile::new(name, vec![b'#'; bytes])),
            drugs: DrugSelection::from_delimited(drugs),
        }
    }

    #[test]
    fn drug_selection_uppercases_and_collapses_duplicates() {
        let drugs = DrugSelection::from_delimited(" codeine, Warfarin,\nCODEINE,, ");
        assert_eq!(drugs.iter().collect::<Vec<_>>(), vec!["CODEINE", "WARFARIN"]);
        assert_eq!(drugs.joined(), "CODEINE,WARFARIN");
    }

    #[test]
    fn unknown_drug_names_are_kept_verbatim_uppercased() {
        let mut drugs = DrugSelection::default();
        assert!(drugs.add("tamoxifen"));
        assert_eq!(drugs.joined(), "TAMOXIFEN");
        assert_eq!(matches_known("tamoxifen"), None);
        assert_eq!(matches_known("warfarin"), Some("WARFARIN"));
    }

    #[test]
    fn toggle_and_remove_last_mirror_tag_input() {
        let mut drugs = DrugSelection::default();
        drugs.toggle("codeine");
        drugs.toggle("simvastatin");
        drugs.toggle("CODEINE");
        assert_eq!(drugs.joined(), "SIMVASTATIN");
        assert_eq!(drugs.remove_last().as_deref(), Some("SIMVASTATIN"));
        assert!(drugs.is_empty());
    }

    #[test]
    fn suggestions_filter_by_substring() {
        assert_eq!(suggestions("in"), vec!["CODEINE", "WARFARIN", "SIMVASTATIN", "AZATHIOPRINE"]);
        assert_eq!(suggestions("").len(), SUGGESTED_DRUGS.len());
    }

    #[test]
    fn txt_file_is_rejected() {
        let errors = collector("sample.txt", 10, "CODEINE")
            .validate(&Settings::default())
            .expect_err("txt should be rejected");
        assert!(
            errors
                .for_field(ValidationField::VariantFile)
                .is_some_and(|m| m.contains(".vcf"))
        );
        assert!(errors.for_field(ValidationField::Drugs).is_none());
    }

    #[test]
    fn both_conditions_are_reported_together() {
        let input = InputCollector::default();
        let errors = input
            .validate(&Settings::default())
            .expect_err("empty input should fail");
        assert_eq!(errors.issues().len(), 2);
    }

    #[test]
    fn failed_validation_keeps_collected_state() {
        let input = collector("sample.vcf", 10, "");
        assert!(input.validate(&Settings::default()).is_err());
        assert!(input.variant_file.is_some());
    }

    #[test]
    fn size_ceiling_is_configurable() {
        let over = 5 * 1024 * 1024 + 1;
        let input = collector("big.vcf", over, "CODEINE");

        let limited = Settings::new(None, 5, false, 30);
        let errors = input.validate(&limited).expect_err("over ceiling");
        assert!(
            errors
                .for_field(ValidationField::VariantFile)
                .is_some_and(|m| m.contains("5 MiB"))
        );

        let unlimited = Settings::new(None, 5, true, 30);
        let request = input.validate(&unlimited).expect("no ceiling");
        assert_eq!(request.variant_file().size(), over as u64);
        assert_eq!(request.drugs().joined(), "CODEINE");
    }

    #[tokio::test]
    async fn disk_file_is_validated_from_metadata_alone() {
        let dir = std::env::temp_dir().join(format!("pharmguard-input-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.expect("dir");
        let path = dir.join("huge.vcf");
        let file = tokio::fs::File::create(&path).await.expect("create");
        file.set_len(5 * 1024 * 1024 + 1).await.expect("sparse length");
        drop(file);

        let variant = VariantFile::from_path(&path).await.expect("metadata");
        assert_eq!(variant.size(), 5 * 1024 * 1024 + 1);
        tokio::fs::remove_dir_all(&dir).await.expect("cleanup");

        // The file is gone: validation still rejects it by size, and only read() needs the contents.
        let input = InputCollector {
            variant_file: Some(variant.clone()),
            drugs: DrugSelection::from_delimited("CODEINE"),
        };
        let errors = input
            .validate(&Settings::default())
            .expect_err("over ceiling");
        assert!(
            errors
                .for_field(ValidationField::VariantFile)
                .is_some_and(|m| m.contains("5 MiB"))
        );
        assert!(variant.read().await.is_err());
    }

    #[tokio::test]
    async fn directories_are_not_variant_files() {
        let err = VariantFile::from_path(&std::env::temp_dir())
            .await
            .expect_err("directory");
        assert!(err.to_string().contains("Not a regular file"));
    }
}
