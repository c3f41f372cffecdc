//! Classifier configuration.

use mailbox_core::RawInputLayout;
use thiserror::Error;

use crate::content_key::ContentKeyConvention;
use crate::validate::RecordValidator;

/// Invalid classifier configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Metadata suffix is empty, so every file would match.
    #[error("metadata suffix must not be empty")]
    EmptySuffix,
    /// Delimiter equals the hidden-file marker.
    #[error("content key delimiter '{0}' must differ from the file marker")]
    DelimiterIsMarker(char),
    /// Delimiter is a path separator.
    #[error("content key delimiter '{0}' is a path separator")]
    DelimiterIsPathSeparator(char),
    /// A validator reads raw inputs but binary cross-referencing is off.
    #[error("validator `{0}` requires binary cross-referencing")]
    ValidatorNeedsRawInput(&'static str),
}

/// Secondary key used for access-violation buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossReference {
    /// Group by the faulting address reported in the metadata.
    #[default]
    Location,
    /// Group by the command id decoded from the paired raw input.
    Binary(RawInputLayout),
}

impl CrossReference {
    /// Raw input layout when binary cross-referencing is enabled.
    #[must_use]
    pub const fn layout(&self) -> Option<RawInputLayout> {
        match self {
            Self::Location => None,
            Self::Binary(layout) => Some(*layout),
        }
    }
}

/// Settings for one classification run.
#[derive(Debug, Default)]
pub struct ClassifierConfig {
    /// Solution file naming convention.
    pub convention: ContentKeyConvention,
    /// Access bucket secondary key.
    pub cross_reference: CrossReference,
    /// Optional campaign-specific sanity checks.
    pub validators: Vec<Box<dyn RecordValidator>>,
}

impl ClassifierConfig {
    /// Adds a sanity check.
    #[must_use]
    pub fn with_validator(mut self, validator: impl RecordValidator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Checks the configuration before any file is read.
    ///
    /// # Errors
    ///
    /// Returns the first inconsistency found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.convention.validate()?;

        if self.cross_reference.layout().is_none() {
            if let Some(validator) = self.validators.iter().find(|v| v.requires_raw_input()) {
                return Err(ConfigError::ValidatorNeedsRawInput(validator.name()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mailbox_core::RawInputLayout;

    use super::*;
    use crate::validate::{ExceptionCommandCheck, UnalignedPointerCheck};

    #[test]
    fn default_config_is_valid() {
        assert_eq!(ClassifierConfig::default().validate(), Ok(()));
    }

    #[test]
    fn command_check_requires_binary_mode() {
        let config = ClassifierConfig::default().with_validator(ExceptionCommandCheck::default());
        assert_eq!(
            config.validate(),
            Err(ConfigError::ValidatorNeedsRawInput("exception-command"))
        );

        let config = ClassifierConfig {
            cross_reference: CrossReference::Binary(RawInputLayout::default()),
            ..ClassifierConfig::default()
        }
        .with_validator(ExceptionCommandCheck::default());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn pointer_check_works_without_raw_inputs() {
        let config = ClassifierConfig::default().with_validator(UnalignedPointerCheck::default());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn convention_errors_propagate() {
        let mut config = ClassifierConfig::default();
        config.convention.delimiter = '.';
        assert_eq!(config.validate(), Err(ConfigError::DelimiterIsMarker('.')));
    }
}
