use thiserror::Error;

/// Errors raised by an external processing engine.
pub type EngineError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum MapperError {
    #[error("Invalid value for {field}: {value}")]
    Configuration { field: &'static str, value: String },

    #[error("Invalid configuration file: {0}")]
    InvalidConfigurationFile(String),

    #[error("No pointing sets found for {descriptor} {window}")]
    NoInputs { descriptor: String, window: String },

    #[error("{}", contract_message(level, *count))]
    EngineContract {
        descriptor: String,
        level: &'static str,
        count: usize,
    },

    #[error("Cannot produce map for instrument: {0}")]
    UnsupportedInstrument(String),

    #[error("No pointing set descriptor can be derived for {0}")]
    NoPointingTags(String),

    #[error("Processing for {descriptor} failed")]
    Engine {
        descriptor: String,
        #[source]
        source: EngineError,
    },

    #[error("HTTP ureq error: {0}")]
    ExternalService(#[from] ureq::Error),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid science file {path}: {reason}")]
    Container { path: String, reason: String },

    #[error("UTF-8 Path error: {0}")]
    Utf8PathError(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

fn contract_message(level: &str, count: usize) -> String {
    let level = level.to_uppercase();
    match count {
        0 => format!("{level} processing did not return any files!"),
        n => format!("{level} processing returned too many files! ({n} files)"),
    }
}

impl MapperError {
    pub(crate) fn configuration(field: &'static str, value: impl Into<String>) -> Self {
        MapperError::Configuration {
            field,
            value: value.into(),
        }
    }

    pub(crate) fn container(path: impl ToString, reason: impl Into<String>) -> Self {
        MapperError::Container {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Render this error followed by every error in its `source()` chain.
    pub fn report(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(&format!("\n  caused by: {cause}"));
            source = cause.source();
        }
        message
    }
}

impl PartialEq for MapperError {
    fn eq(&self, other: &Self) -> bool {
        use MapperError::*;
        match (self, other) {
            (
                Configuration {
                    field: f1,
                    value: v1,
                },
                Configuration {
                    field: f2,
                    value: v2,
                },
            ) => f1 == f2 && v1 == v2,
            (InvalidConfigurationFile(a), InvalidConfigurationFile(b)) => a == b,
            (
                NoInputs {
                    descriptor: d1,
                    window: w1,
                },
                NoInputs {
                    descriptor: d2,
                    window: w2,
                },
            ) => d1 == d2 && w1 == w2,
            (
                EngineContract {
                    descriptor: d1,
                    level: l1,
                    count: c1,
                },
                EngineContract {
                    descriptor: d2,
                    level: l2,
                    count: c2,
                },
            ) => d1 == d2 && l1 == l2 && c1 == c2,
            (UnsupportedInstrument(a), UnsupportedInstrument(b)) => a == b,
            (NoPointingTags(a), NoPointingTags(b)) => a == b,
            (InvalidDate(a), InvalidDate(b)) => a == b,
            (Utf8PathError(a), Utf8PathError(b)) => a == b,
            (
                Container {
                    path: p1,
                    reason: r1,
                },
                Container {
                    path: p2,
                    reason: r2,
                },
            ) => p1 == p2 && r1 == r2,

            // not comparable: same variant is enough
            (Engine { descriptor: a, .. }, Engine { descriptor: b, .. }) => a == b,
            (ExternalService(_), ExternalService(_)) => true,
            (IoError(_), IoError(_)) => true,
            (JsonError(_), JsonError(_)) => true,
            (YamlError(_), YamlError(_)) => true,

            _ => false,
        }
    }
}
