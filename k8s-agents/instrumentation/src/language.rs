use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use crate::{crd::Instrumentation, error::InstrumentationError};

/// Instrumentation selected for each language, resolved before injection starts.
///
/// Iteration follows [`Language`] order, which is the order agents get injected in.
pub type LanguageInstrumentations = BTreeMap<Language, Instrumentation>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Language {
    Java,
    NodeJs,
    Python,
    DotNet,
    Php,
    Go,
}

/// Where the agent runs relative to the application it observes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentPlacement {
    /// Loaded into the application process, configured through the application container.
    InProcess,
    /// Runs in its own container appended to the pod. One application container per pod.
    Sidecar,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Java,
        Language::NodeJs,
        Language::Python,
        Language::DotNet,
        Language::Php,
        Language::Go,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Language::Java => "java",
            Language::NodeJs => "nodejs",
            Language::Python => "python",
            Language::DotNet => "dotnet",
            Language::Php => "php",
            Language::Go => "go",
        }
    }

    pub const fn placement(self) -> AgentPlacement {
        match self {
            Language::Go => AgentPlacement::Sidecar,
            _ => AgentPlacement::InProcess,
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = InstrumentationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|language| language.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| InstrumentationError::UnknownLanguage(s.to_owned()))
    }
}
