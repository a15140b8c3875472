use serde::{Deserialize, Serialize};

/// A boolean that may be left unset, so that the consumer picks the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum Flag {
    /// Explicitly set.
    True,
    /// Explicitly cleared.
    False,
    /// Unset.
    #[default]
    Default,
}

impl Flag {
    /// Resolves the flag, falling back to `default` when unset.
    pub const fn with_default(self, default: bool) -> bool {
        match self {
            Self::True => true,
            Self::False => false,
            Self::Default => default,
        }
    }

    /// Returns `true` if the flag is unset.
    pub const fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

impl From<Option<bool>> for Flag {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::True,
            Some(false) => Self::False,
            None => Self::Default,
        }
    }
}

impl From<Flag> for Option<bool> {
    fn from(flag: Flag) -> Self {
        match flag {
            Flag::True => Some(true),
            Flag::False => Some(false),
            Flag::Default => None,
        }
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        Some(value).into()
    }
}
