//! Which of the two renderings a field produces on read.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The two interchangeable renderings of a stored value.
///
/// `Native` is the application-facing form; `Transport` is the wire form a
/// Rexster-style graph property protocol understands (booleans as
/// `"true"`/`"false"`, timestamps as integer milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    #[default]
    Native,
    Transport,
}

impl Representation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Representation::Native => "native",
            Representation::Transport => "transport",
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Representation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(Representation::Native),
            "transport" => Ok(Representation::Transport),
            other => Err(Error::Configuration(format!("unknown representation '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("native".parse::<Representation>().unwrap(), Representation::Native);
        assert_eq!(" Transport ".parse::<Representation>().unwrap(), Representation::Transport);
        assert!("graph".parse::<Representation>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Representation::Transport).unwrap();
        assert_eq!(json, "\"transport\"");
    }
}
