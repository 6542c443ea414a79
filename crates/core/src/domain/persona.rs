use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// The closed set of agent personas a conversation can be routed to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaId {
    #[default]
    Main,
    Sales,
    Existing,
    Support,
}

impl PersonaId {
    pub const ALL: [PersonaId; 4] = [Self::Main, Self::Sales, Self::Existing, Self::Support];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Sales => "sales",
            Self::Existing => "existing",
            Self::Support => "support",
        }
    }
}

impl std::fmt::Display for PersonaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PersonaId {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "main" => Ok(Self::Main),
            "sales" => Ok(Self::Sales),
            "existing" => Ok(Self::Existing),
            "support" => Ok(Self::Support),
            other => Err(DomainError::UnknownPersona(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PersonaId;
    use crate::errors::DomainError;

    #[test]
    fn parses_every_known_persona() {
        for persona in PersonaId::ALL {
            assert_eq!(persona.as_str().parse::<PersonaId>(), Ok(persona));
        }
    }

    #[test]
    fn unknown_persona_is_rejected() {
        assert_eq!(
            "billing".parse::<PersonaId>(),
            Err(DomainError::UnknownPersona("billing".to_string()))
        );
        assert!("Support".parse::<PersonaId>().is_err(), "persona ids are case sensitive");
    }
}
