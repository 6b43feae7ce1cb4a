use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use super::*;

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Yes => "YES",
            Self::No => "NO",
        };
        write!(f, "{}", output)
    }
}
impl FromStr for Outcome {
    type Err = String;

    /// Accepts `yes`/`no` in any casing, surrounding whitespace ignored.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "YES" => Ok(Self::Yes),
            "NO" => Ok(Self::No),
            _ => Err(s.to_string()),
        }
    }
}
impl Display for MarketStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Open => "Open",
            Self::Closed => "Closed",
            Self::Resolved => "Resolved",
        };
        write!(f, "{}", output)
    }
}
impl Display for BetStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let output = match self {
            Self::Active => "Active",
            Self::Won => "Won",
            Self::Lost => "Lost",
        };
        write!(f, "{}", output)
    }
}
impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            balance: user.balance,
            invite_code: user.invite_code.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn outcome_parsing_is_lenient() {
        assert_eq!(Outcome::from_str("yes"), Ok(Outcome::Yes));
        assert_eq!(Outcome::from_str(" No "), Ok(Outcome::No));
        assert_eq!(Outcome::from_str("MAYBE"), Err("MAYBE".to_string()));
        assert_eq!(Outcome::Yes.to_string(), "YES");
    }

    #[test]
    fn outcome_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Outcome::No).unwrap(), "\"NO\"");
    }
}
