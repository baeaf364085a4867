use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};

/// Characters that satisfy the "special character" rule.
pub const SYMBOLS: &str = "'^£$%&*()}{@#~?!><,|=_+¬-";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,7}$")
        .expect("email pattern compiles")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// The first rule a password breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordRule {
    TooShort,
    MissingDigit,
    MissingUppercase,
    MissingLowercase,
    MissingSymbol,
}

impl PasswordRule {
    pub fn message(self) -> &'static str {
        match self {
            PasswordRule::TooShort => "Password must be longer than 8 characters",
            PasswordRule::MissingDigit => "Password must contain at least one digit",
            PasswordRule::MissingUppercase => {
                "Password must contain at least one uppercase letter"
            }
            PasswordRule::MissingLowercase => {
                "Password must contain at least one lowercase letter"
            }
            PasswordRule::MissingSymbol => "Password must contain at least one special character",
        }
    }
}

impl fmt::Display for PasswordRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PasswordPolicy {
    /// Passwords must be strictly longer than this many characters.
    pub min_length: usize,
    pub require_symbol: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_symbol: true,
        }
    }
}

impl From<&AuthConfig> for PasswordPolicy {
    fn from(config: &AuthConfig) -> Self {
        Self {
            require_symbol: config.require_symbol,
            ..Self::default()
        }
    }
}

impl PasswordPolicy {
    pub fn check(&self, password: &str) -> Result<(), PasswordRule> {
        if password.chars().count() <= self.min_length {
            return Err(PasswordRule::TooShort);
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordRule::MissingDigit);
        }
        if !password.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(PasswordRule::MissingUppercase);
        }
        if !password.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(PasswordRule::MissingLowercase);
        }
        if self.require_symbol && !password.chars().any(|c| SYMBOLS.contains(c)) {
            return Err(PasswordRule::MissingSymbol);
        }
        Ok(())
    }
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Constant-time via bcrypt. A malformed stored hash never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Runs [`hash_password`] on the blocking pool.
pub async fn hash_in_background(password: String, cost: u32) -> AppResult<String> {
    let hash = tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))??;
    Ok(hash)
}

/// Runs [`verify_password`] on the blocking pool.
pub async fn verify_in_background(password: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_strong_password() {
        assert_eq!(PasswordPolicy::default().check("Str0ng!Password"), Ok(()));
    }

    #[test]
    fn each_rule_has_its_own_failure() {
        let policy = PasswordPolicy::default();
        assert_eq!(policy.check("Sh0rt!"), Err(PasswordRule::TooShort));
        assert_eq!(policy.check("Abcdefgh!"), Err(PasswordRule::MissingDigit));
        assert_eq!(policy.check("abcdefg1!"), Err(PasswordRule::MissingUppercase));
        assert_eq!(policy.check("ABCDEFG1!"), Err(PasswordRule::MissingLowercase));
        assert_eq!(policy.check("TestPassword123"), Err(PasswordRule::MissingSymbol));
    }

    #[test]
    fn exactly_eight_characters_is_too_short() {
        let policy = PasswordPolicy::default();
        assert_eq!(policy.check("Abcde1!x"), Err(PasswordRule::TooShort));
        assert_eq!(policy.check("Abcde1!xy"), Ok(()));
    }

    #[test]
    fn symbol_rule_can_be_disabled() {
        let config = AuthConfig {
            require_symbol: false,
            ..AuthConfig::default()
        };
        assert_eq!(PasswordPolicy::from(&config).check("TestPassword123"), Ok(()));
    }

    #[test]
    fn pound_and_not_signs_count_as_symbols() {
        let policy = PasswordPolicy::default();
        assert_eq!(policy.check("Password1£"), Ok(()));
        assert_eq!(policy.check("Password1¬"), Ok(()));
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("john.doe@example.com"));
        assert!(is_valid_email("a+tag@sub.example.io"));
        assert!(!is_valid_email("john.doe"));
        assert!(!is_valid_email("john@localhost"));
        assert!(!is_valid_email("john doe@example.com"));
        assert!(!is_valid_email("ada@example.com and more"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn hash_round_trip() {
        let hash = hash_password("Str0ng!Password", 4).unwrap();
        assert!(verify_password("Str0ng!Password", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("Str0ng!Password", "not-a-hash"));
    }

    #[test]
    fn rule_messages_are_distinct() {
        let rules = [
            PasswordRule::TooShort,
            PasswordRule::MissingDigit,
            PasswordRule::MissingUppercase,
            PasswordRule::MissingLowercase,
            PasswordRule::MissingSymbol,
        ];
        let mut messages: Vec<_> = rules.iter().map(|r| r.to_string()).collect();
        messages.sort();
        messages.dedup();
        assert_eq!(messages.len(), rules.len());
    }
}
