//! Profile and Password Settings
//!
//! Descriptive authenticator capabilities.

use serde::Deserialize;
use std::collections::BTreeMap;

/// Display profile of an authenticator (masked email, phone number, ...).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Profile {
    values: BTreeMap<String, String>,
}

impl Profile {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }
}

/// Password policy of a password authenticator.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PasswordSettings {
    #[serde(default)]
    pub complexity: PasswordComplexity,
    #[serde(default)]
    pub age: Option<PasswordAge>,
    #[serde(default)]
    pub days_to_expiry: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordComplexity {
    pub min_length: u32,
    pub min_lower_case: u32,
    pub min_upper_case: u32,
    pub min_number: u32,
    pub min_symbol: u32,
    pub exclude_username: bool,
    pub exclude_attributes: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordAge {
    pub min_age_minutes: u32,
    pub history_count: u32,
}

/// A complexity rule a candidate password does not meet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PasswordRequirement {
    MinLength(u32),
    MinLowerCase(u32),
    MinUpperCase(u32),
    MinNumber(u32),
    MinSymbol(u32),
    ExcludeUsername,
}

impl PasswordSettings {
    /// Rules the candidate fails. History and age rules are server-side only.
    pub fn unmet_requirements(
        &self,
        password: &str,
        username: Option<&str>,
    ) -> Vec<PasswordRequirement> {
        let rules = &self.complexity;
        let count = |predicate: fn(&char) -> bool| password.chars().filter(predicate).count() as u32;

        let mut unmet = Vec::new();
        if (password.chars().count() as u32) < rules.min_length {
            unmet.push(PasswordRequirement::MinLength(rules.min_length));
        }
        if count(char::is_ascii_lowercase) < rules.min_lower_case {
            unmet.push(PasswordRequirement::MinLowerCase(rules.min_lower_case));
        }
        if count(char::is_ascii_uppercase) < rules.min_upper_case {
            unmet.push(PasswordRequirement::MinUpperCase(rules.min_upper_case));
        }
        if count(char::is_ascii_digit) < rules.min_number {
            unmet.push(PasswordRequirement::MinNumber(rules.min_number));
        }
        if count(|c| !c.is_alphanumeric() && !c.is_whitespace()) < rules.min_symbol {
            unmet.push(PasswordRequirement::MinSymbol(rules.min_symbol));
        }
        if rules.exclude_username {
            let local = username.map(|u| u.split('@').next().unwrap_or(u));
            if let Some(local) = local.filter(|l| !l.is_empty()) {
                if password.to_lowercase().contains(&local.to_lowercase()) {
                    unmet.push(PasswordRequirement::ExcludeUsername);
                }
            }
        }
        unmet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> PasswordSettings {
        serde_json::from_str(
            r#"{
                "complexity": {
                    "minLength": 8,
                    "minLowerCase": 1,
                    "minUpperCase": 1,
                    "minNumber": 1,
                    "minSymbol": 0,
                    "excludeUsername": true,
                    "excludeAttributes": []
                },
                "age": { "minAgeMinutes": 0, "historyCount": 4 }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_settings_parse() {
        let settings = settings();
        assert_eq!(settings.complexity.min_length, 8);
        assert_eq!(settings.age.map(|a| a.history_count), Some(4));
    }

    #[test]
    fn test_unmet_requirements() {
        let settings = settings();
        assert_eq!(
            settings.unmet_requirements("short", None),
            vec![
                PasswordRequirement::MinLength(8),
                PasswordRequirement::MinUpperCase(1),
                PasswordRequirement::MinNumber(1),
            ]
        );
        assert!(settings
            .unmet_requirements("Tr0ub4dor&3", Some("mary@example.com"))
            .is_empty());
        assert_eq!(
            settings.unmet_requirements("Mary12345", Some("mary@example.com")),
            vec![PasswordRequirement::ExcludeUsername]
        );
    }
}
