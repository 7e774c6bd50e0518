//! Declarative field rules for request bodies.
//!
//! A [`Validator`] runs every rule it holds and reports all failures in
//! declaration order, not just the first one.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

/// Read access to named string fields of a candidate input.
pub trait Fields {
    fn field(&self, name: &str) -> Option<&str>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Email,
    MinLength(usize),
    NotEmpty,
}

impl Rule {
    fn check(&self, value: &str) -> bool {
        match self {
            Rule::Email => is_valid_email(value),
            Rule::MinLength(min) => value.chars().count() >= *min,
            Rule::NotEmpty => !value.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub msg: &'static str,
    pub path: &'static str,
    pub location: &'static str,
}

#[derive(Debug, Clone)]
struct FieldRule {
    field: &'static str,
    rule: Rule,
    message: &'static str,
    optional: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: Vec<FieldRule>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule that also applies when the field is absent (checked as "").
    pub fn rule(mut self, field: &'static str, rule: Rule, message: &'static str) -> Self {
        self.rules.push(FieldRule {
            field,
            rule,
            message,
            optional: false,
        });
        self
    }

    /// Adds a rule that is skipped when the field is absent.
    pub fn optional(mut self, field: &'static str, rule: Rule, message: &'static str) -> Self {
        self.rules.push(FieldRule {
            field,
            rule,
            message,
            optional: true,
        });
        self
    }

    pub fn validate<F: Fields + ?Sized>(&self, input: &F) -> Result<(), Vec<FieldError>> {
        let errors: Vec<FieldError> = self
            .rules
            .iter()
            .filter_map(|r| {
                let value = match input.field(r.field) {
                    Some(v) => v,
                    None if r.optional => return None,
                    None => "",
                };
                (!r.rule.check(value)).then_some(FieldError {
                    kind: "field",
                    msg: r.message,
                    path: r.field,
                    location: "body",
                })
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}
