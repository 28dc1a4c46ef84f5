//! Base contract for contacts

use chrono::{NaiveDate, Utc};
use cm_core::error::ValidationErrors;
use cm_models::Contact;
use regex::Regex;
use std::sync::LazyLock;

use crate::base::{Contract, UserContext, ValidationResult};

/// Digits, spaces and the usual phone punctuation
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9+()\-. ]{3,32}$").unwrap());

const MAX_NAME_LENGTH: usize = 100;
const MAX_COMPANY_LENGTH: usize = 200;

/// Base contract for contacts with common validations
pub struct ContactBaseContract<'a, U: UserContext> {
    user: &'a U,
    today: NaiveDate,
}

impl<'a, U: UserContext> ContactBaseContract<'a, U> {
    pub fn new(user: &'a U) -> Self {
        Self {
            user,
            today: Utc::now().date_naive(),
        }
    }

    /// Use a fixed reference date for birthday checks
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn validate_names(&self, contact: &Contact, errors: &mut ValidationErrors) {
        if contact.first_name.trim().is_empty() && contact.last_name.trim().is_empty() {
            errors.add("base", "First name or last name must be present");
        }

        for (field, value) in [
            ("firstName", Some(contact.first_name.as_str())),
            ("middleName", contact.middle_name.as_deref()),
            ("lastName", Some(contact.last_name.as_str())),
        ] {
            if value.is_some_and(|v| v.chars().count() > MAX_NAME_LENGTH) {
                errors.add(
                    field,
                    format!("is too long (maximum is {} characters)", MAX_NAME_LENGTH),
                );
            }
        }
    }

    pub fn validate_phone(&self, phone: Option<&str>, errors: &mut ValidationErrors) {
        let Some(phone) = phone.map(str::trim).filter(|p| !p.is_empty()) else {
            return;
        };

        if !PHONE_PATTERN.is_match(phone) || !phone.chars().any(|c| c.is_ascii_digit()) {
            errors.add("phone", "is not a valid phone number");
        }
    }

    pub fn validate_company(&self, company: Option<&str>, errors: &mut ValidationErrors) {
        if company.is_some_and(|c| c.chars().count() > MAX_COMPANY_LENGTH) {
            errors.add(
                "company",
                format!("is too long (maximum is {} characters)", MAX_COMPANY_LENGTH),
            );
        }
    }

    pub fn validate_birthday(&self, birthday: Option<NaiveDate>, errors: &mut ValidationErrors) {
        let Some(birthday) = birthday else {
            return;
        };

        if birthday > self.today {
            errors.add("birthday", "can't be in the future");
        } else if birthday < earliest_birthday() {
            errors.add("birthday", "must be on or after 1900-01-01");
        }
    }

    /// Get the user context
    pub fn user(&self) -> &'a U {
        self.user
    }
}

fn earliest_birthday() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

impl<'a, U: UserContext> Contract<Contact> for ContactBaseContract<'a, U> {
    fn validate(&self, contact: &Contact) -> ValidationResult {
        let mut errors = ValidationErrors::new();

        self.validate_names(contact, &mut errors);
        self.validate_phone(contact.phone.as_deref(), &mut errors);
        self.validate_company(contact.company.as_deref(), &mut errors);
        self.validate_birthday(contact.birthday, &mut errors);

        errors.into_result()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::contact;
    use super::*;
    use crate::base::test_support::MockUserContext;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[test]
    fn test_valid_contact() {
        let ctx = MockUserContext::user(1);
        let contract = ContactBaseContract::new(&ctx).with_today(today());
        assert!(contract.validate(&contact(1)).is_ok());
    }

    #[test]
    fn test_name_required() {
        let ctx = MockUserContext::user(1);
        let contract = ContactBaseContract::new(&ctx).with_today(today());

        let mut c = contact(1);
        c.first_name = " ".into();
        c.last_name = String::new();

        let errors = contract.validate(&c).unwrap_err();
        assert!(errors.has_error("base"));
    }

    #[test]
    fn test_last_name_alone_is_enough() {
        let ctx = MockUserContext::user(1);
        let contract = ContactBaseContract::new(&ctx).with_today(today());

        let mut c = contact(1);
        c.first_name = String::new();
        assert!(contract.validate(&c).is_ok());
    }

    #[test]
    fn test_invalid_phone() {
        let ctx = MockUserContext::user(1);
        let contract = ContactBaseContract::new(&ctx).with_today(today());

        for phone in ["call me", "--", "12"] {
            let mut c = contact(1);
            c.phone = Some(phone.into());
            let errors = contract.validate(&c).unwrap_err();
            assert!(errors.has_error("phone"), "{}", phone);
        }

        let mut c = contact(1);
        c.phone = Some(String::new());
        assert!(contract.validate(&c).is_ok());
    }

    #[test]
    fn test_birthday_bounds() {
        let ctx = MockUserContext::user(1);
        let contract = ContactBaseContract::new(&ctx).with_today(today());

        let mut c = contact(1);
        c.birthday = NaiveDate::from_ymd_opt(2025, 1, 2);
        assert!(contract.validate(&c).unwrap_err().has_error("birthday"));

        c.birthday = NaiveDate::from_ymd_opt(1899, 12, 31);
        assert!(contract.validate(&c).unwrap_err().has_error("birthday"));

        c.birthday = Some(today());
        assert!(contract.validate(&c).is_ok());
    }

    #[test]
    fn test_company_too_long() {
        let ctx = MockUserContext::user(1);
        let contract = ContactBaseContract::new(&ctx).with_today(today());

        let mut c = contact(1);
        c.company = Some("x".repeat(201));
        assert!(contract.validate(&c).unwrap_err().has_error("company"));
    }
}
