use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use oms_core::{CustomerId, DomainError, DomainResult, Entity};

/// Longest accepted customer name (matches the `name` column).
pub const MAX_NAME_LEN: usize = 255;
/// Longest accepted email address.
pub const MAX_EMAIL_LEN: usize = 255;
/// Longest accepted phone number.
pub const MAX_PHONE_LEN: usize = 64;

/// Contact information for a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ContactInfo {
    fn normalized(self) -> DomainResult<Self> {
        let email = non_blank(self.email);
        let phone = non_blank(self.phone);

        check_len("email", email.as_deref(), MAX_EMAIL_LEN)?;
        check_len("phone", phone.as_deref(), MAX_PHONE_LEN)?;

        if let Some(email) = &email {
            let valid = email
                .split_once('@')
                .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
            if !valid {
                return Err(DomainError::validation(format!("invalid email '{email}'")));
            }
        }

        Ok(Self { email, phone })
    }
}

fn check_len(field: &str, value: Option<&str>, max: usize) -> DomainResult<()> {
    match value {
        Some(v) if v.len() > max => Err(DomainError::validation(format!(
            "{field} cannot exceed {max} characters"
        ))),
        _ => Ok(()),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A customer in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    #[serde(flatten)]
    pub contact: ContactInfo,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn summary(&self) -> CustomerSummary {
        CustomerSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.contact.email.clone(),
            phone: self.contact.phone.clone(),
        }
    }
}

impl Entity for Customer {
    type Id = CustomerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Customer display fields joined onto order headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub id: CustomerId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Command: RegisterCustomer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterCustomer {
    pub name: String,
    pub contact: ContactInfo,
}

impl RegisterCustomer {
    pub fn normalized(self) -> DomainResult<Self> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        check_len("name", Some(&name), MAX_NAME_LEN)?;
        Ok(Self {
            name,
            contact: self.contact.normalized()?,
        })
    }
}
