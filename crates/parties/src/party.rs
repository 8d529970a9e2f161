use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use benchledger_core::{CustomerId, DomainResult, Entity, SupplierId, TenantId, ValidationErrors};

const NAME_MAX: usize = 100;

/// Contact information for a party. Blank values are stored as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Input for registering a customer or supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewParty {
    pub name: String,
    #[serde(default)]
    pub contact: ContactInfo,
}

impl NewParty {
    pub fn validate(&self) -> DomainResult<()> {
        let mut errors = ValidationErrors::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.add("name", "Name is required");
        } else if name.chars().count() > NAME_MAX {
            errors.add("name", format!("Name must be at most {NAME_MAX} characters"));
        }

        if let Some(email) = non_blank(self.contact.email.as_deref()) {
            if !looks_like_email(&email) {
                errors.add("email", "Invalid email address");
            }
        }

        errors.into_result()
    }
}

/// A customer or supplier, tenant-scoped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party<I> {
    pub id: I,
    pub tenant_id: TenantId,
    pub name: String,
    pub contact: ContactInfo,
    pub created_at: DateTime<Utc>,
}

pub type Customer = Party<CustomerId>;
pub type Supplier = Party<SupplierId>;

impl<I> Party<I> {
    pub fn create(
        tenant_id: TenantId,
        id: I,
        input: &NewParty,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        input.validate()?;
        Ok(Self {
            id,
            tenant_id,
            name: input.name.trim().to_string(),
            contact: ContactInfo {
                email: non_blank(input.contact.email.as_deref()),
                phone: non_blank(input.contact.phone.as_deref()),
                address: non_blank(input.contact.address.as_deref()),
            },
            created_at: occurred_at,
        })
    }
}

impl<I> Entity for Party<I>
where
    I: Clone + Eq + core::hash::Hash + core::fmt::Debug,
{
    type Id = I;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
