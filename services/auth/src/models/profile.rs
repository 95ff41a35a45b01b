//! User profile model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Contact and shipping details, one per user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn empty(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            phone: String::new(),
            address: String::new(),
            city: String::new(),
            postal_code: String::new(),
            country: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, changes: &UpdateProfile) {
        if let Some(phone) = &changes.phone {
            self.phone = phone.clone();
        }
        if let Some(address) = &changes.address {
            self.address = address.clone();
        }
        if let Some(city) = &changes.city {
            self.city = city.clone();
        }
        if let Some(postal_code) = &changes.postal_code {
            self.postal_code = postal_code.clone();
        }
        if let Some(country) = &changes.country {
            self.country = country.clone();
        }
        self.updated_at = Utc::now();
    }
}

/// Partial profile update
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateProfile {
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}
