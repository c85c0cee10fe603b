use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::ServiceKind;
use crate::common::{GeoPoint, PartnerId};

/// Driver, mechanic or facility as read by the candidate locator
///
/// Presence fields (`is_online`, `current_location`, `last_seen`) are written by
/// the partner's own heartbeat; the dispatcher only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    pub id: PartnerId,
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub name: Option<String>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub current_location: Option<GeoPoint>,
    /// Absent from a document means no heartbeat yet, read as offline
    #[builder(default = true)]
    #[serde(default)]
    pub is_online: bool,
    /// Vehicle type for drivers ("auto", "sedan_ac", ...); unused for facilities
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub service_compatibility: Option<String>,
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub gender: Option<String>,
    #[builder(default)]
    #[serde(default)]
    pub women_only_certified: bool,
    #[builder(default, setter(strip_option, into))]
    #[serde(default)]
    pub push_token: Option<String>,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

impl Partner {
    /// Female and certified for women-only rides
    pub fn is_women_only_eligible(&self) -> bool {
        self.women_only_certified
            && self
                .gender
                .as_deref()
                .is_some_and(|g| g.eq_ignore_ascii_case("female"))
    }

    /// Whether this partner can serve a request of the given service class
    ///
    /// No class on the request means any partner of the kind qualifies. Otherwise
    /// the partner's vehicle type must start with the class, ignoring case.
    pub fn is_compatible_with(&self, service_class: Option<&str>) -> bool {
        let Some(class) = service_class.map(str::trim).filter(|c| !c.is_empty()) else {
            return true;
        };

        self.service_compatibility
            .as_deref()
            .is_some_and(|vehicle| vehicle.to_lowercase().starts_with(&class.to_lowercase()))
    }

    /// Push token, ignoring blank strings left behind by logged-out apps
    pub fn notification_token(&self) -> Option<&str> {
        self.push_token.as_deref().filter(|t| !t.trim().is_empty())
    }
}

#[derive(sqlx::FromRow)]
struct PartnerRow {
    id: Uuid,
    name: Option<String>,
    current_lat: Option<f64>,
    current_lng: Option<f64>,
    is_online: bool,
    service_compatibility: Option<String>,
    gender: Option<String>,
    women_only_certified: bool,
    push_token: Option<String>,
    last_seen: Option<DateTime<Utc>>,
}

impl From<PartnerRow> for Partner {
    fn from(row: PartnerRow) -> Self {
        let current_location = match (row.current_lat, row.current_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        };

        Self {
            id: PartnerId::from_uuid(row.id),
            name: row.name,
            current_location,
            is_online: row.is_online,
            service_compatibility: row.service_compatibility,
            gender: row.gender,
            women_only_certified: row.women_only_certified,
            push_token: row.push_token,
            last_seen: row.last_seen,
        }
    }
}

impl Partner {
    /// Find all online partners of a kind
    ///
    /// Women-only requests push the gender/certification filter into the query.
    pub async fn find_online(
        kind: ServiceKind,
        women_only: bool,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        let eligibility = if women_only {
            " AND lower(gender) = 'female' AND women_only_certified = true"
        } else {
            ""
        };

        let rows = sqlx::query_as::<_, PartnerRow>(&format!(
            "SELECT * FROM {} WHERE is_online = true{}",
            kind.partners_table(),
            eligibility
        ))
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Insert a partner document
    pub async fn insert(&self, kind: ServiceKind, pool: &PgPool) -> Result<Self> {
        let row = sqlx::query_as::<_, PartnerRow>(&format!(
            "INSERT INTO {} (
                id,
                name,
                current_lat,
                current_lng,
                is_online,
                service_compatibility,
                gender,
                women_only_certified,
                push_token,
                last_seen
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING *",
            kind.partners_table()
        ))
        .bind(self.id)
        .bind(&self.name)
        .bind(self.current_location.map(|p| p.latitude))
        .bind(self.current_location.map(|p| p.longitude))
        .bind(self.is_online)
        .bind(&self.service_compatibility)
        .bind(&self.gender)
        .bind(self.women_only_certified)
        .bind(&self.push_token)
        .bind(self.last_seen)
        .fetch_one(pool)
        .await?;

        Ok(row.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatibility_is_case_insensitive_prefix() {
        let driver = Partner::builder()
            .id(PartnerId::new())
            .service_compatibility("Sedan_AC")
            .build();

        assert!(driver.is_compatible_with(Some("sedan")));
        assert!(driver.is_compatible_with(Some("SEDAN_ac")));
        assert!(driver.is_compatible_with(None));
        assert!(!driver.is_compatible_with(Some("auto")));
    }

    #[test]
    fn test_partner_without_vehicle_only_matches_classless_requests() {
        let mechanic = Partner::builder().id(PartnerId::new()).build();

        assert!(mechanic.is_compatible_with(None));
        assert!(mechanic.is_compatible_with(Some("  ")));
        assert!(!mechanic.is_compatible_with(Some("bike")));
    }

    #[test]
    fn test_women_only_eligibility_needs_both_flags() {
        let certified = Partner::builder()
            .id(PartnerId::new())
            .gender("Female")
            .women_only_certified(true)
            .build();
        let uncertified = Partner::builder()
            .id(PartnerId::new())
            .gender("female")
            .build();
        let male = Partner::builder()
            .id(PartnerId::new())
            .gender("male")
            .women_only_certified(true)
            .build();

        assert!(certified.is_women_only_eligible());
        assert!(!uncertified.is_women_only_eligible());
        assert!(!male.is_women_only_eligible());
    }

    #[test]
    fn test_blank_push_token_is_not_a_token() {
        let partner = Partner::builder()
            .id(PartnerId::new())
            .push_token(" ")
            .build();
        assert_eq!(partner.notification_token(), None);
    }

    #[test]
    fn test_document_without_presence_fields_deserializes_offline() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "name": "Sharma Motors",
            "pushToken": "ExponentPushToken[abc]"
        });

        let partner: Partner = serde_json::from_value(json).unwrap();

        assert!(!partner.is_online);
        assert_eq!(partner.current_location, None);
        assert_eq!(partner.notification_token(), Some("ExponentPushToken[abc]"));
    }
}
