use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub i64);

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier shared by every version of one campaign.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateGroupId(pub String);

impl TemplateGroupId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for TemplateGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    FixedAmount,
    Percentage,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedAmount => "FIXED_AMOUNT",
            Self::Percentage => "PERCENTAGE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "FIXED_AMOUNT" => Some(Self::FixedAmount),
            "PERCENTAGE" => Some(Self::Percentage),
            _ => None,
        }
    }
}

/// One immutable version of a promotion definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionTemplate {
    pub id: TemplateId,
    pub group_id: TemplateGroupId,
    pub version: i32,
    pub name: String,
    pub description: String,
    pub promotion_type: String,
    /// Engine-specific syntax; empty means the template always matches.
    pub rule_definition: String,
    pub discount_type: DiscountType,
    /// Serialized strategy parameters, e.g. `{"threshold":20000,"amount":2000}`.
    pub discount_properties: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_exclusive: bool,
    /// Higher is preferred. Reserved: offer selection does not consult it.
    pub priority: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromotionTemplate {
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= now && now <= self.end_date
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now > self.end_date
    }

    /// Draft of the version that supersedes this one. `promotion_type` carries over.
    pub fn next_version(&self, revision: TemplateRevision) -> TemplateDraft {
        TemplateDraft {
            group_id: self.group_id.clone(),
            version: self.version + 1,
            name: revision.name,
            description: revision.description,
            promotion_type: self.promotion_type.clone(),
            rule_definition: revision.rule_definition,
            discount_type: revision.discount_type,
            discount_properties: revision.discount_properties,
            start_date: revision.start_date,
            end_date: revision.end_date,
            is_exclusive: revision.is_exclusive,
            priority: revision.priority,
            is_active: true,
        }
    }
}

/// A template that has not been persisted yet; the repository assigns its id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDraft {
    pub group_id: TemplateGroupId,
    pub version: i32,
    pub name: String,
    pub description: String,
    pub promotion_type: String,
    pub rule_definition: String,
    pub discount_type: DiscountType,
    pub discount_properties: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_exclusive: bool,
    pub priority: i32,
    pub is_active: bool,
}

impl TemplateDraft {
    pub fn into_template(
        self,
        id: TemplateId,
        created_at: DateTime<Utc>,
    ) -> PromotionTemplate {
        PromotionTemplate {
            id,
            group_id: self.group_id,
            version: self.version,
            name: self.name,
            description: self.description,
            promotion_type: self.promotion_type,
            rule_definition: self.rule_definition,
            discount_type: self.discount_type,
            discount_properties: self.discount_properties,
            start_date: self.start_date,
            end_date: self.end_date,
            is_exclusive: self.is_exclusive,
            priority: self.priority,
            is_active: self.is_active,
            created_at,
            updated_at: created_at,
        }
    }
}

/// Editable fields of a campaign revision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateRevision {
    pub name: String,
    pub description: String,
    pub rule_definition: String,
    pub discount_type: DiscountType,
    pub discount_properties: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_exclusive: bool,
    pub priority: i32,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{
        DiscountType, PromotionTemplate, TemplateGroupId, TemplateId, TemplateRevision,
    };

    fn template() -> PromotionTemplate {
        let now = Utc::now();
        PromotionTemplate {
            id: TemplateId(1),
            group_id: TemplateGroupId("grp-1".to_string()),
            version: 1,
            name: "Spring sale".to_string(),
            description: "12% off".to_string(),
            promotion_type: "STORE_COUPON".to_string(),
            rule_definition: String::new(),
            discount_type: DiscountType::Percentage,
            discount_properties: r#"{"percentage":88,"ceiling":0}"#.to_string(),
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(30),
            is_exclusive: false,
            priority: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn discount_type_round_trips_from_storage_encoding() {
        for kind in [DiscountType::FixedAmount, DiscountType::Percentage] {
            assert_eq!(DiscountType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(DiscountType::parse(" percentage "), Some(DiscountType::Percentage));
        assert_eq!(DiscountType::parse("BUY_ONE_GET_ONE"), None);
    }

    #[test]
    fn availability_requires_active_flag_and_window() {
        let now = Utc::now();
        let mut template = template();
        assert!(template.is_available(now));

        template.is_active = false;
        assert!(!template.is_available(now));

        template.is_active = true;
        assert!(!template.is_available(template.end_date + Duration::seconds(1)));
        assert!(template.has_ended(template.end_date + Duration::seconds(1)));
        assert!(!template.is_available(template.start_date - Duration::seconds(1)));
    }

    #[test]
    fn next_version_keeps_group_and_promotion_type() {
        let current = template();
        let draft = current.next_version(TemplateRevision {
            name: "Spring sale v2".to_string(),
            description: "15% off".to_string(),
            rule_definition: "user.isVip".to_string(),
            discount_type: DiscountType::Percentage,
            discount_properties: r#"{"percentage":85,"ceiling":0}"#.to_string(),
            start_date: current.start_date,
            end_date: current.end_date,
            is_exclusive: true,
            priority: 5,
        });

        assert_eq!(draft.group_id, current.group_id);
        assert_eq!(draft.version, 2);
        assert_eq!(draft.promotion_type, "STORE_COUPON");
        assert!(draft.is_active);
    }
}
