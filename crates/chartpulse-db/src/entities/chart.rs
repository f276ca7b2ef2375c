use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How often the provider publishes a new ranking for a chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "chart_frequency")]
pub enum ChartFrequency {
    #[sea_orm(string_value = "daily")]
    Daily,
    #[sea_orm(string_value = "weekly")]
    Weekly,
    #[sea_orm(string_value = "monthly")]
    Monthly,
}

impl ChartFrequency {
    pub fn as_str(&self) -> &str {
        match self {
            ChartFrequency::Daily => "daily",
            ChartFrequency::Weekly => "weekly",
            ChartFrequency::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(ChartFrequency::Daily),
            "weekly" => Some(ChartFrequency::Weekly),
            "monthly" => Some(ChartFrequency::Monthly),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChartFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "charts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    /// Provider chart slug, e.g. "spotify-top-200-fr"
    #[sea_orm(unique)]
    pub slug: String,
    pub platform: String,
    pub country_code: Option<String>,
    pub frequency: ChartFrequency,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::chart_ranking::Entity")]
    ChartRanking,
    #[sea_orm(has_many = "super::sync_schedule::Entity")]
    SyncSchedule,
    #[sea_orm(has_many = "super::sync_execution::Entity")]
    SyncExecution,
}

impl Related<super::chart_ranking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChartRanking.def()
    }
}

impl Related<super::sync_schedule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyncSchedule.def()
    }
}

impl Related<super::sync_execution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SyncExecution.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_as_str() {
        assert_eq!(ChartFrequency::Daily.as_str(), "daily");
        assert_eq!(ChartFrequency::Weekly.as_str(), "weekly");
        assert_eq!(ChartFrequency::Monthly.as_str(), "monthly");
    }

    #[test]
    fn test_frequency_parse() {
        assert_eq!(ChartFrequency::parse("daily"), Some(ChartFrequency::Daily));
        assert_eq!(
            ChartFrequency::parse("weekly"),
            Some(ChartFrequency::Weekly)
        );
        assert_eq!(
            ChartFrequency::parse("monthly"),
            Some(ChartFrequency::Monthly)
        );
        assert_eq!(ChartFrequency::parse("hourly"), None);
        assert_eq!(ChartFrequency::parse(""), None);
    }

    #[test]
    fn test_frequency_display_roundtrip() {
        for freq in [
            ChartFrequency::Daily,
            ChartFrequency::Weekly,
            ChartFrequency::Monthly,
        ] {
            assert_eq!(ChartFrequency::parse(&freq.to_string()), Some(freq));
        }
    }
}
