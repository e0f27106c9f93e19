use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Spending category (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Transport,
    Shopping,
    Entertainment,
    Bills,
    Health,
    Other,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Food,
        Category::Transport,
        Category::Shopping,
        Category::Entertainment,
        Category::Bills,
        Category::Health,
        Category::Other,
    ];

    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "food" => Ok(Category::Food),
            "transport" => Ok(Category::Transport),
            "shopping" => Ok(Category::Shopping),
            "entertainment" => Ok(Category::Entertainment),
            "bills" => Ok(Category::Bills),
            "health" => Ok(Category::Health),
            "other" => Ok(Category::Other),
            _ => Err(format!("Invalid category: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Transport => "transport",
            Category::Shopping => "shopping",
            Category::Entertainment => "entertainment",
            Category::Bills => "bills",
            Category::Health => "health",
            Category::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

/// Coarse bucket of the local hour a transaction happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    LateNight,
}

impl TimeOfDay {
    /// 05-11 morning, 12-16 afternoon, 17-20 evening, anything else late night
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::LateNight,
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "morning" => Ok(TimeOfDay::Morning),
            "afternoon" => Ok(TimeOfDay::Afternoon),
            "evening" => Ok(TimeOfDay::Evening),
            "late_night" => Ok(TimeOfDay::LateNight),
            _ => Err(format!("Invalid time of day: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
            TimeOfDay::LateNight => "late_night",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "sunday" => Ok(DayOfWeek::Sunday),
            "monday" => Ok(DayOfWeek::Monday),
            "tuesday" => Ok(DayOfWeek::Tuesday),
            "wednesday" => Ok(DayOfWeek::Wednesday),
            "thursday" => Ok(DayOfWeek::Thursday),
            "friday" => Ok(DayOfWeek::Friday),
            "saturday" => Ok(DayOfWeek::Saturday),
            _ => Err(format!("Invalid day of week: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Sunday => "sunday",
            DayOfWeek::Monday => "monday",
            DayOfWeek::Tuesday => "tuesday",
            DayOfWeek::Wednesday => "wednesday",
            DayOfWeek::Thursday => "thursday",
            DayOfWeek::Friday => "friday",
            DayOfWeek::Saturday => "saturday",
        }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self, DayOfWeek::Saturday | DayOfWeek::Sunday)
    }

    /// Position in a Monday-first week (Mon = 0 .. Sun = 6)
    pub fn monday_index(&self) -> usize {
        match self {
            DayOfWeek::Monday => 0,
            DayOfWeek::Tuesday => 1,
            DayOfWeek::Wednesday => 2,
            DayOfWeek::Thursday => 3,
            DayOfWeek::Friday => 4,
            DayOfWeek::Saturday => 5,
            DayOfWeek::Sunday => 6,
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Sun => DayOfWeek::Sunday,
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
        }
    }
}

/// User-supplied context attached after the fact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextTag {
    WorkStress,
    Celebration,
    Guests,
    FeelingUnwell,
    Boredom,
    Custom,
}

impl ContextTag {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "work_stress" => Ok(ContextTag::WorkStress),
            "celebration" => Ok(ContextTag::Celebration),
            "guests" => Ok(ContextTag::Guests),
            "feeling_unwell" => Ok(ContextTag::FeelingUnwell),
            "boredom" => Ok(ContextTag::Boredom),
            "custom" => Ok(ContextTag::Custom),
            _ => Err(format!("Invalid context tag: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextTag::WorkStress => "work_stress",
            ContextTag::Celebration => "celebration",
            ContextTag::Guests => "guests",
            ContextTag::FeelingUnwell => "feeling_unwell",
            ContextTag::Boredom => "boredom",
            ContextTag::Custom => "custom",
        }
    }

    /// Human phrasing used inside narratives
    pub fn label(&self) -> &'static str {
        match self {
            ContextTag::WorkStress => "work stress",
            ContextTag::Celebration => "celebration",
            ContextTag::Guests => "guests",
            ContextTag::FeelingUnwell => "feeling unwell",
            ContextTag::Boredom => "boredom",
            ContextTag::Custom => "personal context",
        }
    }
}

/// A single spending event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub amount: Decimal,
    pub merchant: String,
    pub category: Category,
    pub time_of_day: TimeOfDay,
    pub day_of_week: DayOfWeek,
    pub is_recurring: bool,
    pub context_tags: Vec<ContextTag>,
    pub custom_note: Option<String>,
}

/// Ingestion payload; derived fields are filled in by `into_transaction`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub timestamp: DateTime<Utc>,
    pub amount: Decimal,
    pub merchant: String,
    pub category: Category,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub context_tags: Vec<ContextTag>,
    #[serde(default)]
    pub custom_note: Option<String>,
}

impl NewTransaction {
    pub fn validate(&self) -> Result<(), String> {
        if self.amount <= Decimal::ZERO {
            return Err("Amount must be greater than zero".to_string());
        }
        if self.merchant.trim().is_empty() {
            return Err("Merchant must not be empty".to_string());
        }
        Ok(())
    }

    /// Stamp identity and derive the local time-of-day and weekday buckets
    pub fn into_transaction(self, user_id: Uuid, offset: FixedOffset) -> Transaction {
        let local = self.timestamp.with_timezone(&offset);
        let mut context_tags = Vec::new();
        for tag in self.context_tags {
            if !context_tags.contains(&tag) {
                context_tags.push(tag);
            }
        }

        Transaction {
            id: Uuid::new_v4(),
            user_id,
            timestamp: self.timestamp,
            amount: self.amount,
            merchant: self.merchant.trim().to_string(),
            category: self.category,
            time_of_day: TimeOfDay::from_hour(local.hour()),
            day_of_week: DayOfWeek::from(local.weekday()),
            is_recurring: self.is_recurring,
            context_tags,
            custom_note: self.custom_note,
        }
    }
}
