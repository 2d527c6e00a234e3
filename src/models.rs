use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One blood-sugar reading (mg/dL) and the instant it was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "bloodSugar", deserialize_with = "deserialize_level")]
    pub blood_sugar: f64,
    #[serde(with = "iso_date")]
    pub date: DateTime<Utc>,
}

impl Record {
    pub fn new(blood_sugar: f64, date: DateTime<Utc>) -> Self {
        Self {
            blood_sugar,
            date: date.trunc_subsecs(3),
        }
    }
}

/// Formats a timestamp the way record keys and values carry it.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

mod iso_date {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_date(date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_date(&raw).ok_or_else(|| de::Error::custom(format!("invalid date '{raw}'")))
    }
}

/// Stored values may carry the level as a number or as the raw form string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LevelInput {
    Number(f64),
    Text(String),
}

impl LevelInput {
    pub fn parse(&self) -> Option<f64> {
        let value = match self {
            LevelInput::Number(value) => *value,
            LevelInput::Text(text) => text.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

fn deserialize_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    LevelInput::deserialize(deserializer)?
        .parse()
        .ok_or_else(|| serde::de::Error::custom("bloodSugar is not a finite number"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Preset trailing windows offered by the A1c menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Weekly,
    Monthly,
    Quarterly,
    #[serde(alias = "semi-annual")]
    Semiannual,
}

impl Window {
    pub const ALL: [Window; 4] = [
        Window::Weekly,
        Window::Monthly,
        Window::Quarterly,
        Window::Semiannual,
    ];

    pub fn months(self) -> f64 {
        match self {
            Window::Weekly => 0.25,
            Window::Monthly => 1.0,
            Window::Quarterly => 3.0,
            Window::Semiannual => 6.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Window::Weekly => "weekly",
            Window::Monthly => "monthly",
            Window::Quarterly => "quarterly",
            Window::Semiannual => "semiannual",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Window::Weekly => "last week",
            Window::Monthly => "last month",
            Window::Quarterly => "last 3 months",
            Window::Semiannual => "last 6 months",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddRecordRequest {
    #[serde(rename = "bloodSugar", default)]
    pub blood_sugar: Option<LevelInput>,
}

#[derive(Debug, Deserialize)]
pub struct EditRecordRequest {
    #[serde(rename = "bloodSugar", default)]
    pub blood_sugar: Option<LevelInput>,
    #[serde(default)]
    pub date: Option<String>,
}

/// HTML form fallback; browsers always submit the field as text.
#[derive(Debug, Deserialize)]
pub struct AddRecordForm {
    #[serde(rename = "bloodSugar", default)]
    pub blood_sugar: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    pub order: Option<SortOrder>,
}

#[derive(Debug, Deserialize)]
pub struct A1cQuery {
    pub window: Option<Window>,
    pub months: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordsResponse {
    pub records: Vec<Record>,
}

/// Result of an A1c query; an empty window is reported, never averaged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum A1cOutcome {
    Estimate {
        window_months: f64,
        records: usize,
        average_glucose: f64,
        a1c: f64,
        display: String,
    },
    InsufficientData {
        window_months: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct ChartResponse {
    pub y_max: f64,
    pub points: Vec<ChartPoint>,
}
