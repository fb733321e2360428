use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

fn deserialize_test_types<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrVec {
        String(String),
        Vec(Vec<String>),
    }

    let raw = match StringOrVec::deserialize(deserializer)? {
        // Ingestion stores tags as a single comma-separated string
        StringOrVec::String(s) => s.split(',').map(str::to_string).collect(),
        StringOrVec::Vec(v) => v,
    };

    Ok(raw
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect())
}

fn deserialize_support_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrBool {
        String(String),
        Bool(bool),
    }

    match StringOrBool::deserialize(deserializer)? {
        StringOrBool::Bool(b) => Ok(b),
        StringOrBool::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "y" => Ok(true),
            "no" | "false" | "n" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid support flag '{}'",
                other
            ))),
        },
    }
}

/// Assessment length in minutes, or unknown when the catalog page did not
/// state one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Duration {
    Minutes(u32),
    #[default]
    Unknown,
}

impl Duration {
    pub fn minutes(&self) -> Option<u32> {
        match self {
            Duration::Minutes(m) => Some(*m),
            Duration::Unknown => None,
        }
    }
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Duration::Minutes(m) => serializer.serialize_u32(*m),
            Duration::Unknown => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrInt {
            Int(i64),
            String(String),
            Null,
        }

        match StringOrInt::deserialize(deserializer)? {
            StringOrInt::Int(i) if i >= 0 => u32::try_from(i)
                .map(Duration::Minutes)
                .map_err(serde::de::Error::custom),
            StringOrInt::Int(i) => Err(serde::de::Error::custom(format!(
                "duration cannot be negative: {}",
                i
            ))),
            StringOrInt::String(s) => {
                let s = s.trim();
                if s.is_empty() || s.eq_ignore_ascii_case("unknown") {
                    Ok(Duration::Unknown)
                } else {
                    u32::from_str(s)
                        .map(Duration::Minutes)
                        .map_err(serde::de::Error::custom)
                }
            }
            StringOrInt::Null => Ok(Duration::Unknown),
        }
    }
}

/// One product of the assessment catalog together with its precomputed
/// embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "duration_minutes", default)]
    pub duration: Duration,
    #[serde(deserialize_with = "deserialize_test_types")]
    pub test_type: Vec<String>,
    #[serde(default, deserialize_with = "deserialize_support_flag")]
    pub adaptive_support: bool,
    #[serde(default, deserialize_with = "deserialize_support_flag")]
    pub remote_support: bool,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

impl CatalogItem {
    /// Text submitted to the embedding provider at ingestion time.
    pub fn searchable_text(&self) -> String {
        format!(
            "Product Name: {}\nTest Type: {}\nDescription: {}",
            self.name,
            self.test_type.join(", "),
            self.description
        )
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "Yes" } else { "No" }.to_string()
}

/// Response shape of a single recommended assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub name: String,
    pub url: String,
    pub adaptive_support: String,
    pub description: String,
    pub duration: Option<u32>,
    pub remote_support: String,
    pub test_type: Vec<String>,
}

impl From<&CatalogItem> for Recommendation {
    fn from(item: &CatalogItem) -> Self {
        Self {
            name: item.name.clone(),
            url: item.url.clone(),
            adaptive_support: yes_no(item.adaptive_support),
            description: item.description.clone(),
            duration: item.duration.minutes(),
            remote_support: yes_no(item.remote_support),
            test_type: item.test_type.clone(),
        }
    }
}
