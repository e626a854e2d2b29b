//! Entry content
//!
//! The editable part of a diary entry. Drafts hold it while it is being
//! edited and versions freeze a copy of it.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Where an entry was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Reverse-geocoded place name, if the lookup succeeded
    pub place_name: Option<String>,
}

impl Location {
    /// Create a location from coordinates
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            place_name: None,
        }
    }

    /// Set the place name
    pub fn with_place_name(mut self, name: impl Into<String>) -> Self {
        self.place_name = Some(name.into());
        self
    }
}

/// Weather at the time of writing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    /// Short condition text, e.g. "Clear" or "Light rain"
    pub condition: String,
    /// Temperature in degrees Celsius
    pub temperature_celsius: Option<f64>,
}

impl Weather {
    /// Create a weather record
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            temperature_celsius: None,
        }
    }

    /// Set the temperature
    pub fn with_temperature(mut self, celsius: f64) -> Self {
        self.temperature_celsius = Some(celsius);
        self
    }
}

/// Editable fields of a diary entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryFields {
    /// Entry title
    pub title: String,
    /// Calendar date the entry belongs to
    pub date: NaiveDate,
    /// Entry body
    pub content: String,
    /// Optional location enrichment
    pub location: Option<Location>,
    /// Optional weather enrichment
    pub weather: Option<Weather>,
}

impl EntryFields {
    /// Create empty fields for the given date
    pub fn new(date: NaiveDate) -> Self {
        Self {
            title: String::new(),
            date,
            content: String::new(),
            location: None,
            weather: None,
        }
    }

    /// Create empty fields dated today (UTC)
    pub fn today() -> Self {
        Self::new(Utc::now().date_naive())
    }

    /// Set the title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the content
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Set the location
    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the weather
    pub fn with_weather(mut self, weather: Weather) -> Self {
        self.weather = Some(weather);
        self
    }

    /// Get a short preview of the content
    pub fn preview(&self, max_chars: usize) -> String {
        if self.content.chars().count() <= max_chars {
            self.content.clone()
        } else {
            let cut: String = self
                .content
                .chars()
                .take(max_chars.saturating_sub(3))
                .collect();
            format!("{}...", cut)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_builder() {
        let fields = EntryFields::new(date(2024, 3, 1))
            .with_title("Morning")
            .with_content("Coffee on the balcony")
            .with_location(Location::new(48.85, 2.35).with_place_name("Paris"))
            .with_weather(Weather::new("Clear").with_temperature(12.5));

        assert_eq!(fields.title, "Morning");
        assert_eq!(fields.location.as_ref().unwrap().place_name.as_deref(), Some("Paris"));
        assert_eq!(fields.weather.as_ref().unwrap().temperature_celsius, Some(12.5));
    }

    #[test]
    fn test_preview() {
        let fields = EntryFields::new(date(2024, 3, 1)).with_content("abcdefghij");
        assert_eq!(fields.preview(20), "abcdefghij");
        assert_eq!(fields.preview(6), "abc...");
    }

    #[test]
    fn test_postcard_roundtrip_keeps_date() {
        let fields = EntryFields::new(date(1999, 12, 31)).with_content("party");
        let bytes = postcard::to_allocvec(&fields).unwrap();
        let back: EntryFields = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, fields);
    }
}
