//! External link builders: map viewer and chat support.

use serde::Serialize;

/// Map viewer deep link centred on a coordinate at street zoom.
pub fn map_url(latitude: f64, longitude: f64) -> String {
    format!("https://www.google.com/maps/@{},{},16z", latitude, longitude)
}

/// Chat-support account, reachable through the app scheme or the web.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupportContact {
    pub id: String,
    pub app_url: String,
    pub web_url: String,
}

impl SupportContact {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            app_url: format!("line://ti/p/{}", id),
            web_url: format!("https://line.me/ti/p/{}", id),
        }
    }

    /// The app link when the device can open it, the web page otherwise.
    pub fn url(&self, app_available: bool) -> &str {
        if app_available {
            &self.app_url
        } else {
            &self.web_url
        }
    }
}

impl Default for SupportContact {
    fn default() -> Self {
        Self::new("@dhai52765howdah")
    }
}
