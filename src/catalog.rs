//! Static catalogue shown next to the location panel: nearby stations,
//! the per-role feature grid, the system status panel and the release
//! highlights.
//!
//! Station figures and status values are mock values. Every feature is a placeholder that
//! only produces an "under development" notice.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Release that the placeholder features are announced for.
pub const PLANNED_RELEASE: &str = "v3.1.0";

// ─── Stations ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Demand {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NearbyStation {
    pub name: &'static str,
    pub distance_km: f64,
    pub demand: Demand,
    pub expected_revenue_yen: u32,
}

static NEARBY_STATIONS: [NearbyStation; 4] = [
    NearbyStation { name: "名古屋駅", distance_km: 1.2, demand: Demand::High, expected_revenue_yen: 3200 },
    NearbyStation { name: "栄駅", distance_km: 0.8, demand: Demand::High, expected_revenue_yen: 2800 },
    NearbyStation { name: "金山駅", distance_km: 2.1, demand: Demand::Medium, expected_revenue_yen: 1900 },
    NearbyStation { name: "千種駅", distance_km: 1.5, demand: Demand::Medium, expected_revenue_yen: 1600 },
];

/// The station list, in display order.
pub fn nearby_stations() -> &'static [NearbyStation] {
    &NEARBY_STATIONS
}

// ─── Roles & features ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Driver,
    Customer,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Driver => "🚕 ドライバー",
            Self::Customer => "👤 お客様",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Driver => "配車システム • 収益最適化 • 需要予測",
            Self::Customer => "即時配車 • ルート検索 • 履歴管理",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver => write!(f, "driver"),
            Self::Customer => write!(f, "customer"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "driver" => Ok(Self::Driver),
            "customer" => Ok(Self::Customer),
            other => Err(format!("Unknown role '{}'. Use 'driver' or 'customer'.", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Feature {
    pub icon: &'static str,
    pub name: &'static str,
    pub subtitle: &'static str,
}

const DRIVER_FEATURES: &[Feature] = &[
    Feature { icon: "📱", name: "配車システム", subtitle: "リアルタイム配車" },
    Feature { icon: "🗺️", name: "需要予測マップ", subtitle: "AI気象連携" },
    Feature { icon: "💰", name: "収益最適化", subtitle: "今日: ¥28,500" },
    Feature { icon: "⚙️", name: "設定", subtitle: "車両・勤務管理" },
];

const CUSTOMER_FEATURES: &[Feature] = &[
    Feature { icon: "🚖", name: "即時配車", subtitle: "今すぐタクシーを呼ぶ" },
    Feature { icon: "🗺️", name: "ルート検索", subtitle: "最適ルート案内" },
    Feature { icon: "📋", name: "履歴・設定", subtitle: "利用履歴管理" },
];

pub fn features_for(role: Role) -> &'static [Feature] {
    match role {
        Role::Driver => DRIVER_FEATURES,
        Role::Customer => CUSTOMER_FEATURES,
    }
}

/// Message shown when a placeholder feature is activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Feature {
    pub fn notice(&self) -> Notice {
        under_development_notice(self.name)
    }
}

pub fn under_development_notice(feature_name: &str) -> Notice {
    Notice {
        title: feature_name.to_string(),
        message: format!("{}機能は開発中です。{}でリリース予定です。", feature_name, PLANNED_RELEASE),
    }
}

/// A feature with the notice it shows, as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureEntry {
    #[serde(flatten)]
    pub feature: Feature,
    pub notice: Notice,
}

pub fn feature_entries(role: Role) -> Vec<FeatureEntry> {
    features_for(role)
        .iter()
        .map(|f| FeatureEntry { feature: *f, notice: f.notice() })
        .collect()
}

// ─── System panel ───────────────────────────────────────────────

pub const CURRENT_RELEASE: &str = "v3.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusItem {
    pub icon: &'static str,
    pub label: &'static str,
    pub value: &'static str,
}

static SYSTEM_STATUS: [StatusItem; 4] = [
    StatusItem { icon: "🌐", label: "バックエンド", value: "運用中" },
    StatusItem { icon: "🤖", label: "AIエンジン", value: "最適化中" },
    StatusItem { icon: "☁️", label: "気象API", value: "連携中" },
    StatusItem { icon: "📱", label: "LINE統合", value: "利用可能" },
];

static RELEASE_HIGHLIGHTS: [&str; 5] = [
    "企業レベルの安定性とクラッシュ防止",
    "プロフェッショナルLINEサポート 24/7",
    "8地域28駅以上の真の全国対応",
    "AI需要予測と気象連携",
    "リアルタイム収益最適化",
];

/// The status panel. Values are fixed, not measured.
pub fn system_status() -> &'static [StatusItem] {
    &SYSTEM_STATUS
}

/// What's new in [`CURRENT_RELEASE`], in display order.
pub fn release_highlights() -> &'static [&'static str] {
    &RELEASE_HIGHLIGHTS
}
