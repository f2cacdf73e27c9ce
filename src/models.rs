use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Telemetry path
// ---------------------------------------------------------------------------

/// One (site, tracker) observation joined with the tracker taxonomy and reach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerFact {
    pub site: String,
    pub tracker_id: String,
    pub tracker_name: Option<String>,
    pub category: Option<String>,
    pub owning_company: Option<String>,
    pub reach: Option<f64>,
    pub site_reach_top10k: Option<f64>,
}

/// Per-site aggregate counts, raw telemetry and normalized features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteMetrics {
    pub site: String,
    pub popularity: f64,
    pub total_trackers: u32,
    pub total_ad_trackers: u32,
    pub companies: f64,
    pub tracked: f64,
    pub referer_leaked: f64,
    pub requests: f64,
    pub requests_tracking: f64,
    /// Average number of trackers present on the site at a time.
    pub trackers: f64,
    /// `None` when the site made no requests.
    pub percentage_tracking_requests: Option<f64>,
    pub scaled_total: f64,
    pub scaled_ad_total: f64,
    pub scaled_companies: f64,
    pub scaled_requests_tracking: f64,
    pub scaled_trackers: f64,
    pub privacy_score: f64,
}

impl SiteMetrics {
    /// Whole-number score shown to users.
    pub fn display_score(&self) -> u8 {
        self.privacy_score.floor().clamp(0.0, 10.0) as u8
    }
}

/// Share of a site's trackers that fall in one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    pub num_trackers: u32,
    pub percent: f64,
}

// ---------------------------------------------------------------------------
// Policy rubric catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub name: String,
    pub slug: String,
    pub parent_slug: Option<String>,
    pub score: f64,
    pub hostnames: Vec<String>,
    pub rubric: Vec<RubricItem>,
    pub sources: Vec<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubricItem {
    pub question_text: String,
    pub category: String,
    pub chosen_option_text: String,
    pub percent: u32,
    pub total_points: u32,
    pub citations: Vec<String>,
    pub score: u32,
}

impl RubricItem {
    /// Points awarded for the chosen option: `percent / 100 × total_points`,
    /// rounded half to even.
    pub fn points_for(percent: u32, total_points: u32) -> u32 {
        let raw = f64::from(percent) / 100.0 * f64::from(total_points);
        raw.round_ties_even() as u32
    }

    pub fn band(&self) -> GradeBand {
        if self.total_points == 0 {
            return GradeBand::Poor;
        }
        GradeBand::from_percent(f64::from(self.score) / f64::from(self.total_points) * 100.0)
    }
}

/// Coarse quality band used to color rubric answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeBand {
    Good,
    Fair,
    Poor,
}

impl GradeBand {
    pub fn from_percent(percent: f64) -> Self {
        if percent >= 75.0 {
            GradeBand::Good
        } else if percent >= 40.0 {
            GradeBand::Fair
        } else {
            GradeBand::Poor
        }
    }
}

// ---------------------------------------------------------------------------
// Review service catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    A,
    B,
    C,
    D,
    E,
    #[serde(rename = "N/A")]
    NotAvailable,
}

impl Rating {
    /// Parse a service rating label. Anything that is not a letter grade is
    /// treated as unrated.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        let letter = label
            .strip_prefix("Grade ")
            .or_else(|| label.strip_prefix("grade "))
            .unwrap_or(label);
        match letter.to_ascii_uppercase().as_str() {
            "A" => Rating::A,
            "B" => Rating::B,
            "C" => Rating::C,
            "D" => Rating::D,
            "E" => Rating::E,
            _ => Rating::NotAvailable,
        }
    }

    pub fn is_rated(&self) -> bool {
        *self != Rating::NotAvailable
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rating::A => write!(f, "A"),
            Rating::B => write!(f, "B"),
            Rating::C => write!(f, "C"),
            Rating::D => write!(f, "D"),
            Rating::E => write!(f, "E"),
            Rating::NotAvailable => write!(f, "N/A"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub id: u64,
    pub slug: String,
    pub name: String,
    pub rating: Rating,
    pub urls: Vec<String>,
    pub image: Option<String>,
    pub points: Vec<ReviewPoint>,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Classification {
    Good,
    Neutral,
    Bad,
    Blocker,
}

impl Classification {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "good" => Some(Classification::Good),
            "neutral" | "tolerable" => Some(Classification::Neutral),
            "bad" => Some(Classification::Bad),
            "blocker" | "abysmal" => Some(Classification::Blocker),
            _ => None,
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Classification::Good => write!(f, "Good"),
            Classification::Neutral => write!(f, "Neutral"),
            Classification::Bad => write!(f, "Bad"),
            Classification::Blocker => write!(f, "Critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewPoint {
    pub classification: Classification,
    pub title: String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Composite output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub rubric_used: bool,
    pub review_used: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub value: f64,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyLink {
    pub label: String,
    pub url: String,
}

/// Rows dropped while ingesting one snapshot, per source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub skipped_site_tracker_rows: usize,
    pub skipped_tracker_rows: usize,
    pub skipped_site_rows: usize,
    pub skipped_taxonomy_rows: usize,
}

impl RunStats {
    pub fn total_skipped(&self) -> usize {
        self.skipped_site_tracker_rows
            + self.skipped_tracker_rows
            + self.skipped_site_rows
            + self.skipped_taxonomy_rows
    }
}
