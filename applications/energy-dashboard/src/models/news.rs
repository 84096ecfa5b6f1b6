use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: u32,
    pub title: String,
    pub summary: String,
    pub time: String,
    pub source: String,
}

/// The backend has no news endpoint, so the feed is curated here.
pub fn curated() -> Vec<NewsItem> {
    [
        (
            "Smart IoT Energy Systems Reduce Consumption by 25%",
            "Real-time monitoring helps households optimize energy usage",
            "2 hours ago",
            "Energy Today",
        ),
        (
            "Tamil Nadu Implements Dynamic Pricing for Electricity",
            "Time-of-use billing starts next month for residential consumers",
            "5 hours ago",
            "TNEB News",
        ),
        (
            "AI-Powered Anomaly Detection Prevents Electrical Faults",
            "Machine learning algorithms detect unusual consumption patterns",
            "1 day ago",
            "Tech Energy",
        ),
    ]
    .into_iter()
    .enumerate()
    .map(|(idx, (title, summary, time, source))| NewsItem {
        id: idx as u32 + 1,
        title: title.to_string(),
        summary: summary.to_string(),
        time: time.to_string(),
        source: source.to_string(),
    })
    .collect()
}
