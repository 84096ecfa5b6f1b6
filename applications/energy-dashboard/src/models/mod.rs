pub mod alert;
pub mod appliance;
pub mod energy;
pub mod news;

pub use alert::{Alert, AnomalyResponse, RawAnomaly, Severity};
pub use appliance::{Appliance, ApplianceId, ControlAck, NameAck, PowerStatus};
pub use energy::{
    parse_timestamp, EnergyReading, HealthStatus, HistoryPoint, LiveDataResponse, MonthlyBill,
    MonthlyReport, MonthlySummary, MonthlySummaryResponse, NotificationOutcome, RawReading,
    UsageShare,
};
pub use news::NewsItem;
