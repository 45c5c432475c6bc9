//! Multi-touch attribution — rebuilds a visitor's journey to conversion and
//! distributes conversion credit across its touchpoints.

pub mod ledger;
pub mod resolver;
pub mod store;

pub use ledger::{CampaignCredit, CreditLedger};
pub use resolver::{AttributionReport, AttributionResolver};
pub use store::{InMemoryJourneyStore, JourneySource};
