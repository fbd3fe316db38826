pub mod asset_filter;
pub mod route_table;

pub use asset_filter::is_static_asset;
pub use route_table::{
    normalize_path, organizer_decision, GateDecision, Guard, RedirectTarget, RouteTable, Verdict,
};
