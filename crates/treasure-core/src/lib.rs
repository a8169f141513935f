#![deny(warnings)]
pub mod belief;
pub mod grid;
pub mod hunt;
pub mod policy;
pub mod sensor;

pub struct AppInfo;

impl AppInfo {
    pub const fn name() -> &'static str {
        "treasure-hunt"
    }

    pub const fn codename() -> &'static str {
        "Grid Beliefs"
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}
