pub mod batch;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod guard;
pub mod identity;
pub mod mapping;
pub mod model;
pub mod schema;
pub mod store;
pub mod ui;

pub use cli::{Cli, Commands};
pub use error::{Error, Result};
pub use mapping::{
    dump_body, dump_station, dump_system, load_body, load_station, load_system, BodyAggregate,
    StationAggregate, SystemAggregate,
};
pub use store::{Changes, GalaxyStore};
pub use ui::{Phase, ProgressUi, SilentUi, Ui};
