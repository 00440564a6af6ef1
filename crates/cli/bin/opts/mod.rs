mod config;
mod source;

pub use config::ConfigOpts;
pub use source::SourceOpts;
