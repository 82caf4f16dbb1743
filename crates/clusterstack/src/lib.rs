pub mod aws;
pub mod common;
pub mod limits;
pub mod model;
pub mod templates;
pub mod validators;

#[cfg(test)]
pub(crate) mod tests;

pub type Error = crate::common::error::StackError;
pub type Result<T> = std::result::Result<T, Error>;

pub const CLUSTERSTACK_VERSION: &str = {
    match option_env!("CLUSTERSTACK_BUILD_VERSION") {
        Some(version) => version,
        None => const_format::concatcp!(env!("CARGO_PKG_VERSION"), "-dev"),
    }
};
