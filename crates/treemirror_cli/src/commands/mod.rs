pub(crate) mod meta;
pub(crate) mod mirror;
pub(crate) mod prompt;
