mod classifier;
mod common;
mod policy;
