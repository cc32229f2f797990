mod common;

mod snapshot;
