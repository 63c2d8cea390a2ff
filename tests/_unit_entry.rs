// tests/_unit_entry.rs
#![allow(clippy::all)]

mod unit_tests {
    pub mod common;
    pub mod test_codec;
    pub mod test_config;
    pub mod test_inquiry;
    pub mod test_long_op;
    pub mod test_mode_sense;
    pub mod test_nvme;
    pub mod test_sense;
    pub mod test_session;
}
