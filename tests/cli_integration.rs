/// End-to-end CLI integration tests
#[path = "cli/common.rs"]
mod common;
#[path = "cli/help_tests.rs"]
mod help_tests;
#[path = "cli/guard_tests.rs"]
mod guard_tests;
#[path = "cli/codec_tests.rs"]
mod codec_tests;
#[path = "cli/config_tests.rs"]
mod config_tests;
