pub const THTOOLS_DISPLAY_VERSION: &str = env!("THTOOLS_DISPLAY_VERSION");
pub const THTOOLS_BUILD_N: &str = env!("THTOOLS_BUILD_N");

pub fn version_cli_text() -> String {
    format!(
        "ToeholdTools {}\nBuild {}\nProtocol {}\nToehold switch specificity testing",
        THTOOLS_DISPLAY_VERSION,
        THTOOLS_BUILD_N,
        thtools_protocol::PROTOCOL_SCHEMA
    )
}
